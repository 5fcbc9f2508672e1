use futures::stream;
use oracle_core::{ChainResult, EventStream, LogMeta};

pub use contracts::*;
pub use cosmos::*;
pub use ethereum::*;

mod contracts;
mod cosmos;
mod ethereum;

pub(crate) fn event_stream<E: Send + 'static>(
    events: Vec<ChainResult<(E, LogMeta)>>,
) -> EventStream<'static, E> {
    Box::pin(stream::iter(events))
}
