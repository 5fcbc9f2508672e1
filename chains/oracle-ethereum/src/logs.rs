use ethers::abi::RawLog;
use ethers::contract::EthLogDecode;
use ethers::types::{Filter, Log};
use ethers::prelude::Middleware;
use futures::stream::{self, StreamExt};

use oracle_core::{ChainCommunicationError, ChainResult, EthereumLog, EventStream, LogMeta};

pub(crate) fn to_ethereum_log(log: Log) -> EthereumLog {
    EthereumLog {
        address: log.address,
        topics: log.topics,
        data: log.data,
        removed: log.removed.unwrap_or(false),
    }
}

pub(crate) fn to_log_meta(log: &Log) -> LogMeta {
    LogMeta {
        address: log.address,
        block_number: log.block_number.map(|n| n.as_u64()).unwrap_or_default(),
        block_hash: log.block_hash.unwrap_or_default(),
        transaction_hash: log.transaction_hash.unwrap_or_default(),
        transaction_index: log.transaction_index.map(|n| n.as_u64()).unwrap_or_default(),
        log_index: log.log_index.unwrap_or_default(),
        removed: log.removed.unwrap_or(false),
    }
}

/// Decode a receipt log as `D`.
pub(crate) fn decode_log<D: EthLogDecode>(log: &EthereumLog) -> ChainResult<D> {
    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };
    D::decode_log(&raw).map_err(ChainCommunicationError::from_other)
}

/// Fetch the raw logs matching `filter` and decode each into an oracle
/// event. A log that does not decode is yielded as an error, the rest of the
/// stream is unaffected.
pub(crate) async fn fetch_events<M, D, E, F>(
    provider: &M,
    filter: &Filter,
    convert: F,
) -> ChainResult<EventStream<'static, E>>
where
    M: Middleware + 'static,
    D: EthLogDecode,
    E: Send + 'static,
    F: Fn(D) -> E + Send + 'static,
{
    let logs = provider
        .get_logs(filter)
        .await
        .map_err(ChainCommunicationError::from_other)?;
    let events = logs
        .into_iter()
        .map(move |log| {
            let meta = to_log_meta(&log);
            decode_log::<D>(&to_ethereum_log(log)).map(|decoded| (convert(decoded), meta))
        })
        .collect::<Vec<_>>();
    Ok(stream::iter(events).boxed())
}
