pub use cosmos::*;
pub use domain::*;
pub use events::*;
pub use health::*;
pub use message::*;
pub use record::*;

mod cosmos;
mod domain;
mod events;
mod health;
mod message;
mod record;
