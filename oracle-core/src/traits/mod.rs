pub use contracts::*;
pub use cosmos::*;
pub use ethereum::*;
pub use signing::*;
pub use store::*;

mod contracts;
mod cosmos;
mod ethereum;
mod signing;
mod store;
