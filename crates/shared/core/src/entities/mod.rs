mod account;
mod node;
mod order;
mod side;

pub use account::AccountStats;
pub use node::{INSTRUMENT_PREFIX, NodeId};
pub use order::{OrderRecord, seconds_between};
pub use side::Side;
