pub mod admission;
pub mod block;
pub mod ledger;
pub mod shared;

pub use admission::{AcceptAll, Admission, StartsWithZeros};
pub use block::{Block, BlockError, DEFAULT_TIME_FORMAT, Payload};
pub use ledger::{AppendError, ChainError, Ledger, MineError, MineLimit};
pub use shared::SharedLedger;

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Difficulty bounds accepted from configuration (keep low to avoid long waits).
pub const DIFF_MIN: usize = 0;
pub const DIFF_MAX: usize = 6;
