pub mod replay;
pub mod report;
pub mod scanner;

pub use replay::{replay, Replay, EPSILON};
pub use scanner::{ScanError, ScanOutcome, WalletScanner};
