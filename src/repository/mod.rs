//! 账本数据访问模块

pub mod ledger;
pub mod pg_ledger;

pub use ledger::{MemoryLedger, TransactionLedger};
pub use pg_ledger::PgLedger;
