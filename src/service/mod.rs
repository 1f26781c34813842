//! 业务服务模块

pub mod adapter;
pub mod balance;
pub mod engine;
pub mod evm_adapter;
pub mod rate_feed;
pub mod tron_adapter;

pub use adapter::{AdapterRegistry, NetworkAdapter, VerificationOutcome};
pub use balance::BalanceAggregator;
pub use engine::TransactionEngine;
