//! StableCore - 多链稳定币托管交易核心
//!
//! 统一的充值/提现引擎：地址派生、余额记账、交易状态机、
//! 以及屏蔽各链差异（EVM JSON-RPC / Tron REST）的网络适配器层

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;

// 重新导出常用类型
pub use config::Config;
pub use error::CoreError;

// 统一模块导出
pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{
            model::{Network, TokenSymbol, Transaction, TransactionType},
            token_registry::TokenRegistry,
            transaction_status::TransactionStatus,
        },
        error::CoreError,
        repository::ledger::TransactionLedger,
        service::{adapter::NetworkAdapter, engine::TransactionEngine},
    };
}
