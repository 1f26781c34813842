//! 测试辅助模块
//! 提供内存账本 + 可配置mock适配器装配出的引擎

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use stablecore::domain::derivation::AddressDeriver;
use stablecore::domain::model::Network;
use stablecore::domain::token_registry::TokenRegistry;
use stablecore::error::CoreError;
use stablecore::repository::ledger::{MemoryLedger, TransactionLedger};
use stablecore::service::adapter::{AdapterRegistry, NetworkAdapter, VerificationOutcome};
use stablecore::service::engine::TransactionEngine;
use stablecore::service::rate_feed::StaticRateFeed;

pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// 可配置的mock适配器：探活结果与按哈希的验证结果都由测试注入
pub struct MockAdapter {
    network: Network,
    operational: bool,
    verifications: HashMap<String, VerificationOutcome>,
}

impl MockAdapter {
    pub fn up(network: Network) -> Self {
        Self {
            network,
            operational: true,
            verifications: HashMap::new(),
        }
    }

    pub fn down(network: Network) -> Self {
        Self {
            network,
            operational: false,
            verifications: HashMap::new(),
        }
    }

    pub fn with_verification(mut self, tx_hash: &str, outcome: VerificationOutcome) -> Self {
        self.verifications.insert(tx_hash.to_string(), outcome);
        self
    }
}

#[async_trait]
impl NetworkAdapter for MockAdapter {
    fn network(&self) -> Network {
        self.network
    }

    async fn is_operational(&self) -> bool {
        self.operational
    }

    async fn native_balance(&self, _address: &str) -> Result<Decimal, CoreError> {
        Ok(Decimal::ZERO)
    }

    async fn token_balance(
        &self,
        _address: &str,
        _contract_address: &str,
        _decimals: u32,
    ) -> Result<Decimal, CoreError> {
        Ok(Decimal::ZERO)
    }

    async fn verify_transaction(&self, tx_hash: &str) -> Result<VerificationOutcome, CoreError> {
        Ok(self
            .verifications
            .get(tx_hash)
            .copied()
            .unwrap_or_else(VerificationOutcome::not_found))
    }
}

/// 全部网络在线的注册表
pub fn adapters_all_up() -> AdapterRegistry {
    let mut registry = AdapterRegistry::empty();
    for network in Network::all() {
        registry.insert(Arc::new(MockAdapter::up(network)));
    }
    registry
}

/// 以给定初始余额和适配器装配引擎，返回引擎与底层账本
pub fn engine_with(
    balance: Decimal,
    adapters: AdapterRegistry,
) -> (TransactionEngine, Arc<dyn TransactionLedger>) {
    let ledger: Arc<dyn TransactionLedger> = Arc::new(MemoryLedger::with_balance(balance));
    let engine = TransactionEngine::new(
        TokenRegistry::new(),
        adapters,
        AddressDeriver::new(TEST_MNEMONIC).unwrap(),
        ledger.clone(),
        Arc::new(StaticRateFeed::default()),
    );
    (engine, ledger)
}

pub fn engine_with_balance(balance: Decimal) -> (TransactionEngine, Arc<dyn TransactionLedger>) {
    engine_with(balance, adapters_all_up())
}
