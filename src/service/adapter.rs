//! 网络适配器抽象
//!
//! 每条链一个实现，能力集统一：{探活, 原生/代币余额, 交易验证}。
//! 引擎通过按网络键入的注册表选择变体，自身不含任何按链分支。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::BlockchainConfig;
use crate::domain::model::Network;
use crate::error::CoreError;
use crate::service::evm_adapter::EvmAdapter;
use crate::service::tron_adapter::TronAdapter;

/// 链上交易验证结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// 节点是否认得这笔交易（false时确认是最终一致的，稍后可重试）
    pub found: bool,
    /// 是否已上链确认
    pub confirmed: bool,
    /// 链上执行是否成功
    pub success: bool,
}

impl VerificationOutcome {
    pub fn not_found() -> Self {
        Self {
            found: false,
            confirmed: false,
            success: false,
        }
    }
}

/// 统一网络适配器
///
/// 所有方法都是有界超时的阻塞网络I/O，调用期间绝不持有账本锁
#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    fn network(&self) -> Network;

    /// 轻量探活："能取到最新块高且非零"
    ///
    /// 各网络独立求值：一条网络失联绝不拖慢另一条的探测
    async fn is_operational(&self) -> bool;

    /// 原生资产余额（ETH/MATIC/BNB/TRX）
    async fn native_balance(&self, address: &str) -> Result<Decimal, CoreError>;

    /// 代币余额（合约调用，结果按代币声明的小数位缩放）
    async fn token_balance(
        &self,
        address: &str,
        contract_address: &str,
        decimals: u32,
    ) -> Result<Decimal, CoreError>;

    /// 验证一笔链上交易
    async fn verify_transaction(&self, tx_hash: &str) -> Result<VerificationOutcome, CoreError>;
}

/// 适配器注册表：按网络选择变体
pub struct AdapterRegistry {
    adapters: HashMap<Network, Arc<dyn NetworkAdapter>>,
}

impl AdapterRegistry {
    /// 按区块链配置构建全部适配器
    ///
    /// EVM家族每条链一个实例（端点不同、协议相同），Tron走REST网关
    pub fn from_config(config: &BlockchainConfig) -> Result<Self, CoreError> {
        let mut registry = Self::empty();

        registry.insert(Arc::new(EvmAdapter::new(
            Network::Ethereum,
            &config.eth_rpc_url,
            config,
        )?));
        registry.insert(Arc::new(EvmAdapter::new(
            Network::PolygonPos,
            &config.polygon_rpc_url,
            config,
        )?));
        registry.insert(Arc::new(EvmAdapter::new(
            Network::Bep20,
            &config.bsc_rpc_url,
            config,
        )?));
        registry.insert(Arc::new(TronAdapter::new(config)?));

        Ok(registry)
    }

    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// 注册（或替换）一个适配器。测试中用于注入mock。
    pub fn insert(&mut self, adapter: Arc<dyn NetworkAdapter>) {
        self.adapters.insert(adapter.network(), adapter);
    }

    pub fn get(&self, network: Network) -> Result<&Arc<dyn NetworkAdapter>, CoreError> {
        self.adapters
            .get(&network)
            .ok_or_else(|| CoreError::UnsupportedNetwork(network.to_string()))
    }

    /// 并发探活全部网络
    ///
    /// futures扇出、无共享锁、无全局顺序：慢网络不阻塞快网络的结果
    pub async fn probe_all(&self) -> HashMap<Network, bool> {
        let probes = self.adapters.values().map(|adapter| {
            let adapter = adapter.clone();
            async move { (adapter.network(), adapter.is_operational().await) }
        });

        futures::future::join_all(probes).await.into_iter().collect()
    }
}


/// 把合约返回的十六进制整数按小数位缩放为Decimal
///
/// 输入可带0x前缀；空串按零处理（部分节点对零余额返回"0x"）
pub(crate) fn decode_hex_amount(hex_str: &str, decimals: u32) -> Result<Decimal, CoreError> {
    let trimmed = hex_str.trim_start_matches("0x").trim_start_matches('0');

    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }
    if trimmed.len() > 32 {
        return Err(CoreError::Verification(format!(
            "balance value out of range: {hex_str}"
        )));
    }

    let raw = u128::from_str_radix(trimmed, 16)
        .map_err(|_| CoreError::Verification(format!("malformed hex amount: {hex_str}")))?;

    scale_raw_amount(raw, decimals)
}

/// 原始最小单位 → 标准单位
pub(crate) fn scale_raw_amount(raw: u128, decimals: u32) -> Result<Decimal, CoreError> {
    let value = i128::try_from(raw)
        .map_err(|_| CoreError::Verification(format!("amount overflows decimal: {raw}")))?;
    Decimal::try_from_i128_with_scale(value, decimals)
        .map_err(|e| CoreError::Verification(format!("amount cannot be scaled: {e}")))
}
