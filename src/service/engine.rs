//! 交易引擎
//!
//! 编排层：校验 → 探活 → 派生地址 → 记账。每条链的差异都藏在适配器
//! 注册表后面，这里没有任何按网络分支的逻辑。
//!
//! 并发模型：适配器I/O从不在持有账本锁时发生；提现的校验-扣减由账本
//! 在单一临界区内完成；充值创建与地址派生完全并行安全。

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::derivation::AddressDeriver;
use crate::domain::model::{Network, TokenSymbol, Transaction, TransactionType};
use crate::domain::token_registry::TokenRegistry;
use crate::domain::transaction_status::TransactionStatus;
use crate::error::CoreError;
use crate::repository::ledger::TransactionLedger;
use crate::service::adapter::AdapterRegistry;
use crate::service::balance::BalanceAggregator;
use crate::service::evm_adapter::validate_evm_address;
use crate::service::rate_feed::{RateFeed, StaticRateFeed};
use crate::service::tron_adapter::validate_tron_address;

/// 提现目标地址长度的外层边界
const ADDRESS_LEN_MIN: usize = 10;
const ADDRESS_LEN_MAX: usize = 100;

/// 托管账户索引（PerAccount策略：每(token, network)一个静态充值地址）
const CUSTODIAL_ACCOUNT_INDEX: u32 = 0;

pub struct TransactionEngine {
    registry: TokenRegistry,
    adapters: AdapterRegistry,
    deriver: AddressDeriver,
    ledger: Arc<dyn TransactionLedger>,
    balance: BalanceAggregator,
    rate_feed: Arc<dyn RateFeed>,
}

impl TransactionEngine {
    pub fn new(
        registry: TokenRegistry,
        adapters: AdapterRegistry,
        deriver: AddressDeriver,
        ledger: Arc<dyn TransactionLedger>,
        rate_feed: Arc<dyn RateFeed>,
    ) -> Self {
        let balance = BalanceAggregator::new(ledger.clone());
        Self {
            registry,
            adapters,
            deriver,
            ledger,
            balance,
            rate_feed,
        }
    }

    /// 按配置装配引擎（内置目录 + 固定汇率源）
    ///
    /// 助记词缺失/非法在这里失败 —— 启动时致命，不逐请求暴露
    pub fn from_config(
        config: &Config,
        ledger: Arc<dyn TransactionLedger>,
    ) -> Result<Self, CoreError> {
        let deriver = AddressDeriver::new(&config.wallet.mnemonic)?;
        let adapters = AdapterRegistry::from_config(&config.blockchain)?;
        Ok(Self::new(
            TokenRegistry::new(),
            adapters,
            deriver,
            ledger,
            Arc::new(StaticRateFeed::default()),
        ))
    }

    /// 创建充值请求
    ///
    /// 立即返回AwaitingPayment记录；链上确认是异步的，不在本调用的
    /// 关键路径上
    pub async fn create_deposit(
        &self,
        amount: Decimal,
        token: TokenSymbol,
        network: Network,
    ) -> Result<Transaction, CoreError> {
        validate_amount(amount)?;
        self.require_listing(token, network)?;

        // 只探目标网络：一条链不可用不影响同进程里其他链的请求
        let adapter = self.adapters.get(network)?;
        if !adapter.is_operational().await {
            tracing::warn!(%network, "deposit rejected: network probe failed");
            return Err(CoreError::ServiceUnavailable(network));
        }

        let address = self
            .deriver
            .derive(token, network, CUSTODIAL_ACCOUNT_INDEX)?;
        let rate = self.snapshot_rate(token).await;

        let tx = Transaction::new(
            TransactionType::Deposit,
            amount,
            token,
            network,
            address,
            rate,
        );
        self.ledger.append(tx.clone()).await?;

        tracing::info!(
            tx_id = %tx.id,
            %token,
            %network,
            %amount,
            "deposit request created"
        );
        Ok(tx)
    }

    /// 创建提现请求
    ///
    /// 校验-扣减在账本的单一临界区内原子完成；余额不足时零变更。
    /// 实际链上转账与终态标记由外部结算进程负责。
    pub async fn create_withdrawal(
        &self,
        amount: Decimal,
        token: TokenSymbol,
        network: Network,
        destination_address: &str,
    ) -> Result<Transaction, CoreError> {
        validate_amount(amount)?;
        validate_destination(network, destination_address)?;
        self.require_listing(token, network)?;

        let rate = self.snapshot_rate(token).await;
        let tx = Transaction::new(
            TransactionType::Withdrawal,
            amount,
            token,
            network,
            destination_address.to_string(),
            rate,
        );

        // 扣减绝不自动重试：失败即向调用方报错
        self.ledger.debit_and_append(amount, tx.clone()).await?;

        tracing::info!(
            tx_id = %tx.id,
            %token,
            %network,
            %amount,
            "withdrawal accepted and balance debited"
        );
        Ok(tx)
    }

    /// 验证一笔充值的链上状态并推进交易状态机
    ///
    /// 幂等、可自由重试。未找到交易时不做任何转换（确认是最终一致的，
    /// 调用方稍后再试）。返回发生了转换的交易记录。
    pub async fn verify_deposit(
        &self,
        tx_hash: &str,
        network: Network,
    ) -> Result<Option<Transaction>, CoreError> {
        let adapter = self.adapters.get(network)?;
        let outcome = adapter.verify_transaction(tx_hash).await?;

        if !outcome.found || !outcome.confirmed {
            tracing::debug!(
                tx_hash,
                %network,
                found = outcome.found,
                "verification inconclusive, no transition"
            );
            return Ok(None);
        }

        // 关联：由结算进程带外补充的external_tx_id
        let Some(tx) = self.ledger.find_by_external_id(tx_hash).await? else {
            tracing::warn!(tx_hash, %network, "confirmed chain tx has no ledger correlation");
            return Ok(None);
        };

        let target = if outcome.success {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Failed
        };

        self.ledger.transition(tx.id, target, Utc::now()).await?;
        tracing::info!(tx_id = %tx.id, tx_hash, status = %target, "deposit verification transition");

        self.ledger.find_by_id(tx.id).await
    }

    /// 结算进程补充链上哈希关联
    pub async fn attach_external_id(&self, id: Uuid, tx_hash: &str) -> Result<(), CoreError> {
        self.ledger.attach_external_id(id, tx_hash).await
    }

    pub async fn transaction(&self, id: Uuid) -> Result<Transaction, CoreError> {
        self.ledger.find_by_id(id).await?.ok_or(CoreError::NotFound)
    }

    /// 全部交易，created_at降序
    pub async fn transactions(&self) -> Result<Vec<Transaction>, CoreError> {
        self.ledger.list().await
    }

    pub async fn available_balance(&self) -> Result<Decimal, CoreError> {
        self.balance.available_balance().await
    }

    /// 当前(token, network)的静态充值地址（PerAccount策略）
    pub fn generate_deposit_address(
        &self,
        network: Network,
        token: TokenSymbol,
    ) -> Result<String, CoreError> {
        self.require_listing(token, network)?;
        self.deriver.derive(token, network, CUSTODIAL_ACCOUNT_INDEX)
    }

    /// 并发探活全部网络
    pub async fn network_status(&self) -> std::collections::HashMap<Network, bool> {
        self.adapters.probe_all().await
    }

    fn require_listing(&self, token: TokenSymbol, network: Network) -> Result<(), CoreError> {
        self.registry
            .listing(token, network)
            .map(|_| ())
            .ok_or_else(|| CoreError::UnsupportedToken {
                token: token.to_string(),
                network: network.to_string(),
            })
    }

    /// 创建时刻的汇率快照
    ///
    /// 汇率是信息性字段：源失联时记1:1并告警，绝不因此拒绝交易
    async fn snapshot_rate(&self, token: TokenSymbol) -> Decimal {
        match self.rate_feed.rate(token).await {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(%token, error = %e, "rate feed unavailable, recording 1:1");
                Decimal::ONE
            }
        }
    }
}

fn validate_amount(amount: Decimal) -> Result<(), CoreError> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

/// 提现目标地址校验：长度外层边界 + 目标网络的格式预期
fn validate_destination(network: Network, address: &str) -> Result<(), CoreError> {
    if address.len() < ADDRESS_LEN_MIN || address.len() > ADDRESS_LEN_MAX {
        return Err(CoreError::Validation(format!(
            "destination address length must be between {ADDRESS_LEN_MIN} and {ADDRESS_LEN_MAX}"
        )));
    }

    if network.is_evm() {
        validate_evm_address(address)
    } else {
        validate_tron_address(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_must_be_positive() {
        assert!(validate_amount(Decimal::new(1, 2)).is_ok());
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::new(-5, 0)).is_err());
    }

    #[test]
    fn destination_must_match_target_network_format() {
        let evm = "0x71CB05EE1b1F506fF321Da3dac38f25c0c9ce6E1";
        assert!(validate_destination(Network::Ethereum, evm).is_ok());
        assert!(validate_destination(Network::Bep20, evm).is_ok());
        // EVM地址对Tron网络无效，反之亦然
        assert!(validate_destination(Network::Tron, evm).is_err());
        assert!(validate_destination(Network::Ethereum, "TJCnKsPa7y5okkXvQAidZBzqx3QyQ6sxMW").is_err());
        // 长度外层边界
        assert!(validate_destination(Network::Ethereum, "0x1234").is_err());
        let long = format!("0x{}", "a".repeat(120));
        assert!(validate_destination(Network::Ethereum, &long).is_err());
    }
}
