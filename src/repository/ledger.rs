//! 交易账本
//!
//! 仅追加的充值/提现记录存储，独占持有状态转换与托管余额。
//! 提现的"校验-扣减"是整个系统唯一必需的临界区：
//! 并发提现的已受理金额之和绝不超过扣减时刻的可用余额，余额绝不为负。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::model::Transaction;
use crate::domain::transaction_status::TransactionStatus;
use crate::error::CoreError;

/// 账本抽象：{append, query, atomic-debit}
///
/// 实现方保证append-only语义：记录永不删除，状态只沿状态机前进
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// 追加一条记录（充值路径，不动余额）
    async fn append(&self, tx: Transaction) -> Result<(), CoreError>;

    /// 原子地校验并扣减余额，成功则同时追加记录（提现路径）
    ///
    /// 余额不足时不产生任何变更。扣减绝不自动重试。
    async fn debit_and_append(&self, amount: Decimal, tx: Transaction) -> Result<(), CoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>, CoreError>;

    /// 按链上交易哈希查找（验证回调的关联路径）
    async fn find_by_external_id(&self, tx_hash: &str) -> Result<Option<Transaction>, CoreError>;

    /// 全部记录，created_at降序
    async fn list(&self) -> Result<Vec<Transaction>, CoreError>;

    async fn available_balance(&self) -> Result<Decimal, CoreError>;

    /// 入账（外部结算进程确认充值后调用）
    async fn credit(&self, amount: Decimal) -> Result<(), CoreError>;

    /// 结算进程带外补充链上哈希关联
    async fn attach_external_id(&self, id: Uuid, tx_hash: &str) -> Result<(), CoreError>;

    /// 状态转换
    ///
    /// 幂等：目标状态与当前一致时为no-op；非法转换（离开终态）报错。
    /// 进入终态时设置completed_at。
    async fn transition(
        &self,
        id: Uuid,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError>;
}

struct MemoryState {
    records: Vec<Transaction>,
    balance: Decimal,
}

/// 内存账本
///
/// 单把tokio互斥锁同时护住记录与余额，充当托管账户的串行锁。
/// 适配器I/O从不在持锁状态下发生。
pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_balance(Decimal::ZERO)
    }

    /// 以初始托管余额构造（测试与迁移场景）
    pub fn with_balance(balance: Decimal) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records: Vec::new(),
                balance,
            }),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionLedger for MemoryLedger {
    async fn append(&self, tx: Transaction) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state.records.push(tx);
        Ok(())
    }

    async fn debit_and_append(&self, amount: Decimal, tx: Transaction) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;

        if amount > state.balance {
            return Err(CoreError::InsufficientBalance {
                requested: amount,
                available: state.balance,
            });
        }

        state.balance -= amount;
        state.records.push(tx);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>, CoreError> {
        let state = self.state.lock().await;
        Ok(state.records.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_external_id(&self, tx_hash: &str) -> Result<Option<Transaction>, CoreError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .iter()
            .find(|t| t.external_tx_id.as_deref() == Some(tx_hash))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Transaction>, CoreError> {
        let state = self.state.lock().await;
        let mut records = state.records.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn available_balance(&self) -> Result<Decimal, CoreError> {
        Ok(self.state.lock().await.balance)
    }

    async fn credit(&self, amount: Decimal) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state.balance += amount;
        Ok(())
    }

    async fn attach_external_id(&self, id: Uuid, tx_hash: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        let tx = state
            .records
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(CoreError::NotFound)?;
        tx.external_tx_id = Some(tx_hash.to_string());
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        let tx = state
            .records
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(CoreError::NotFound)?;

        // 重复投递同一终态是幂等的
        if tx.status == status {
            return Ok(());
        }

        if !tx.status.can_transition_to(&status) {
            return Err(CoreError::InvalidTransition(format!(
                "{} -> {}",
                tx.status, status
            )));
        }

        tx.status = status;
        if status.is_final() {
            tx.completed_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Network, TokenSymbol, TransactionType};

    fn sample_tx(tx_type: TransactionType, amount: Decimal) -> Transaction {
        Transaction::new(
            tx_type,
            amount,
            TokenSymbol::Usdt,
            Network::Ethereum,
            "0x71CB05EE1b1F506fF321Da3dac38f25c0c9ce6E1".into(),
            Decimal::ONE,
        )
    }

    #[tokio::test]
    async fn debit_refuses_overdraft_without_mutation() {
        let ledger = MemoryLedger::with_balance(Decimal::new(100, 0));
        let tx = sample_tx(TransactionType::Withdrawal, Decimal::new(150, 0));

        let err = ledger
            .debit_and_append(Decimal::new(150, 0), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientBalance { .. }));

        assert_eq!(
            ledger.available_balance().await.unwrap(),
            Decimal::new(100, 0)
        );
        assert!(ledger.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn debit_updates_balance_and_appends() {
        let ledger = MemoryLedger::with_balance(Decimal::new(100, 0));
        let tx = sample_tx(TransactionType::Withdrawal, Decimal::new(40, 0));
        let id = tx.id;

        ledger
            .debit_and_append(Decimal::new(40, 0), tx)
            .await
            .unwrap();
        assert_eq!(
            ledger.available_balance().await.unwrap(),
            Decimal::new(60, 0)
        );
        assert!(ledger.find_by_id(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn transition_is_monotonic_and_idempotent() {
        let ledger = MemoryLedger::new();
        let tx = sample_tx(TransactionType::Deposit, Decimal::new(10, 0));
        let id = tx.id;
        ledger.append(tx).await.unwrap();

        let at = Utc::now();
        ledger
            .transition(id, TransactionStatus::Failed, at)
            .await
            .unwrap();

        let stored = ledger.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
        assert_eq!(stored.completed_at, Some(at));

        // 重复投递同一终态：幂等
        ledger
            .transition(id, TransactionStatus::Failed, Utc::now())
            .await
            .unwrap();
        // completed_at保持首次终态时刻
        let stored = ledger.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.completed_at, Some(at));

        // 离开终态：拒绝
        let err = ledger
            .transition(id, TransactionStatus::Completed, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn list_orders_most_recent_first() {
        let ledger = MemoryLedger::with_balance(Decimal::new(1000, 0));
        let mut older = sample_tx(TransactionType::Deposit, Decimal::new(10, 0));
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = sample_tx(TransactionType::Withdrawal, Decimal::new(20, 0));

        ledger.append(older).await.unwrap();
        ledger
            .debit_and_append(Decimal::new(20, 0), newer)
            .await
            .unwrap();

        let listed = ledger.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].tx_type, TransactionType::Withdrawal);
        assert_eq!(listed[1].tx_type, TransactionType::Deposit);
        assert!(listed[0].created_at >= listed[1].created_at);
    }

    #[tokio::test]
    async fn external_id_attachment_enables_hash_lookup() {
        let ledger = MemoryLedger::new();
        let tx = sample_tx(TransactionType::Deposit, Decimal::new(10, 0));
        let id = tx.id;
        ledger.append(tx).await.unwrap();

        assert!(ledger
            .find_by_external_id("0xdeadbeef")
            .await
            .unwrap()
            .is_none());

        ledger.attach_external_id(id, "0xdeadbeef").await.unwrap();
        let found = ledger.find_by_external_id("0xdeadbeef").await.unwrap();
        assert_eq!(found.unwrap().id, id);
    }
}
