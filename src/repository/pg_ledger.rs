//! 账本的PostgreSQL实现
//!
//! 扣减以一条带余额条件的UPDATE在单个事务内完成：
//! 两个并发提现不可能都在扣减落地前通过校验。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::model::{Network, TokenSymbol, Transaction, TransactionType};
use crate::domain::transaction_status::TransactionStatus;
use crate::error::CoreError;
use crate::repository::ledger::TransactionLedger;

/// 单托管账户部署的账户键
const CUSTODIAL_ACCOUNT: &str = "default";

pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按配置建立连接池
    pub async fn connect(config: &crate::config::LedgerConfig) -> Result<Self, CoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// 运行数据库迁移
    pub async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("migration failed")))
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    tx_type: String,
    amount: Decimal,
    token: String,
    network: String,
    wallet_address: String,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    external_tx_id: Option<String>,
    exchange_rate: Decimal,
}

impl TransactionRow {
    fn into_domain(self) -> Result<Transaction, CoreError> {
        Ok(Transaction {
            id: self.id,
            tx_type: TransactionType::parse(&self.tx_type).ok_or_else(|| {
                CoreError::Internal(anyhow::anyhow!("corrupt tx_type column: {}", self.tx_type))
            })?,
            amount: self.amount,
            token: TokenSymbol::parse(&self.token)?,
            network: Network::parse(&self.network)?,
            wallet_address: self.wallet_address,
            status: TransactionStatus::parse(&self.status).ok_or_else(|| {
                CoreError::Internal(anyhow::anyhow!("corrupt status column: {}", self.status))
            })?,
            created_at: self.created_at,
            completed_at: self.completed_at,
            external_tx_id: self.external_tx_id,
            exchange_rate: self.exchange_rate,
        })
    }
}

const SELECT_COLUMNS: &str = "id, tx_type, amount, token, network, wallet_address, status, \
     created_at, completed_at, external_tx_id, exchange_rate";

async fn insert_transaction(
    executor: &mut sqlx::PgConnection,
    tx: &Transaction,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"INSERT INTO ledger_transactions
             (id, tx_type, amount, token, network, wallet_address, status,
              created_at, completed_at, external_tx_id, exchange_rate)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
    )
    .bind(tx.id)
    .bind(tx.tx_type.as_str())
    .bind(tx.amount)
    .bind(tx.token.as_str())
    .bind(tx.network.as_str())
    .bind(&tx.wallet_address)
    .bind(tx.status.as_str())
    .bind(tx.created_at)
    .bind(tx.completed_at)
    .bind(&tx.external_tx_id)
    .bind(tx.exchange_rate)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl TransactionLedger for PgLedger {
    async fn append(&self, tx: Transaction) -> Result<(), CoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_transaction(&mut conn, &tx).await
    }

    async fn debit_and_append(&self, amount: Decimal, tx: Transaction) -> Result<(), CoreError> {
        let mut txn = self.pool.begin().await?;

        // 条件扣减：余额不足时零行受影响，零变更
        let debited = sqlx::query(
            "UPDATE custodial_balance SET balance = balance - $1
             WHERE account = $2 AND balance >= $1",
        )
        .bind(amount)
        .bind(CUSTODIAL_ACCOUNT)
        .execute(&mut *txn)
        .await?;

        if debited.rows_affected() == 0 {
            let available: Decimal =
                sqlx::query_scalar("SELECT balance FROM custodial_balance WHERE account = $1")
                    .bind(CUSTODIAL_ACCOUNT)
                    .fetch_optional(&mut *txn)
                    .await?
                    .unwrap_or(Decimal::ZERO);
            txn.rollback().await?;
            return Err(CoreError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        insert_transaction(&mut txn, &tx).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>, CoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM ledger_transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn find_by_external_id(&self, tx_hash: &str) -> Result<Option<Transaction>, CoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM ledger_transactions WHERE external_tx_id = $1"
        ))
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn list(&self) -> Result<Vec<Transaction>, CoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM ledger_transactions ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn available_balance(&self) -> Result<Decimal, CoreError> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM custodial_balance WHERE account = $1")
                .bind(CUSTODIAL_ACCOUNT)
                .fetch_optional(&self.pool)
                .await?;
        Ok(balance.unwrap_or(Decimal::ZERO))
    }

    async fn credit(&self, amount: Decimal) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO custodial_balance (account, balance) VALUES ($1, $2)
             ON CONFLICT (account)
             DO UPDATE SET balance = custodial_balance.balance + EXCLUDED.balance",
        )
        .bind(CUSTODIAL_ACCOUNT)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn attach_external_id(&self, id: Uuid, tx_hash: &str) -> Result<(), CoreError> {
        let updated = sqlx::query("UPDATE ledger_transactions SET external_tx_id = $2 WHERE id = $1")
            .bind(id)
            .bind(tx_hash)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        // 单调性在SQL层强制：只允许从非终态离开
        let updated = sqlx::query(
            "UPDATE ledger_transactions
             SET status = $2, completed_at = CASE WHEN $3 THEN $4 ELSE completed_at END
             WHERE id = $1 AND status = $5",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(status.is_final())
        .bind(at)
        .bind(TransactionStatus::AwaitingPayment.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM ledger_transactions WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;

            return match current {
                None => Err(CoreError::NotFound),
                // 重复投递同一终态：幂等
                Some(s) if s == status.as_str() => Ok(()),
                Some(s) => Err(CoreError::InvalidTransition(format!("{s} -> {status}"))),
            };
        }
        Ok(())
    }
}
