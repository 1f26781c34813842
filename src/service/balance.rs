//! 托管余额聚合
//!
//! 本核心内余额由账本追踪：受理提现时扣减，充值在外部结算确认前不入账。
//! 不在每次调用时做链上读取：链上读慢、限频，且不是账本内未决承诺的
//! 真实来源。周期性地用适配器余额对账并标记偏差，是外部对账任务的职责。

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::CoreError;
use crate::repository::ledger::TransactionLedger;

pub struct BalanceAggregator {
    ledger: Arc<dyn TransactionLedger>,
}

impl BalanceAggregator {
    pub fn new(ledger: Arc<dyn TransactionLedger>) -> Self {
        Self { ledger }
    }

    /// 当前可用托管余额
    pub async fn available_balance(&self) -> Result<Decimal, CoreError> {
        self.ledger.available_balance().await
    }
}
