//! 统一交易状态定义
//! 所有充值/提现记录使用同一状态机

use std::fmt;

use serde::{Deserialize, Serialize};

/// 交易状态机
///
/// 创建即为AwaitingPayment；终态Completed/Failed不可再转换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// 等待链上付款/结算
    AwaitingPayment,

    /// 链上确认成功
    Completed,

    /// 链上执行失败或revert
    Failed,
}

impl TransactionStatus {
    /// 是否为最终状态（不可再转换）
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// 验证状态转换合法性：单调，AwaitingPayment → {Completed, Failed}
    pub fn can_transition_to(&self, target: &Self) -> bool {
        match (self, target) {
            (Self::AwaitingPayment, Self::Completed) | (Self::AwaitingPayment, Self::Failed) => {
                true
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingPayment => "awaiting_payment",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// 从存储的字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "awaiting_payment" => Some(Self::AwaitingPayment),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
