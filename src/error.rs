//! 统一错误分类
//!
//! 适配器层在边界处把传输错误翻译为本分类，引擎从不解释原始传输错误。
//! 用户可见的消息不包含端点URL、助记词等内部细节。

use rust_decimal::Decimal;

use crate::domain::model::Network;

/// 核心错误分类
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// 调用方输入错误（可由用户纠正）
    #[error("validation failed: {0}")]
    Validation(String),

    /// (token, network) 组合不在注册表中
    #[error("token {token} is not supported on network {network}")]
    UnsupportedToken { token: String, network: String },

    /// 未配置/未知的网络
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// 网络探活失败（仅该网络，退避后可重试）
    #[error("network {0} is currently unavailable")]
    ServiceUnavailable(Network),

    /// 业务规则拒绝：余额不足（余额变化前不可重试）
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    /// 适配器I/O超时或连接失败（可重试）
    #[error("network request failed: {0}")]
    NetworkUnavailable(String),

    /// 适配器响应无法解析为预期形状（需要重新探活，不可盲目重试）
    #[error("verification response could not be interpreted: {0}")]
    Verification(String),

    /// 配置缺失或非法（启动时致命，绝不逐请求出现）
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 记录不存在
    #[error("record not found")]
    NotFound,

    /// 非法状态转换（终态不可离开）
    #[error("invalid status transition: {0}")]
    InvalidTransition(String),

    /// 未预期的内部错误（细节只进日志，不出接口）
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl CoreError {
    /// 是否可以在退避后重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_) | Self::NetworkUnavailable(_)
        )
    }

    /// 把reqwest错误翻译为分类错误
    ///
    /// 超时/连接失败 → NetworkUnavailable；响应体解析失败 → Verification。
    /// 错误消息先剥掉URL，端点地址不进任何对外文案。
    pub fn from_transport(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() || err.is_connect() {
            Self::NetworkUnavailable(format!("request to blockchain endpoint failed: {err}"))
        } else if err.is_decode() {
            Self::Verification(format!("unexpected response shape: {err}"))
        } else {
            Self::NetworkUnavailable(format!("transport error: {err}"))
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Internal(anyhow::Error::new(other).context("ledger store failure")),
        }
    }
}
