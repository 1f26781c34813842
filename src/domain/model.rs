//! 核心领域模型：网络、代币、交易记录

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::transaction_status::TransactionStatus;
use crate::error::CoreError;

/// 支持的区块链网络
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Ethereum,
    PolygonPos,
    Tron,
    Bep20,
}

impl Network {
    /// 是否属于EVM家族（共享一套派生方案与JSON-RPC协议）
    pub fn is_evm(&self) -> bool {
        matches!(self, Self::Ethereum | Self::PolygonPos | Self::Bep20)
    }

    /// EIP-155链ID（Tron无EVM链ID）
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Self::Ethereum => Some(1),
            Self::PolygonPos => Some(137),
            Self::Bep20 => Some(56),
            Self::Tron => None,
        }
    }

    /// 规范名称（注册表查找用，大小写不敏感匹配的基准）
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::PolygonPos => "polygon",
            Self::Tron => "tron",
            Self::Bep20 => "bep20",
        }
    }

    /// 从字符串解析网络名（大小写不敏感，接受常见别名）
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.to_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Self::Ethereum),
            "polygon" | "polygon_pos" | "polygonpos" | "matic" => Ok(Self::PolygonPos),
            "tron" | "trx" => Ok(Self::Tron),
            "bep20" | "bsc" | "bnb" => Ok(Self::Bep20),
            other => Err(CoreError::UnsupportedNetwork(other.to_string())),
        }
    }

    pub fn all() -> [Network; 4] {
        [Self::Ethereum, Self::PolygonPos, Self::Tron, Self::Bep20]
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 支持的稳定币
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenSymbol {
    Usdt,
    Usdc,
}

impl TokenSymbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usdt => "USDT",
            Self::Usdc => "USDC",
        }
    }

    /// BIP44账户层索引：同一账户索引下USDT/USDC派生出不同地址
    pub fn account_offset(&self) -> u32 {
        match self {
            Self::Usdt => 0,
            Self::Usdc => 1,
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.to_uppercase().as_str() {
            "USDT" => Ok(Self::Usdt),
            "USDC" => Ok(Self::Usdc),
            other => Err(CoreError::Validation(format!("unsupported token: {other}"))),
        }
    }
}

impl std::fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 交易方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }

    /// 从存储的字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(Self::Deposit),
            "withdrawal" => Some(Self::Withdrawal),
            _ => None,
        }
    }
}

/// 交易记录
///
/// 由账本独占持有：引擎创建，仅通过验证转换变更状态，永不删除（审计追踪）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub token: TokenSymbol,
    pub network: Network,
    pub wallet_address: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    /// 仅在终态转换时设置
    pub completed_at: Option<DateTime<Utc>>,
    /// 链上交易哈希（结算进程回填）
    pub external_tx_id: Option<String>,
    /// 创建时刻的汇率快照
    pub exchange_rate: Decimal,
}

impl Transaction {
    pub fn new(
        tx_type: TransactionType,
        amount: Decimal,
        token: TokenSymbol,
        network: Network,
        wallet_address: String,
        exchange_rate: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx_type,
            amount,
            token,
            network,
            wallet_address,
            status: TransactionStatus::AwaitingPayment,
            created_at: Utc::now(),
            completed_at: None,
            external_tx_id: None,
            exchange_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_parse_accepts_aliases_case_insensitive() {
        assert_eq!(Network::parse("Ethereum").unwrap(), Network::Ethereum);
        assert_eq!(Network::parse("MATIC").unwrap(), Network::PolygonPos);
        assert_eq!(Network::parse("bsc").unwrap(), Network::Bep20);
        assert_eq!(Network::parse("TRON").unwrap(), Network::Tron);
        assert!(matches!(
            Network::parse("solana"),
            Err(CoreError::UnsupportedNetwork(_))
        ));
    }

    #[test]
    fn evm_family_and_chain_ids() {
        assert!(Network::Ethereum.is_evm());
        assert!(Network::Bep20.is_evm());
        assert!(!Network::Tron.is_evm());
        assert_eq!(Network::PolygonPos.chain_id(), Some(137));
        assert_eq!(Network::Tron.chain_id(), None);
    }

    #[test]
    fn new_transaction_starts_awaiting_payment() {
        let tx = Transaction::new(
            TransactionType::Deposit,
            Decimal::new(100, 0),
            TokenSymbol::Usdt,
            Network::Tron,
            "TJCnKsPa7y5okkXvQAidZBzqx3QyQ6sxMW".into(),
            Decimal::new(9994835, 7),
        );
        assert_eq!(tx.status, TransactionStatus::AwaitingPayment);
        assert!(tx.completed_at.is_none());
        assert!(tx.external_tx_id.is_none());
    }
}
