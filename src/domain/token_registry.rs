//! 代币注册表
//! 只读的(symbol, network)目录与网络元数据，启动时装载一次

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::model::{Network, TokenSymbol};

// USDT 合约地址
const USDT_ETH_CONTRACT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
const USDT_POLYGON_CONTRACT: &str = "0xc2132D05D31c914a87C6611C10748AEb04B58e8F";
const USDT_TRON_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
const USDT_BSC_CONTRACT: &str = "0x55d398326f99059fF775485246999027B3197955";

// USDC 合约地址
const USDC_ETH_CONTRACT: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const USDC_POLYGON_CONTRACT: &str = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174";
const USDC_TRON_CONTRACT: &str = "TEkxiTehnzSmSe2XqrBj4w32RUN966rdz8";
const USDC_BSC_CONTRACT: &str = "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d";

/// 代币挂牌信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenListing {
    pub symbol: TokenSymbol,
    pub token_name: String,
    pub network: Network,
    pub contract_address: String,
    pub decimals: u32,
    pub is_active: bool,
    pub minimum_deposit: Decimal,
    pub withdrawal_fee: Decimal,
    pub gas_estimate: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// 网络元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub network: Network,
    pub name: String,
    pub description: String,
    pub chain_id: String,
    pub explorer_url: String,
    pub is_active: bool,
}

/// 代币注册表
///
/// 纯读、无副作用，可被多任务无同步并发访问
pub struct TokenRegistry {
    listings: Vec<TokenListing>,
    networks: Vec<NetworkInfo>,
}

impl TokenRegistry {
    /// 装载内置挂牌目录（刷新策略是外部协作方职责）
    pub fn new() -> Self {
        let now = Utc::now();

        let listing = |symbol: TokenSymbol,
                       name: &str,
                       network: Network,
                       contract: &str,
                       decimals: u32,
                       min_dep: Decimal,
                       fee: Decimal,
                       gas: Decimal| TokenListing {
            symbol,
            token_name: name.to_string(),
            network,
            contract_address: contract.to_string(),
            decimals,
            is_active: true,
            minimum_deposit: min_dep,
            withdrawal_fee: fee,
            gas_estimate: gas,
            last_updated: now,
        };

        let listings = vec![
            listing(
                TokenSymbol::Usdt,
                "Tether USD",
                Network::Ethereum,
                USDT_ETH_CONTRACT,
                6,
                Decimal::new(10, 0),
                Decimal::new(25, 1),
                Decimal::new(1, 3),
            ),
            listing(
                TokenSymbol::Usdt,
                "Tether USD",
                Network::PolygonPos,
                USDT_POLYGON_CONTRACT,
                6,
                Decimal::new(5, 0),
                Decimal::new(1, 0),
                Decimal::new(1, 4),
            ),
            listing(
                TokenSymbol::Usdt,
                "Tether USD",
                Network::Tron,
                USDT_TRON_CONTRACT,
                6,
                Decimal::new(1, 0),
                Decimal::new(5, 1),
                Decimal::new(1, 5),
            ),
            listing(
                TokenSymbol::Usdt,
                "Tether USD",
                Network::Bep20,
                USDT_BSC_CONTRACT,
                18,
                Decimal::new(5, 0),
                Decimal::new(1, 0),
                Decimal::new(1, 4),
            ),
            listing(
                TokenSymbol::Usdc,
                "USD Coin",
                Network::Ethereum,
                USDC_ETH_CONTRACT,
                6,
                Decimal::new(10, 0),
                Decimal::new(25, 1),
                Decimal::new(1, 3),
            ),
            listing(
                TokenSymbol::Usdc,
                "USD Coin",
                Network::PolygonPos,
                USDC_POLYGON_CONTRACT,
                6,
                Decimal::new(5, 0),
                Decimal::new(1, 0),
                Decimal::new(1, 4),
            ),
            listing(
                TokenSymbol::Usdc,
                "USD Coin",
                Network::Tron,
                USDC_TRON_CONTRACT,
                6,
                Decimal::new(1, 0),
                Decimal::new(5, 1),
                Decimal::new(1, 5),
            ),
            listing(
                TokenSymbol::Usdc,
                "USD Coin",
                Network::Bep20,
                USDC_BSC_CONTRACT,
                18,
                Decimal::new(5, 0),
                Decimal::new(1, 0),
                Decimal::new(1, 4),
            ),
        ];

        // EVM链的链ID取自领域映射；Tron无EIP-155链ID，用主网标记
        let chain_id = |network: Network| {
            network
                .chain_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "MainNet".to_string())
        };

        let networks = vec![
            NetworkInfo {
                network: Network::Ethereum,
                name: "Ethereum".into(),
                description: "Ethereum Mainnet".into(),
                chain_id: chain_id(Network::Ethereum),
                explorer_url: "https://etherscan.io".into(),
                is_active: true,
            },
            NetworkInfo {
                network: Network::PolygonPos,
                name: "Polygon".into(),
                description: "Polygon Mainnet (formerly Matic)".into(),
                chain_id: chain_id(Network::PolygonPos),
                explorer_url: "https://polygonscan.com".into(),
                is_active: true,
            },
            NetworkInfo {
                network: Network::Tron,
                name: "Tron".into(),
                description: "Tron Mainnet".into(),
                chain_id: chain_id(Network::Tron),
                explorer_url: "https://tronscan.org".into(),
                is_active: true,
            },
            NetworkInfo {
                network: Network::Bep20,
                name: "BEP20".into(),
                description: "BNB Smart Chain Mainnet".into(),
                chain_id: chain_id(Network::Bep20),
                explorer_url: "https://bscscan.com".into(),
                is_active: true,
            },
        ];

        Self { listings, networks }
    }

    /// 自定义目录（测试/非主网部署用）
    pub fn with_catalog(listings: Vec<TokenListing>, networks: Vec<NetworkInfo>) -> Self {
        Self { listings, networks }
    }

    /// 全部启用中的挂牌
    pub fn listings(&self) -> impl Iterator<Item = &TokenListing> {
        self.listings.iter().filter(|l| l.is_active)
    }

    /// 按网络过滤（大小写不敏感）
    pub fn listings_by_network(&self, network: &str) -> Vec<&TokenListing> {
        match Network::parse(network) {
            Ok(net) => self.listings().filter(|l| l.network == net).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// 按币种符号过滤（大小写不敏感）
    pub fn listings_by_symbol(&self, symbol: &str) -> Vec<&TokenListing> {
        self.listings()
            .filter(|l| l.symbol.as_str().eq_ignore_ascii_case(symbol))
            .collect()
    }

    /// 精确查找一个(symbol, network)挂牌
    pub fn listing(&self, symbol: TokenSymbol, network: Network) -> Option<&TokenListing> {
        self.listings()
            .find(|l| l.symbol == symbol && l.network == network)
    }

    /// 全部启用中的网络
    pub fn networks(&self) -> impl Iterator<Item = &NetworkInfo> {
        self.networks.iter().filter(|n| n.is_active)
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}
