//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub blockchain: BlockchainConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 钱包配置
///
/// 助记词是托管平台的主密钥：不打日志、不出接口、不嵌入地址字符串
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_mnemonic")]
    pub mnemonic: String,
}

/// 区块链RPC配置
///
/// 每个字段单独可省略：配置文件只写想覆盖的键，其余回退到环境变量默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainConfig {
    #[serde(default = "default_eth_rpc_url")]
    pub eth_rpc_url: String,
    #[serde(default = "default_polygon_rpc_url")]
    pub polygon_rpc_url: String,
    #[serde(default = "default_bsc_rpc_url")]
    pub bsc_rpc_url: String,
    #[serde(default = "default_tron_api_url")]
    pub tron_api_url: String,
    /// TronGrid API key（可选，设置后附加TRON-PRO-API-KEY请求头）
    #[serde(default = "default_tron_api_key")]
    pub tron_api_key: Option<String>,
    /// 单次出站调用超时（秒）。到期映射为NetworkUnavailable而非无限等待
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// 账本存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String, // "json" or "text"
}

fn default_mnemonic() -> String {
    std::env::var("WALLET_MNEMONIC").unwrap_or_default()
}

fn default_eth_rpc_url() -> String {
    std::env::var("ETH_RPC_URL").unwrap_or_else(|_| "https://eth.llamarpc.com".into())
}

fn default_polygon_rpc_url() -> String {
    std::env::var("POLYGON_RPC_URL").unwrap_or_else(|_| "https://polygon-rpc.com".into())
}

fn default_bsc_rpc_url() -> String {
    std::env::var("BSC_RPC_URL").unwrap_or_else(|_| "https://bsc-dataseed.binance.org".into())
}

fn default_tron_api_url() -> String {
    std::env::var("TRON_API_URL").unwrap_or_else(|_| "https://api.trongrid.io".into())
}

fn default_tron_api_key() -> Option<String> {
    std::env::var("TRONGRID_API_KEY").ok()
}

fn default_request_timeout_secs() -> u64 {
    std::env::var("RPC_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30)
}

fn default_connect_timeout_secs() -> u64 {
    std::env::var("RPC_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
}

fn default_database_url() -> String {
    std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost:5432/stablecore".into())
}

fn default_max_connections() -> u32 {
    std::env::var("DB_MAX_CONNS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(16)
}

fn default_log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "stablecore=debug,sqlx=warn".into())
}

fn default_log_format() -> String {
    std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into())
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            mnemonic: default_mnemonic(),
        }
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            eth_rpc_url: default_eth_rpc_url(),
            polygon_rpc_url: default_polygon_rpc_url(),
            bsc_rpc_url: default_bsc_rpc_url(),
            tron_api_url: default_tron_api_url(),
            tron_api_key: default_tron_api_key(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wallet: WalletConfig::default(),
            blockchain: BlockchainConfig::default(),
            ledger: LedgerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 从环境变量和可选的TOML配置文件加载配置
    ///
    /// 文件中的字段覆盖环境变量默认值
    pub fn from_env_and_file(path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        match path {
            Some(p) if Path::new(p).exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file: {p}"))?;
                let config: Config =
                    toml::from_str(&raw).with_context(|| format!("invalid config file: {p}"))?;
                Ok(config)
            }
            Some(p) => anyhow::bail!("config file not found: {p}"),
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_overrides_defaults() {
        let raw = r#"
            [wallet]
            mnemonic = "test test test test test test test test test test test junk"

            [blockchain]
            eth_rpc_url = "http://localhost:8545"
            polygon_rpc_url = "http://localhost:8546"
            bsc_rpc_url = "http://localhost:8547"
            tron_api_url = "http://localhost:8548"
            request_timeout_secs = 5
            connect_timeout_secs = 2
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.blockchain.eth_rpc_url, "http://localhost:8545");
        assert_eq!(config.blockchain.request_timeout_secs, 5);
        assert!(config.blockchain.tron_api_key.is_none());
        // 未指定的段落回退到默认值
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn partial_section_keeps_per_field_defaults() {
        // 段落里只写想覆盖的键，其余字段逐个回退
        let raw = r#"
            [blockchain]
            eth_rpc_url = "http://localhost:8545"

            [ledger]
            max_connections = 4
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.blockchain.eth_rpc_url, "http://localhost:8545");
        assert_eq!(config.blockchain.request_timeout_secs, 30);
        assert_eq!(config.blockchain.connect_timeout_secs, 10);
        assert_eq!(config.blockchain.tron_api_url, "https://api.trongrid.io");
        assert_eq!(config.ledger.max_connections, 4);
        assert!(config.ledger.database_url.starts_with("postgres://"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = Config::from_env_and_file(Some("/nonexistent/config.toml"));
        assert!(result.is_err());
    }
}
