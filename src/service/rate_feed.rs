//! 汇率源
//!
//! 引擎在交易创建时刻消费一次汇率快照。源本身的设计（缓存、陈旧度、
//! 多供应商故障转移）是外部协作方职责，这里只给出契约和两个实现。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::model::TokenSymbol;
use crate::error::CoreError;

/// 缓存有效期（秒）
const CACHE_TTL_SECS: i64 = 300;

/// 出站调用超时：汇率源卡死时降级为1:1记账，不能挂住交易创建
const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[async_trait]
pub trait RateFeed: Send + Sync {
    /// 代币对美元的当前汇率
    async fn rate(&self, token: TokenSymbol) -> Result<Decimal, CoreError>;
}

/// 固定汇率源（测试与降级路径）
pub struct StaticRateFeed {
    rate: Decimal,
}

impl StaticRateFeed {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

impl Default for StaticRateFeed {
    fn default() -> Self {
        // 历史快照值，沿用原系统的默认汇率
        Self::new(Decimal::new(9994835, 7))
    }
}

#[async_trait]
impl RateFeed for StaticRateFeed {
    async fn rate(&self, _token: TokenSymbol) -> Result<Decimal, CoreError> {
        Ok(self.rate)
    }
}

/// CoinGecko响应
#[derive(Debug, Deserialize)]
struct CoinGeckoCoin {
    usd: f64,
}

struct CachedRate {
    rate: Decimal,
    fetched_at: DateTime<Utc>,
}

/// CoinGecko实时汇率源，带5分钟内存缓存
pub struct CoinGeckoRateFeed {
    api_url: String,
    http_client: reqwest::Client,
    cache: RwLock<HashMap<TokenSymbol, CachedRate>>,
}

impl CoinGeckoRateFeed {
    pub fn new() -> Result<Self, CoreError> {
        Self::with_api_url("https://api.coingecko.com/api/v3")
    }

    pub fn with_api_url(api_url: &str) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CoreError::Configuration(format!("http client build failed: {e}")))?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn coin_id(token: TokenSymbol) -> &'static str {
        match token {
            TokenSymbol::Usdt => "tether",
            TokenSymbol::Usdc => "usd-coin",
        }
    }
}

#[async_trait]
impl RateFeed for CoinGeckoRateFeed {
    async fn rate(&self, token: TokenSymbol) -> Result<Decimal, CoreError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&token) {
                let age = Utc::now() - cached.fetched_at;
                if age.num_seconds() < CACHE_TTL_SECS {
                    return Ok(cached.rate);
                }
            }
        }

        let coin_id = Self::coin_id(token);
        let url = format!(
            "{}/simple/price?ids={coin_id}&vs_currencies=usd",
            self.api_url
        );

        let response: HashMap<String, CoinGeckoCoin> = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(CoreError::from_transport)?
            .json()
            .await
            .map_err(CoreError::from_transport)?;

        let usd = response
            .get(coin_id)
            .map(|c| c.usd)
            .ok_or_else(|| CoreError::Verification(format!("rate feed has no entry for {token}")))?;

        let rate = Decimal::from_f64(usd)
            .ok_or_else(|| CoreError::Verification(format!("rate value out of range: {usd}")))?;

        let mut cache = self.cache.write().await;
        cache.insert(
            token,
            CachedRate {
                rate,
                fetched_at: Utc::now(),
            },
        );

        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_feed_returns_configured_rate() {
        let feed = StaticRateFeed::default();
        let rate = tokio_test::block_on(feed.rate(TokenSymbol::Usdt)).unwrap();
        assert_eq!(rate, Decimal::new(9994835, 7));
    }

    #[test]
    fn coingecko_feed_constructs_with_bounded_timeouts() {
        assert!(CoinGeckoRateFeed::new().is_ok());
        assert!(CoinGeckoRateFeed::with_api_url("http://localhost:9999/").is_ok());
    }

    #[test]
    fn coin_ids_map_to_coingecko_slugs() {
        assert_eq!(CoinGeckoRateFeed::coin_id(TokenSymbol::Usdt), "tether");
        assert_eq!(CoinGeckoRateFeed::coin_id(TokenSymbol::Usdc), "usd-coin");
    }
}
