//! Tron适配器
//!
//! 走TronGrid REST网关而非JSON-RPC：余额要通过智能合约触发调用读取，
//! 调用参数是base58check地址解码后的十六进制形式；验证看执行回执的
//! contractRet成功标记。

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::config::BlockchainConfig;
use crate::domain::derivation::tron_address_to_raw;
use crate::domain::model::Network;
use crate::error::CoreError;
use crate::service::adapter::{decode_hex_amount, scale_raw_amount, NetworkAdapter, VerificationOutcome};

/// TRX原生单位SUN的小数位
const SUN_DECIMALS: u32 = 6;

pub struct TronAdapter {
    api_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl TronAdapter {
    pub fn new(config: &BlockchainConfig) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| CoreError::Configuration(format!("http client build failed: {e}")))?;

        Ok(Self {
            api_url: config.tron_api_url.trim_end_matches('/').to_string(),
            api_key: config.tron_api_key.clone(),
            http_client,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("TRON-PRO-API-KEY", key),
            None => builder,
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, CoreError> {
        let url = format!("{}{path}", self.api_url);
        let response = self
            .request(self.http_client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(CoreError::from_transport)?;

        if !response.status().is_success() {
            return Err(CoreError::NetworkUnavailable(format!(
                "tron gateway returned status {}",
                response.status()
            )));
        }

        response.json().await.map_err(CoreError::from_transport)
    }

    async fn get(&self, path: &str) -> Result<Value, CoreError> {
        let url = format!("{}{path}", self.api_url);
        let response = self
            .request(self.http_client.get(&url))
            .send()
            .await
            .map_err(CoreError::from_transport)?;

        if !response.status().is_success() {
            return Err(CoreError::NetworkUnavailable(format!(
                "tron gateway returned status {}",
                response.status()
            )));
        }

        response.json().await.map_err(CoreError::from_transport)
    }
}

#[async_trait]
impl NetworkAdapter for TronAdapter {
    fn network(&self) -> Network {
        Network::Tron
    }

    async fn is_operational(&self) -> bool {
        match self.post("/wallet/getnowblock", json!({})).await {
            Ok(block) => {
                let height = block
                    .pointer("/block_header/raw_data/number")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                height > 0
            }
            Err(e) => {
                tracing::debug!(network = "tron", error = %e, "operational probe failed");
                false
            }
        }
    }

    async fn native_balance(&self, address: &str) -> Result<Decimal, CoreError> {
        tron_address_to_raw(address)?;

        let account = self
            .post(
                "/wallet/getaccount",
                json!({ "address": address, "visible": true }),
            )
            .await?;

        // 链上从未激活的账户返回空对象，按零余额处理
        let sun = account.get("balance").and_then(|v| v.as_u64()).unwrap_or(0);
        scale_raw_amount(sun as u128, SUN_DECIMALS)
    }

    async fn token_balance(
        &self,
        address: &str,
        contract_address: &str,
        decimals: u32,
    ) -> Result<Decimal, CoreError> {
        let response = self
            .post(
                "/wallet/triggersmartcontract",
                json!({
                    "owner_address": address,
                    "contract_address": contract_address,
                    "function_selector": "balanceOf(address)",
                    "parameter": encode_tron_call_parameter(address)?,
                    "visible": true
                }),
            )
            .await?;

        let hex = response
            .get("constant_result")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                CoreError::Verification("trigger response is missing constant_result".into())
            })?;

        decode_hex_amount(hex, decimals)
    }

    async fn verify_transaction(&self, tx_hash: &str) -> Result<VerificationOutcome, CoreError> {
        let response = self.get(&format!("/v1/transactions/{tx_hash}")).await?;

        let data = response
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                CoreError::Verification("transaction response is missing data array".into())
            })?;

        let Some(tx) = data.first() else {
            return Ok(VerificationOutcome::not_found());
        };

        // 执行回执：contractRet == "SUCCESS" 为成功标记
        match tx.pointer("/ret/0/contractRet").and_then(|v| v.as_str()) {
            Some(result) => Ok(VerificationOutcome {
                found: true,
                confirmed: true,
                success: result == "SUCCESS",
            }),
            // 已广播但还没有执行结果
            None => Ok(VerificationOutcome {
                found: true,
                confirmed: false,
                success: false,
            }),
        }
    }
}

/// 合约调用参数：base58check地址 → 去版本前缀的20字节 → 左零填充64位十六进制
fn encode_tron_call_parameter(address: &str) -> Result<String, CoreError> {
    let raw = tron_address_to_raw(address)?;
    Ok(format!("{:0>64}", hex::encode(&raw[1..])))
}

/// 校验Tron地址格式（引擎提现校验用）
pub(crate) fn validate_tron_address(address: &str) -> Result<(), CoreError> {
    if !address.starts_with('T') || address.len() != 34 {
        return Err(CoreError::Validation(format!(
            "invalid tron address: {address}"
        )));
    }
    tron_address_to_raw(address).map(|_| ())
}
