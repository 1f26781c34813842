//! EVM家族适配器（Ethereum / Polygon / BEP20）
//!
//! 同一套JSON-RPC协议，每条链一个实例、各自的端点与链ID。
//! 传输失败在本层翻译为错误分类，不向引擎泄漏原始reqwest错误。

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::config::BlockchainConfig;
use crate::domain::model::Network;
use crate::error::CoreError;
use crate::service::adapter::{decode_hex_amount, NetworkAdapter, VerificationOutcome};

/// ERC-20 balanceOf(address) 函数选择子
const BALANCE_OF_SELECTOR: &str = "0x70a08231";

/// 原生资产小数位（wei）
const NATIVE_DECIMALS: u32 = 18;

pub struct EvmAdapter {
    network: Network,
    rpc_url: String,
    http_client: reqwest::Client,
}

impl EvmAdapter {
    pub fn new(
        network: Network,
        rpc_url: &str,
        config: &BlockchainConfig,
    ) -> Result<Self, CoreError> {
        if !network.is_evm() {
            return Err(CoreError::UnsupportedNetwork(network.to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| CoreError::Configuration(format!("http client build failed: {e}")))?;

        Ok(Self {
            network,
            rpc_url: rpc_url.to_string(),
            http_client,
        })
    }

    /// 发起一次JSON-RPC调用，返回result字段
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, CoreError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(CoreError::from_transport)?;

        if !response.status().is_success() {
            return Err(CoreError::NetworkUnavailable(format!(
                "rpc endpoint for {} returned status {}",
                self.network,
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(CoreError::from_transport)?;

        // JSON-RPC错误：响应完好但调用被节点拒绝，盲目重试无意义
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown rpc error");
            return Err(CoreError::Verification(format!(
                "rpc error on {}: {message}",
                self.network
            )));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| CoreError::Verification("missing result field in rpc response".into()))
    }
}

#[async_trait]
impl NetworkAdapter for EvmAdapter {
    fn network(&self) -> Network {
        self.network
    }

    async fn is_operational(&self) -> bool {
        match self.rpc_call("eth_blockNumber", json!([])).await {
            Ok(result) => {
                let height = result
                    .as_str()
                    .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
                    .unwrap_or(0);
                height > 0
            }
            Err(e) => {
                tracing::debug!(network = %self.network, error = %e, "operational probe failed");
                false
            }
        }
    }

    async fn native_balance(&self, address: &str) -> Result<Decimal, CoreError> {
        validate_evm_address(address)?;

        let result = self
            .rpc_call("eth_getBalance", json!([address, "latest"]))
            .await?;

        let hex = result
            .as_str()
            .ok_or_else(|| CoreError::Verification("eth_getBalance result is not a string".into()))?;
        decode_hex_amount(hex, NATIVE_DECIMALS)
    }

    async fn token_balance(
        &self,
        address: &str,
        contract_address: &str,
        decimals: u32,
    ) -> Result<Decimal, CoreError> {
        let data = encode_balance_of(address)?;

        let result = self
            .rpc_call(
                "eth_call",
                json!([{ "to": contract_address, "data": data }, "latest"]),
            )
            .await?;

        let hex = result
            .as_str()
            .ok_or_else(|| CoreError::Verification("eth_call result is not a string".into()))?;
        decode_hex_amount(hex, decimals)
    }

    async fn verify_transaction(&self, tx_hash: &str) -> Result<VerificationOutcome, CoreError> {
        let tx = self
            .rpc_call("eth_getTransactionByHash", json!([tx_hash]))
            .await?;

        if tx.is_null() {
            return Ok(VerificationOutcome::not_found());
        }

        let receipt = self
            .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;

        // 已知但无回执：还在内存池里，尚未确认
        if receipt.is_null() {
            return Ok(VerificationOutcome {
                found: true,
                confirmed: false,
                success: false,
            });
        }

        // status 0x1 = 成功, 0x0 = revert
        let status = receipt
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(|s| u8::from_str_radix(s.trim_start_matches("0x"), 16).ok())
            .ok_or_else(|| {
                CoreError::Verification("receipt is missing a parsable status field".into())
            })?;

        Ok(VerificationOutcome {
            found: true,
            confirmed: true,
            success: status == 1,
        })
    }
}

/// 校验EVM地址格式：0x + 40位十六进制
pub(crate) fn validate_evm_address(address: &str) -> Result<(), CoreError> {
    let hex_part = address
        .strip_prefix("0x")
        .ok_or_else(|| CoreError::Validation(format!("invalid evm address: {address}")))?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::Validation(format!(
            "invalid evm address: {address}"
        )));
    }
    Ok(())
}

/// 编码balanceOf(address)调用数据：选择子 + 左零填充到32字节的地址
fn encode_balance_of(address: &str) -> Result<String, CoreError> {
    validate_evm_address(address)?;
    let padded = format!("{:0>64}", address.trim_start_matches("0x").to_lowercase());
    Ok(format!("{BALANCE_OF_SELECTOR}{padded}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_of_calldata_is_selector_plus_padded_address() {
        let data = encode_balance_of("0x71CB05EE1b1F506fF321Da3dac38f25c0c9ce6E1").unwrap();
        assert_eq!(data.len(), 10 + 64);
        assert!(data.starts_with("0x70a08231"));
        assert!(data.ends_with("71cb05ee1b1f506ff321da3dac38f25c0c9ce6e1"));
        // 填充区全零
        assert!(data[10..34].chars().all(|c| c == '0'));
    }

    #[test]
    fn evm_address_validation() {
        assert!(validate_evm_address("0x71CB05EE1b1F506fF321Da3dac38f25c0c9ce6E1").is_ok());
        assert!(validate_evm_address("71CB05EE1b1F506fF321Da3dac38f25c0c9ce6E1").is_err());
        assert!(validate_evm_address("0x71CB05").is_err());
        assert!(validate_evm_address("0xZZCB05EE1b1F506fF321Da3dac38f25c0c9ce6E1").is_err());
    }

    #[test]
    fn non_evm_network_is_rejected_at_construction() {
        let config = BlockchainConfig {
            eth_rpc_url: "http://localhost:8545".into(),
            polygon_rpc_url: "http://localhost:8546".into(),
            bsc_rpc_url: "http://localhost:8547".into(),
            tron_api_url: "http://localhost:8548".into(),
            tron_api_key: None,
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
        };
        assert!(matches!(
            EvmAdapter::new(Network::Tron, "http://localhost:8545", &config),
            Err(CoreError::UnsupportedNetwork(_))
        ));
    }
}
