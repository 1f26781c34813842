//! 充值地址派生
//!
//! 同一主密钥下确定性派生：相同输入永远得到相同地址。
//! EVM家族（Ethereum/Polygon/BEP20）共用secp256k1一套方案，同一(token, index)
//! 在三条链上合法复用同一地址；Tron同曲线但地址编码不同（base58check, 0x41前缀）。
//!
//! 地址策略为PerAccount：每个(token, network, account)一个静态地址，充值复用。

use coins_bip32::path::DerivationPath;
use k256::ecdsa::SigningKey;
use sha2::{Digest as Sha2Digest, Sha256};
use sha3::{Digest, Keccak256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::model::{Network, TokenSymbol};
use crate::error::CoreError;

/// BIP44 coin type
const COIN_TYPE_EVM: u32 = 60;
const COIN_TYPE_TRON: u32 = 195;

/// Tron地址版本前缀
const TRON_ADDRESS_PREFIX: u8 = 0x41;

/// 地址派生器
///
/// 助记词在构造时解析并展开为种子，种子在Drop时清零。
/// 助记词本身不保留、不打日志、不经任何接口返回。
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AddressDeriver {
    seed: [u8; 64],
}

impl AddressDeriver {
    /// 从BIP39助记词构造
    ///
    /// 助记词缺失或非法 → Configuration（启动时致命，不逐请求暴露）
    pub fn new(mnemonic: &str) -> Result<Self, CoreError> {
        if mnemonic.trim().is_empty() {
            return Err(CoreError::Configuration(
                "wallet mnemonic is not configured".into(),
            ));
        }

        let parsed = bip39::Mnemonic::parse_in(bip39::Language::English, mnemonic.trim())
            .map_err(|_| CoreError::Configuration("wallet mnemonic is malformed".into()))?;

        Ok(Self {
            seed: parsed.to_seed(""),
        })
    }

    /// 派生充值地址
    ///
    /// 路径 m/44'/{coin}'/{token}'/0/{index}：
    /// USDT与USDC落在不同的账户层，同一账户索引互不串地址
    pub fn derive(
        &self,
        token: TokenSymbol,
        network: Network,
        account_index: u32,
    ) -> Result<String, CoreError> {
        let coin_type = if network.is_evm() {
            COIN_TYPE_EVM
        } else {
            COIN_TYPE_TRON
        };

        let path = format!(
            "m/44'/{}'/{}'/0/{}",
            coin_type,
            token.account_offset(),
            account_index
        );

        let public_key = self.derive_public_key(&path)?;

        if network.is_evm() {
            Ok(evm_address(&public_key))
        } else {
            Ok(tron_address(&public_key))
        }
    }

    /// 沿BIP32路径派生未压缩公钥（去掉0x04前缀的64字节）
    fn derive_public_key(&self, path: &str) -> Result<Vec<u8>, CoreError> {
        use coins_bip32::prelude::*;

        let derivation_path = path
            .parse::<DerivationPath>()
            .map_err(|e| CoreError::Internal(anyhow::anyhow!("invalid derivation path: {e}")))?;

        let master_key = XPriv::root_from_seed(&self.seed, None)
            .map_err(|e| CoreError::Internal(anyhow::anyhow!("master key derivation: {e}")))?;

        let derived_key = master_key
            .derive_path(&derivation_path)
            .map_err(|e| CoreError::Internal(anyhow::anyhow!("child key derivation: {e}")))?;

        // XPriv 实现 AsRef<SigningKey>
        let signing_key: &SigningKey = derived_key.as_ref();
        let verifying_key = signing_key.verifying_key();
        let encoded = verifying_key.to_encoded_point(false); // 未压缩格式

        Ok(encoded.as_bytes()[1..].to_vec())
    }
}

/// EVM地址：Keccak256(公钥)后20字节，0x十六进制编码
fn evm_address(public_key: &[u8]) -> String {
    let hash = Keccak256::digest(public_key);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Tron地址：0x41 ‖ Keccak256(公钥)后20字节，base58check编码
fn tron_address(public_key: &[u8]) -> String {
    let hash = Keccak256::digest(public_key);

    let mut payload = Vec::with_capacity(25);
    payload.push(TRON_ADDRESS_PREFIX);
    payload.extend_from_slice(&hash[12..]);

    // base58check校验和：double SHA-256前4字节
    let checksum = Sha256::digest(Sha256::digest(&payload));
    payload.extend_from_slice(&checksum[..4]);

    bs58::encode(payload).into_string()
}

/// 把base58check编码的Tron地址解码为21字节原始形式（0x41前缀）
///
/// 合约调用参数编码与地址校验共用
pub fn tron_address_to_raw(address: &str) -> Result<[u8; 21], CoreError> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|_| CoreError::Validation(format!("invalid tron address: {address}")))?;

    if decoded.len() != 25 || decoded[0] != TRON_ADDRESS_PREFIX {
        return Err(CoreError::Validation(format!(
            "invalid tron address: {address}"
        )));
    }

    let (payload, checksum) = decoded.split_at(21);
    let expected = Sha256::digest(Sha256::digest(payload));
    if checksum != &expected[..4] {
        return Err(CoreError::Validation(format!(
            "tron address checksum mismatch: {address}"
        )));
    }

    let mut raw = [0u8; 21];
    raw.copy_from_slice(payload);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "test test test test test test test test test test test junk";

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(TEST_MNEMONIC).unwrap()
    }

    #[test]
    fn empty_or_malformed_mnemonic_is_a_configuration_error() {
        assert!(matches!(
            AddressDeriver::new(""),
            Err(CoreError::Configuration(_))
        ));
        assert!(matches!(
            AddressDeriver::new("not a valid mnemonic phrase at all"),
            Err(CoreError::Configuration(_))
        ));
    }

    #[test]
    fn derivation_is_deterministic() {
        let d = deriver();
        let a = d.derive(TokenSymbol::Usdt, Network::Tron, 7).unwrap();
        let b = d.derive(TokenSymbol::Usdt, Network::Tron, 7).unwrap();
        assert_eq!(a, b);

        // 新实例、同助记词 → 同地址
        let c = deriver().derive(TokenSymbol::Usdt, Network::Tron, 7).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn evm_networks_share_one_address_per_token_and_index() {
        let d = deriver();
        let eth = d.derive(TokenSymbol::Usdc, Network::Ethereum, 0).unwrap();
        let pol = d.derive(TokenSymbol::Usdc, Network::PolygonPos, 0).unwrap();
        let bsc = d.derive(TokenSymbol::Usdc, Network::Bep20, 0).unwrap();
        assert_eq!(eth, pol);
        assert_eq!(eth, bsc);
        assert!(eth.starts_with("0x"));
        assert_eq!(eth.len(), 42);
    }

    #[test]
    fn tron_uses_a_distinct_encoding() {
        let d = deriver();
        let evm = d.derive(TokenSymbol::Usdt, Network::Ethereum, 0).unwrap();
        let tron = d.derive(TokenSymbol::Usdt, Network::Tron, 0).unwrap();
        assert_ne!(evm, tron);
        assert!(tron.starts_with('T'));
        assert_eq!(tron.len(), 34);
    }

    #[test]
    fn tokens_do_not_share_addresses() {
        let d = deriver();
        let usdt = d.derive(TokenSymbol::Usdt, Network::Ethereum, 0).unwrap();
        let usdc = d.derive(TokenSymbol::Usdc, Network::Ethereum, 0).unwrap();
        assert_ne!(usdt, usdc);
    }

    #[test]
    fn distinct_indexes_yield_distinct_addresses() {
        let d = deriver();
        let a0 = d.derive(TokenSymbol::Usdt, Network::Tron, 0).unwrap();
        let a1 = d.derive(TokenSymbol::Usdt, Network::Tron, 1).unwrap();
        assert_ne!(a0, a1);
    }

    #[test]
    fn derived_tron_address_round_trips_through_raw_form() {
        let d = deriver();
        let address = d.derive(TokenSymbol::Usdt, Network::Tron, 0).unwrap();
        let raw = tron_address_to_raw(&address).unwrap();
        assert_eq!(raw[0], TRON_ADDRESS_PREFIX);
    }

    #[test]
    fn raw_decoding_rejects_tampered_addresses() {
        assert!(tron_address_to_raw("TJCnKsPa7y5okkXvQAidZBzqx3QyQ6sxMX").is_err());
        assert!(tron_address_to_raw("0x71CB05EE1b1F506fF321Da3dac38f25c0c9ce6E1").is_err());
        assert!(tron_address_to_raw("").is_err());
    }
}
