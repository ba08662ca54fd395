//! 地址验证模块
//!
//! 各链地址格式校验：EVM（格式与 EIP-55 校验和分开）、Flow 原生地址、Bitcoin。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};

/// 地址编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    /// 0x + 40 位十六进制
    Evm,
    /// 16 位十六进制（Flow 原生账户）
    Flow,
    /// Base58Check 或 bech32（bc1...）
    Bitcoin,
}

static NAME_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$")
        .ok()
});

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// EVM 地址格式：0x + 40 位十六进制，大小写不限
    pub fn is_evm_address(address: &str) -> bool {
        address
            .strip_prefix("0x")
            .map(|h| h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()))
            .unwrap_or(false)
    }

    /// EIP-55 校验和
    ///
    /// 全小写或全大写视为未带校验和；大小写混合时必须与校验和一致。
    pub fn has_valid_checksum(address: &str) -> bool {
        if !Self::is_evm_address(address) {
            return false;
        }
        let hex_part = &address[2..];
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            return Self::verify_eip55_checksum(hex_part);
        }
        true
    }

    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(hex_part: &str) -> bool {
        use sha3::{Digest, Keccak256};

        let hash = Keccak256::digest(hex_part.to_lowercase().as_bytes());

        hex_part.chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            ch.is_ascii_uppercase() == (nibble >= 8)
        })
    }

    /// 转为 EIP-55 校验和格式
    pub fn to_checksum(address: &str) -> WalletResult<String> {
        if !Self::is_evm_address(address) {
            return Err(WalletError::InvalidAddress(address.to_string()));
        }
        let parsed: ethers::types::Address = address
            .parse()
            .map_err(|_| WalletError::InvalidAddress(address.to_string()))?;
        Ok(ethers::utils::to_checksum(&parsed, None))
    }

    /// Flow 原生地址：16 位十六进制，可带 0x 前缀
    pub fn is_flow_address(address: &str) -> bool {
        let body = address.strip_prefix("0x").unwrap_or(address);
        body.len() == 16 && body.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Bitcoin 地址（校验 Base58Check 或 bech32 校验和）
    pub fn is_bitcoin_address(address: &str) -> bool {
        if address.starts_with('1') || address.starts_with('3') {
            return match bs58::decode(address).with_check(None).into_vec() {
                // 版本字节 + 20 字节哈希
                Ok(payload) => payload.len() == 21 && matches!(payload[0], 0x00 | 0x05),
                Err(_) => false,
            };
        }

        if address.to_lowercase().starts_with("bc1") {
            return match bech32::decode(address) {
                Ok((hrp, _)) => hrp.as_str().eq_ignore_ascii_case("bc"),
                Err(_) => false,
            };
        }

        false
    }

    /// 是否为全零地址
    pub fn is_zero_address(address: &str) -> bool {
        let body = address.strip_prefix("0x").unwrap_or(address);
        !body.is_empty() && body.chars().all(|c| c == '0')
    }

    /// 是否为名称（形如 `alice.eth`）
    pub fn is_name(input: &str) -> bool {
        let lower = input.to_lowercase();
        NAME_RE
            .as_ref()
            .map(|re| re.is_match(&lower))
            .unwrap_or(false)
    }

    /// 判断地址格式
    pub fn detect_format(address: &str) -> Option<AddressFormat> {
        if Self::is_evm_address(address) {
            Some(AddressFormat::Evm)
        } else if Self::is_flow_address(address) {
            Some(AddressFormat::Flow)
        } else if Self::is_bitcoin_address(address) {
            Some(AddressFormat::Bitcoin)
        } else {
            None
        }
    }

    /// 按格式校验，失败返回 `InvalidAddress`
    ///
    /// 作为转账收款方时 EVM 地址还必须通过校验和。
    pub fn validate(format: AddressFormat, address: &str) -> WalletResult<()> {
        let ok = match format {
            AddressFormat::Evm => Self::has_valid_checksum(address),
            AddressFormat::Flow => Self::is_flow_address(address),
            AddressFormat::Bitcoin => Self::is_bitcoin_address(address),
        };

        if ok && !Self::is_zero_address(address) {
            Ok(())
        } else {
            Err(WalletError::InvalidAddress(address.to_string()))
        }
    }
}
