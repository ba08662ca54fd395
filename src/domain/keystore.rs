//! 加密密钥库

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 加密后的密钥库（不透明信封 + 钱包地址）
///
/// 钱包创建时生成一次，此后不在原处重新加密。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedKeystore {
    #[serde(rename = "encryptedKeystore")]
    pub encrypted_blob: String,
    pub wallet_address: String,
}

impl EncryptedKeystore {
    pub fn new(encrypted_blob: impl Into<String>, wallet_address: impl Into<String>) -> Self {
        Self {
            encrypted_blob: encrypted_blob.into(),
            wallet_address: wallet_address.into(),
        }
    }
}

impl fmt::Debug for EncryptedKeystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedKeystore")
            .field("encrypted_blob", &format_args!("<{} bytes>", self.encrypted_blob.len()))
            .field("wallet_address", &self.wallet_address)
            .finish()
    }
}

/// 存储端返回的密钥库及其版本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredKeystore {
    pub keystore: EncryptedKeystore,
    /// 每次覆盖写入递增，从 1 开始
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 写入确认
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreAck {
    pub wallet_address: String,
    #[serde(default)]
    pub version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let ks = EncryptedKeystore::new("{\"version\":1}", "0xabc");
        let json = serde_json::to_value(&ks).unwrap();
        assert_eq!(json["encryptedKeystore"], "{\"version\":1}");
        assert_eq!(json["walletAddress"], "0xabc");
    }

    #[test]
    fn test_debug_hides_blob() {
        let ks = EncryptedKeystore::new("secret-ciphertext", "0xabc");
        let debug = format!("{ks:?}");
        assert!(!debug.contains("secret-ciphertext"));
        assert!(debug.contains("0xabc"));
    }
}
