//! 日志脱敏
//!
//! PIN、私钥、助记词、密钥库密文、Bearer token 一律不进日志；
//! 地址和原始交易只输出首尾片段。

use serde::Serialize;

use crate::domain::{keystore::EncryptedKeystore, transfer::TransferRequest};

/// 可脱敏trait
pub trait SensitiveRedact {
    fn redact(&self) -> String;
}

/// 脱敏十六进制字符串（显示前缀和后缀）
pub fn redact_hex_string(hex: &str, show_chars: usize) -> String {
    let chars: Vec<char> = hex.chars().collect();
    if chars.len() <= show_chars * 2 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..show_chars].iter().collect();
    let suffix: String = chars[chars.len() - show_chars..].iter().collect();
    format!("{prefix}...{suffix}")
}

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() < 10 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..6].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}...{suffix}")
}

/// 脱敏法币支付标识（`alice@oksbi` -> `a***@oksbi`）
pub fn redact_identifier(identifier: &str) -> String {
    match identifier.split_once('@') {
        Some((local, provider)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{provider}")
        }
        None => "***".to_string(),
    }
}

#[derive(Serialize)]
struct RedactedTransferRequest<'a> {
    from: String,
    to: String,
    amount: &'a str,
    token: &'a str,
    chain_id: u64,
}

impl SensitiveRedact for TransferRequest {
    fn redact(&self) -> String {
        serde_json::to_string(&RedactedTransferRequest {
            from: redact_address(&self.signing_key.address_string()),
            to: redact_address(&self.to_address),
            amount: &self.amount,
            token: &self.token.symbol,
            chain_id: self.network.chain_id,
        })
        .unwrap_or_else(|_| "{ redacted }".to_string())
    }
}

impl SensitiveRedact for EncryptedKeystore {
    fn redact(&self) -> String {
        format!(
            "{{\"wallet_address\":\"{}\",\"blob_len\":{}}}",
            redact_address(&self.wallet_address),
            self.encrypted_blob.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_hex_string() {
        let hex = "0x1234567890abcdef1234567890abcdef12345678";
        assert_eq!(redact_hex_string(hex, 10), "0x12345678...ef12345678");
        assert_eq!(redact_hex_string("0x12", 10), "****");
    }

    #[test]
    fn test_redact_address() {
        let address = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bFd2";
        assert_eq!(redact_address(address), "0x742d...bFd2");
        assert_eq!(redact_address("short"), "*****");
    }

    #[test]
    fn test_redact_identifier() {
        assert_eq!(redact_identifier("alice@oksbi"), "a***@oksbi");
        assert_eq!(redact_identifier("noprovider"), "***");
    }

    #[test]
    fn test_keystore_redaction_hides_blob() {
        let ks = EncryptedKeystore::new("{\"crypto\":\"secret\"}", "0x742d35Cc6634C0532925a3b844Bc9e7595f0bFd2");
        let redacted = ks.redact();
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("0x742d...bFd2"));
    }
}
