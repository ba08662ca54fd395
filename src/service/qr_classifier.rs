//! 二维码内容识别
//!
//! 把扫描或上传得到的任意文本转换为 `PaymentTarget`。纯函数，无 I/O。
//! 规则按优先级依次尝试，先匹配者生效：
//!
//! 1. 法币支付标识（`id@provider`，或 `upi://pay?pa=...` 等查询参数）
//! 2. 带链 ID 的链上地址 URI（`ethereum:0x...@0x1e`）
//! 3. 裸地址（EVM 40 位十六进制、Flow 16 位十六进制、`ethereum:0x...`），
//!    随后尝试内嵌 JSON 和文本中的游离 EVM 地址
//! 4. 名称（`*.eth`）
//! 5. WalletConnect 会话 URI
//! 6. Bitcoin 地址
//! 7. 无法识别

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    config::QrConfig,
    domain::{
        network::{chain_name, FLOW_TESTNET_CHAIN_ID, SEPOLIA_CHAIN_ID},
        payment_target::{PaymentTarget, TargetNetwork},
    },
    error::{WalletError, WalletResult},
    infrastructure::log_redact::redact_identifier,
    utils::address_validator::AddressValidator,
};

fn re(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::error!(pattern = pattern, error = %e, "Invalid classifier pattern");
            None
        }
    }
}

static FIAT_ID_RE: Lazy<Option<Regex>> =
    Lazy::new(|| re(r"^[a-zA-Z0-9.\-_]{2,256}@[a-zA-Z][a-zA-Z0-9.\-_]{2,64}$"));
static CHAIN_URI_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    re(r"(?i)^ethereum:(?:pay-)?(0x[a-f0-9]{40})@(0x[a-f0-9]+|[0-9]+)(?:[/?].*)?$")
});
static PLAIN_ETH_URI_RE: Lazy<Option<Regex>> =
    Lazy::new(|| re(r"(?i)^ethereum:(?:pay-)?(0x[a-f0-9]{40})(?:[/?].*)?$"));
static FREE_EVM_RE: Lazy<Option<Regex>> =
    Lazy::new(|| re(r"(?:^|[^0-9a-zA-Z])(0x[0-9a-fA-F]{40})(?:$|[^0-9a-zA-Z])"));
static EMBEDDED_NAME_RE: Lazy<Option<Regex>> =
    Lazy::new(|| re(r"(?i)(?:^|[^a-z0-9.\-])((?:[a-z0-9-]+\.)+eth)(?:$|[^a-z0-9\-])"));
static BITCOIN_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    re(r"^(?:(?i:bitcoin):)?([13][a-km-zA-HJ-NP-Z1-9]{25,34}|(?i:bc1[a-z0-9]{39,59}))(?:\?.*)?$")
});

fn is_match(pattern: &Lazy<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().map(|r| r.is_match(text)).unwrap_or(false)
}

fn first_capture(pattern: &Lazy<Option<Regex>>, text: &str) -> Option<Vec<String>> {
    let caps = pattern.as_ref()?.captures(text)?;
    Some(
        caps.iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect(),
    )
}

/// 链 ID 不匹配时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainIdPolicy {
    /// 附带警告，仍返回地址
    #[default]
    Warn,
    /// 视为不支持
    Strict,
}

impl FromStr for ChainIdPolicy {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "strict" => Ok(Self::Strict),
            other => Err(WalletError::Config(format!("unknown chain id policy: {other}"))),
        }
    }
}

/// 二维码识别器
#[derive(Debug, Clone)]
pub struct QrClassifier {
    supported_chain_id: u64,
    policy: ChainIdPolicy,
}

impl Default for QrClassifier {
    fn default() -> Self {
        Self {
            supported_chain_id: SEPOLIA_CHAIN_ID,
            policy: ChainIdPolicy::Warn,
        }
    }
}

impl QrClassifier {
    pub fn new(config: &QrConfig) -> WalletResult<Self> {
        Ok(Self {
            supported_chain_id: config.supported_chain_id,
            policy: config.chain_id_policy.parse()?,
        })
    }

    pub fn with_policy(supported_chain_id: u64, policy: ChainIdPolicy) -> Self {
        Self {
            supported_chain_id,
            policy,
        }
    }

    /// 识别扫描文本
    pub fn classify(&self, raw: &str) -> PaymentTarget {
        let text = raw.trim();
        if text.is_empty() {
            return PaymentTarget::Unrecognized { raw: raw.to_string() };
        }

        let target = self
            .match_fiat(text)
            .or_else(|| self.match_chain_uri(text))
            .or_else(|| Self::match_bare_address(text))
            .or_else(|| self.match_json(text))
            .or_else(|| Self::match_free_address(text))
            .or_else(|| Self::match_name(text))
            .or_else(|| Self::match_session_protocol(text))
            .or_else(|| Self::match_bitcoin(text))
            .unwrap_or_else(|| PaymentTarget::Unrecognized { raw: raw.to_string() });

        tracing::debug!(kind = target.kind(), "Classified scanned payload");
        target
    }

    // 1. 法币支付标识
    fn match_fiat(&self, text: &str) -> Option<PaymentTarget> {
        let identifier = if is_match(&FIAT_ID_RE, text) {
            text.to_string()
        } else {
            let decoded = query_param(text, "pa")?;
            if !is_match(&FIAT_ID_RE, &decoded) {
                return None;
            }
            decoded
        };

        let provider = identifier.split_once('@')?.1.to_string();
        tracing::debug!(identifier = %redact_identifier(&identifier), "Fiat payment identifier found");
        Some(PaymentTarget::Fiat {
            identifier,
            provider,
        })
    }

    // 2. 带链 ID 的地址 URI
    fn match_chain_uri(&self, text: &str) -> Option<PaymentTarget> {
        let caps = first_capture(&CHAIN_URI_RE, text)?;
        let address = caps.first()?.clone();
        if !AddressValidator::is_evm_address(&address) {
            return None;
        }
        let chain_id = parse_chain_id(caps.get(1)?)?;
        Some(self.chain_address_with_id(text, address, chain_id))
    }

    fn chain_address_with_id(&self, raw: &str, address: String, chain_id: u64) -> PaymentTarget {
        let network = if chain_id == FLOW_TESTNET_CHAIN_ID {
            TargetNetwork::Flow
        } else {
            TargetNetwork::Ethereum
        };

        if chain_id == self.supported_chain_id {
            let warning = checksum_warning(&address);
            return PaymentTarget::ChainAddress {
                address,
                network,
                chain_id: Some(chain_id),
                warning,
            };
        }

        let message = format!(
            "This address is for {}, but we only support {} for this payment.",
            chain_name(chain_id),
            chain_name(self.supported_chain_id)
        );
        match self.policy {
            ChainIdPolicy::Warn => PaymentTarget::ChainAddress {
                address,
                network,
                chain_id: Some(chain_id),
                warning: Some(message),
            },
            ChainIdPolicy::Strict => PaymentTarget::UnsupportedProtocol {
                raw: raw.to_string(),
                reason: message,
            },
        }
    }

    // 3. 裸地址
    fn match_bare_address(text: &str) -> Option<PaymentTarget> {
        let candidate = first_capture(&PLAIN_ETH_URI_RE, text)
            .and_then(|caps| caps.into_iter().next())
            .unwrap_or_else(|| text.to_string());

        if AddressValidator::is_evm_address(&candidate) {
            return Some(evm_target(candidate));
        }
        if AddressValidator::is_flow_address(&candidate) {
            return Some(PaymentTarget::ChainAddress {
                address: candidate,
                network: TargetNetwork::Flow,
                chain_id: None,
                warning: None,
            });
        }
        None
    }

    // 3a. 内嵌 JSON
    fn match_json(&self, text: &str) -> Option<PaymentTarget> {
        if !text.starts_with('{') {
            return None;
        }
        let value: Value = serde_json::from_str(text).ok()?;
        let obj = value.as_object()?;

        let address = ["address", "account", "wallet", "to"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| v.as_str()))?
            .trim()
            .to_string();
        let chain_id = ["chainId", "chain_id"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(json_chain_id);

        if AddressValidator::is_evm_address(&address) {
            return Some(match chain_id {
                Some(id) => self.chain_address_with_id(text, address, id),
                None => evm_target(address),
            });
        }
        if AddressValidator::is_flow_address(&address) {
            return Some(PaymentTarget::ChainAddress {
                address,
                network: TargetNetwork::Flow,
                chain_id: None,
                warning: None,
            });
        }
        None
    }

    // 3b. 文本中的游离 EVM 地址
    fn match_free_address(text: &str) -> Option<PaymentTarget> {
        let regex = FREE_EVM_RE.as_ref()?;
        regex
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .find(|a| AddressValidator::is_evm_address(a))
            .map(evm_target)
    }

    // 4. 名称
    fn match_name(text: &str) -> Option<PaymentTarget> {
        let lower = text.to_lowercase();
        let name = if lower.ends_with(".eth") && AddressValidator::is_name(&lower) {
            lower
        } else {
            first_capture(&EMBEDDED_NAME_RE, text)?
                .into_iter()
                .next()?
                .to_lowercase()
        };

        if !AddressValidator::is_name(&name) {
            return None;
        }
        Some(PaymentTarget::ChainAddress {
            address: name,
            network: TargetNetwork::Ethereum,
            chain_id: None,
            warning: None,
        })
    }

    // 5. 钱包会话协议
    fn match_session_protocol(text: &str) -> Option<PaymentTarget> {
        let lower = text.to_lowercase();
        if lower.starts_with("wc:") || lower.contains("walletconnect") {
            return Some(PaymentTarget::UnsupportedProtocol {
                raw: text.to_string(),
                reason: "WalletConnect sessions are not supported. Scan a wallet address instead."
                    .into(),
            });
        }
        None
    }

    // 6. 不支持的链
    fn match_bitcoin(text: &str) -> Option<PaymentTarget> {
        if is_match(&BITCOIN_RE, text) {
            return Some(PaymentTarget::UnsupportedProtocol {
                raw: text.to_string(),
                reason: "Bitcoin addresses are not supported yet".into(),
            });
        }
        None
    }
}

/// 未带链 ID 的 EVM 地址
fn evm_target(address: String) -> PaymentTarget {
    let warning = checksum_warning(&address);
    PaymentTarget::ChainAddress {
        address,
        network: TargetNetwork::Ethereum,
        chain_id: None,
        warning,
    }
}

/// 大小写混合但校验和不符时提示核对，地址本身仍然可用
fn checksum_warning(address: &str) -> Option<String> {
    if AddressValidator::has_valid_checksum(address) {
        None
    } else {
        Some("This address has an invalid checksum. Double-check it before paying.".into())
    }
}

/// 十六进制（`0x1e`）或十进制链 ID
fn parse_chain_id(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn json_chain_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_chain_id(s.trim()),
        _ => None,
    }
}

/// 取出 URI 查询参数并做百分号解码
fn query_param(text: &str, key: &str) -> Option<String> {
    let query = &text[text.find('?')? + 1..];
    let url = reqwest::Url::parse(&format!("qr://payload/?{query}")).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 地址展示格式（EVM 地址统一小写）
pub fn format_address(address: &str, network: TargetNetwork) -> String {
    match network {
        TargetNetwork::Ethereum | TargetNetwork::Flow if address.starts_with("0x") => {
            address.to_lowercase()
        }
        _ => address.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("0x1e"), Some(30));
        assert_eq!(parse_chain_id("0xaa36a7"), Some(11_155_111));
        assert_eq!(parse_chain_id("545"), Some(545));
        assert_eq!(parse_chain_id("0xzz"), None);
    }

    #[test]
    fn test_query_param_decoding() {
        assert_eq!(
            query_param("upi://pay?pa=alice%40oksbi&pn=Alice", "pa").as_deref(),
            Some("alice@oksbi")
        );
        assert_eq!(query_param("upi://pay?pn=Alice", "pa"), None);
        assert_eq!(query_param("no query here", "pa"), None);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("warn".parse::<ChainIdPolicy>().unwrap(), ChainIdPolicy::Warn);
        assert_eq!("STRICT".parse::<ChainIdPolicy>().unwrap(), ChainIdPolicy::Strict);
        assert!("lenient".parse::<ChainIdPolicy>().is_err());
    }

    #[test]
    fn test_format_address() {
        assert_eq!(
            format_address("0x742D35cc6634c0532925a3b844bc9e7595f0beb0", TargetNetwork::Ethereum),
            "0x742d35cc6634c0532925a3b844bc9e7595f0beb0"
        );
        assert_eq!(format_address("alice.eth", TargetNetwork::Ethereum), "alice.eth");
    }
}
