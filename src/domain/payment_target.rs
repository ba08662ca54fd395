//! 二维码识别结果

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};

/// 地址所属网络
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetNetwork {
    Ethereum,
    Flow,
    Bitcoin,
    Unknown,
}

/// 扫码得到的支付目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PaymentTarget {
    /// 法币支付标识（`localpart@provider`）
    Fiat { identifier: String, provider: String },

    #[serde(rename_all = "camelCase")]
    ChainAddress {
        /// 地址，或待解析的名称
        address: String,
        network: TargetNetwork,
        #[serde(skip_serializing_if = "Option::is_none")]
        chain_id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },

    UnsupportedProtocol { raw: String, reason: String },

    Unrecognized { raw: String },
}

impl PaymentTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fiat { .. } => "fiat",
            Self::ChainAddress { .. } => "chainAddress",
            Self::UnsupportedProtocol { .. } => "unsupportedProtocol",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }

    /// 地址字段是否为待解析的名称
    pub fn needs_resolution(&self) -> bool {
        match self {
            Self::ChainAddress { address, .. } => !address.starts_with("0x") && address.contains('.'),
            _ => false,
        }
    }

    /// 不可支付的结果转为错误，便于调用方用 `?`
    pub fn into_result(self) -> WalletResult<Self> {
        match self {
            Self::UnsupportedProtocol { reason, .. } => Err(WalletError::UnsupportedProtocol(reason)),
            Self::Unrecognized { raw } => Err(WalletError::Unrecognized(raw)),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let target = PaymentTarget::ChainAddress {
            address: "0x742d35cc6634c0532925a3b844bc9e7595f0beb0".into(),
            network: TargetNetwork::Ethereum,
            chain_id: Some(30),
            warning: Some("mismatch".into()),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["kind"], "chainAddress");
        assert_eq!(json["network"], "ethereum");
        assert_eq!(json["chainId"], 30);

        let fiat = PaymentTarget::Fiat {
            identifier: "alice@oksbi".into(),
            provider: "oksbi".into(),
        };
        let json = serde_json::to_value(&fiat).unwrap();
        assert_eq!(json["kind"], "fiat");
        assert_eq!(json["provider"], "oksbi");

        let back: PaymentTarget = serde_json::from_value(json).unwrap();
        assert_eq!(back, fiat);
    }

    #[test]
    fn test_into_result() {
        let target = PaymentTarget::Unrecognized { raw: "hello".into() };
        assert!(matches!(target.into_result(), Err(WalletError::Unrecognized(_))));

        let target = PaymentTarget::UnsupportedProtocol {
            raw: "wc:abc".into(),
            reason: "WalletConnect is not supported".into(),
        };
        assert!(matches!(
            target.into_result(),
            Err(WalletError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_needs_resolution() {
        let name = PaymentTarget::ChainAddress {
            address: "alice.upal.eth".into(),
            network: TargetNetwork::Ethereum,
            chain_id: None,
            warning: None,
        };
        assert!(name.needs_resolution());
        assert_eq!(name.kind(), "chainAddress");
    }
}
