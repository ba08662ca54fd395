//! 转账领域模型
//!
//! 状态机：`Built → Submitted → (Confirmed | Failed)`，`Built` 也可直接进入 `Failed`。

use std::fmt;

use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use super::{
    network::{NetworkDescriptor, TokenDescriptor},
    signing_key::SigningKey,
};

/// 转账状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// 已通过预检，尚未产生任何副作用
    Built,
    /// 已广播，等待上链
    Submitted,
    Confirmed,
    Failed,
}

impl TransferStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    pub fn can_transition_to(&self, target: &Self) -> bool {
        use TransferStatus::*;

        matches!(
            (self, target),
            (Built, Submitted) | (Built, Failed) | (Submitted, Confirmed) | (Submitted, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Built => "built",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次转账请求，提交前构建
///
/// 持有签名密钥的所有权，请求被消费后密钥随之释放。
#[derive(Debug)]
pub struct TransferRequest {
    pub signing_key: SigningKey,
    pub to_address: String,
    /// 十进制字符串，任意精度
    pub amount: String,
    pub network: NetworkDescriptor,
    pub token: TokenDescriptor,
}

/// 转账类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferKind {
    Native,
    Token { contract: Address },
}

/// 通过预检的转账（`Built` 状态），尚未签名
#[derive(Debug, Clone)]
pub struct BuiltTransfer {
    pub from: Address,
    /// 收款人（代币转账时为代币接收方，不是合约）
    pub recipient: Address,
    pub kind: TransferKind,
    /// 按代币精度放大后的金额
    pub value: U256,
    pub token_symbol: String,
    pub chain_id: u64,
    pub status: TransferStatus,
}

impl BuiltTransfer {
    /// 交易的 `to` 字段
    pub fn tx_to(&self) -> Address {
        match &self.kind {
            TransferKind::Native => self.recipient,
            TransferKind::Token { contract } => *contract,
        }
    }

    /// 交易的 `value` 字段（代币转账为 0）
    pub fn tx_value(&self) -> U256 {
        match self.kind {
            TransferKind::Native => self.value,
            TransferKind::Token { .. } => U256::zero(),
        }
    }

    /// ERC20 `transfer(address,uint256)` 调用数据
    pub fn tx_data(&self) -> Option<Bytes> {
        match self.kind {
            TransferKind::Native => None,
            TransferKind::Token { .. } => Some(erc20_transfer_data(self.recipient, self.value)),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, TransferKind::Native)
    }
}

pub(crate) const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
pub(crate) const ERC20_BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

pub(crate) fn erc20_transfer_data(to: Address, amount: U256) -> Bytes {
    use ethers::abi::{encode, Token};

    let mut data = ERC20_TRANSFER_SELECTOR.to_vec();
    data.extend(encode(&[Token::Address(to), Token::Uint(amount)]));
    Bytes::from(data)
}

pub(crate) fn erc20_balance_of_data(owner: Address) -> Bytes {
    use ethers::abi::{encode, Token};

    let mut data = ERC20_BALANCE_OF_SELECTOR.to_vec();
    data.extend(encode(&[Token::Address(owner)]));
    Bytes::from(data)
}

/// 转账回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transaction_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    pub status: TransferStatus,
    pub chain_id: u64,
    /// 区块浏览器链接
    pub explorer_url: String,
}

impl TransferReceipt {
    pub fn submitted(tx_hash: String, network: &NetworkDescriptor) -> Self {
        Self {
            explorer_url: network.tx_url(&tx_hash),
            transaction_hash: tx_hash,
            block_number: None,
            gas_used: None,
            status: TransferStatus::Submitted,
            chain_id: network.chain_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use TransferStatus::*;

        assert!(Built.can_transition_to(&Submitted));
        assert!(Built.can_transition_to(&Failed));
        assert!(Submitted.can_transition_to(&Confirmed));
        assert!(Submitted.can_transition_to(&Failed));

        assert!(!Built.can_transition_to(&Confirmed));
        assert!(!Confirmed.can_transition_to(&Failed));
        assert!(!Failed.can_transition_to(&Submitted));
        assert!(!Submitted.can_transition_to(&Built));
    }

    #[test]
    fn test_is_final() {
        assert!(!TransferStatus::Built.is_final());
        assert!(!TransferStatus::Submitted.is_final());
        assert!(TransferStatus::Confirmed.is_final());
        assert!(TransferStatus::Failed.is_final());
    }

    #[test]
    fn test_erc20_transfer_encoding() {
        let to: Address = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0".parse().unwrap();
        let data = erc20_transfer_data(to, U256::from(1_000_000u64));

        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &ERC20_TRANSFER_SELECTOR);
        assert_eq!(&data[16..36], to.as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(1_000_000u64));
    }

    #[test]
    fn test_receipt_serialization() {
        let receipt = TransferReceipt {
            transaction_hash: "0xabc".into(),
            block_number: Some(10),
            gas_used: None,
            status: TransferStatus::Confirmed,
            chain_id: 545,
            explorer_url: "https://evm-testnet.flowscan.org/tx/0xabc".into(),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["transactionHash"], "0xabc");
        assert_eq!(json["status"], "confirmed");
        assert_eq!(json["blockNumber"], 10);
        assert!(json.get("gasUsed").is_none());
    }
}
