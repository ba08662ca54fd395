//! 内存中的签名密钥与 PIN
//!
//! 两者都不实现 `Clone`/`Serialize`，`Debug` 输出已脱敏，析构时清零。

use std::fmt;

use ethers::{
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, Signature},
};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{WalletError, WalletResult};

/// PIN 最短长度（设置时）
pub const MIN_PIN_LENGTH: usize = 6;

/// 用户输入的 PIN
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Pin(String);

impl Pin {
    /// 解锁时使用，不做格式限制（错误 PIN 只会导致解密失败）
    pub fn new(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    /// 设置钱包时使用：至少 6 位数字，且两次输入一致
    pub fn new_for_setup(pin: impl Into<String>, confirm: impl Into<String>) -> WalletResult<Self> {
        let pin = Self(pin.into());
        let confirm = Self(confirm.into());

        if pin.0.len() < MIN_PIN_LENGTH {
            return Err(WalletError::InvalidPin(format!(
                "PIN must be at least {MIN_PIN_LENGTH} digits"
            )));
        }
        if !pin.0.chars().all(|c| c.is_ascii_digit()) {
            return Err(WalletError::InvalidPin("PIN must contain only digits".into()));
        }
        if pin.0 != confirm.0 {
            return Err(WalletError::InvalidPin("PINs do not match".into()));
        }

        Ok(pin)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

/// 解锁得到的签名密钥
///
/// 只能按值传递给单次转账流程，流程结束（或出错）即被丢弃。
pub struct SigningKey {
    wallet: LocalWallet,
}

impl SigningKey {
    /// 从 32 字节私钥构建
    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        let wallet = LocalWallet::from_bytes(bytes)
            .map_err(|_| WalletError::InvalidPinOrCorruptData)?;
        Ok(Self { wallet })
    }

    /// 从十六进制私钥构建（可带 0x 前缀）
    pub fn from_hex(private_key: &str) -> WalletResult<Self> {
        let body = private_key.trim().trim_start_matches("0x");
        let bytes = Zeroizing::new(
            hex::decode(body).map_err(|_| WalletError::InvalidMnemonic)?,
        );
        if bytes.len() != 32 {
            return Err(WalletError::InvalidMnemonic);
        }
        let wallet = LocalWallet::from_bytes(&bytes).map_err(|_| WalletError::InvalidMnemonic)?;
        Ok(Self { wallet })
    }

    pub(crate) fn from_wallet(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// EIP-55 格式地址
    pub fn address_string(&self) -> String {
        ethers::utils::to_checksum(&self.wallet.address(), None)
    }

    /// 原始私钥字节，仅供加密密钥库使用
    pub(crate) fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(self.wallet.signer().to_bytes().as_slice());
        out
    }

    /// 按 EIP-155 对交易签名
    pub(crate) fn sign_transaction(
        &self,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> WalletResult<Signature> {
        let mut tx = tx.clone();
        tx.set_chain_id(chain_id);
        self.wallet
            .sign_transaction_sync(&tx)
            .map_err(|e| WalletError::SubmissionFailed {
                tx_hash: None,
                reason: format!("signing failed: {e}"),
            })
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("address", &self.address_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_key_from_hex() {
        let key = SigningKey::from_hex(TEST_KEY).unwrap();
        assert_eq!(
            key.address_string(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );
        assert_eq!(hex::encode(*key.secret_bytes()), TEST_KEY);
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SigningKey::from_hex(TEST_KEY).unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains(TEST_KEY));

        let pin = Pin::new("123456");
        assert_eq!(format!("{pin:?}"), "Pin(***)");
    }

    #[test]
    fn test_setup_pin_policy() {
        assert!(Pin::new_for_setup("123456", "123456").is_ok());
        assert!(Pin::new_for_setup("12345678", "12345678").is_ok());
        assert!(matches!(
            Pin::new_for_setup("12345", "12345"),
            Err(WalletError::InvalidPin(_))
        ));
        assert!(Pin::new_for_setup("12a456", "12a456").is_err());
        assert!(Pin::new_for_setup("123456", "654321").is_err());
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(SigningKey::from_hex("0x1234").is_err());
        assert!(SigningKey::from_hex("zz").is_err());
    }
}
