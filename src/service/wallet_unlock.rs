//! 钱包解锁
//!
//! 用 PIN 解密密钥库得到内存中的签名密钥。对外只返回
//! `InvalidPinOrCorruptData`，内部失败原因只进日志。

use crate::{
    domain::{
        keystore::EncryptedKeystore,
        signing_key::{Pin, SigningKey},
    },
    error::{WalletError, WalletResult},
    infrastructure::{encryption, log_redact::redact_address},
};

pub struct WalletUnlock;

impl WalletUnlock {
    /// 同步解锁，耗时较长（Argon2id），不要在异步执行器上直接调用
    pub fn unlock_blocking(keystore: &EncryptedKeystore, pin: &Pin) -> WalletResult<SigningKey> {
        let address = redact_address(&keystore.wallet_address);

        let secret = encryption::open(&keystore.encrypted_blob, pin.as_bytes()).map_err(|e| {
            tracing::warn!(
                wallet = %address,
                category = e.category(),
                detail = %e,
                "Keystore unlock failed"
            );
            WalletError::InvalidPinOrCorruptData
        })?;

        let key = SigningKey::from_bytes(&secret).map_err(|_| {
            tracing::warn!(wallet = %address, category = "bad_key_material", "Keystore unlock failed");
            WalletError::InvalidPinOrCorruptData
        })?;
        drop(secret);

        // 信封地址、存储记录地址、派生地址三者必须一致
        let envelope_address = encryption::parse_envelope(&keystore.encrypted_blob)
            .map(|e| e.address)
            .unwrap_or_default();
        let derived = key.address_string();
        if !derived.eq_ignore_ascii_case(&envelope_address)
            || !derived.eq_ignore_ascii_case(keystore.wallet_address.trim())
        {
            tracing::warn!(wallet = %address, category = "address_mismatch", "Keystore unlock failed");
            return Err(WalletError::InvalidPinOrCorruptData);
        }

        tracing::debug!(wallet = %address, "Keystore unlocked");
        Ok(key)
    }

    /// 在阻塞线程池中解锁
    pub async fn unlock(keystore: &EncryptedKeystore, pin: Pin) -> WalletResult<SigningKey> {
        let keystore = keystore.clone();
        tokio::task::spawn_blocking(move || Self::unlock_blocking(&keystore, &pin))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Unlock task aborted");
                WalletError::InvalidPinOrCorruptData
            })?
    }
}
