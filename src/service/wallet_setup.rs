//! 钱包创建与导入
//!
//! 生成或导入私钥，用 PIN 加密后写入密钥库存储。

use bip39::{Language, Mnemonic};
use ethers::signers::{coins_bip39::English, MnemonicBuilder};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::{
    config::KdfConfig,
    domain::{
        keystore::{EncryptedKeystore, StoreAck},
        signing_key::{Pin, SigningKey},
    },
    error::{WalletError, WalletResult},
    infrastructure::{encryption, log_redact::redact_address},
    repository::keystore_repository::KeystoreStore,
};

/// 默认派生路径（BIP44 以太坊第一个账户）
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// 新生成的钱包，助记词只展示一次
pub struct GeneratedWallet {
    pub mnemonic: Zeroizing<String>,
    pub signing_key: SigningKey,
}

impl GeneratedWallet {
    pub fn address(&self) -> String {
        self.signing_key.address_string()
    }
}

pub struct WalletSetup {
    kdf: KdfConfig,
}

impl WalletSetup {
    pub fn new(kdf: KdfConfig) -> Self {
        Self { kdf }
    }

    /// 生成 12 词助记词及对应密钥
    pub fn generate(&self) -> WalletResult<GeneratedWallet> {
        let mut entropy = Zeroizing::new([0u8; 16]);
        rand::thread_rng().fill_bytes(&mut entropy[..]);

        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..])
            .map_err(|_| WalletError::InvalidMnemonic)?;
        let phrase = Zeroizing::new(mnemonic.to_string());
        let signing_key = Self::from_mnemonic(&phrase)?;

        tracing::info!(wallet = %redact_address(&signing_key.address_string()), "Generated new wallet");
        Ok(GeneratedWallet {
            mnemonic: phrase,
            signing_key,
        })
    }

    pub fn validate_mnemonic(phrase: &str) -> bool {
        Mnemonic::parse_in(Language::English, phrase.trim()).is_ok()
    }

    /// 从助记词恢复
    pub fn from_mnemonic(phrase: &str) -> WalletResult<SigningKey> {
        let phrase = phrase.trim();
        if !Self::validate_mnemonic(phrase) {
            return Err(WalletError::InvalidMnemonic);
        }

        let wallet = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .derivation_path(DEFAULT_DERIVATION_PATH)
            .map_err(|_| WalletError::InvalidMnemonic)?
            .build()
            .map_err(|_| WalletError::InvalidMnemonic)?;
        Ok(SigningKey::from_wallet(wallet))
    }

    /// 从十六进制私钥导入
    pub fn from_private_key(private_key: &str) -> WalletResult<SigningKey> {
        SigningKey::from_hex(private_key)
    }

    /// 用 PIN 加密
    pub fn encrypt(&self, signing_key: &SigningKey, pin: &Pin) -> WalletResult<EncryptedKeystore> {
        let address = signing_key.address_string();
        let secret = signing_key.secret_bytes();
        let blob = encryption::seal(secret.as_ref(), &address, pin.as_bytes(), &self.kdf)
            .map_err(|e| {
                tracing::error!(category = e.category(), "Keystore encryption failed");
                WalletError::Config(format!("keystore encryption failed: {e}"))
            })?;
        Ok(EncryptedKeystore::new(blob, address))
    }

    /// 加密并写入存储
    pub async fn setup<S: KeystoreStore + ?Sized>(
        &self,
        store: &S,
        signing_key: SigningKey,
        pin: Pin,
    ) -> WalletResult<StoreAck> {
        let kdf = self.kdf;
        let keystore = tokio::task::spawn_blocking(move || {
            WalletSetup::new(kdf).encrypt(&signing_key, &pin)
        })
        .await
        .map_err(|e| WalletError::Config(format!("encryption task aborted: {e}")))??;

        let ack = store.store(&keystore).await?;
        tracing::info!(
            wallet = %redact_address(&ack.wallet_address),
            version = ?ack.version,
            "Keystore stored"
        );
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str =
        "test test test test test test test test test test test junk";

    #[test]
    fn test_from_mnemonic_known_address() {
        let key = WalletSetup::from_mnemonic(PHRASE).unwrap();
        assert_eq!(
            key.address_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_invalid_mnemonic() {
        assert!(!WalletSetup::validate_mnemonic("not a real phrase"));
        assert!(matches!(
            WalletSetup::from_mnemonic("test test test"),
            Err(WalletError::InvalidMnemonic)
        ));
    }

    #[test]
    fn test_generate_round_trips_through_mnemonic() {
        let setup = WalletSetup::new(KdfConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        });
        let generated = setup.generate().unwrap();
        assert_eq!(generated.mnemonic.split_whitespace().count(), 12);

        let restored = WalletSetup::from_mnemonic(&generated.mnemonic).unwrap();
        assert_eq!(restored.address(), generated.signing_key.address());
    }
}
