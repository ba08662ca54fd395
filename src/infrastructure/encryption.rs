//! 密钥库加密/解密
//!
//! PIN 经 Argon2id 派生 32 字节密钥，私钥用 AES-256-GCM 加密。
//! 密文封装为 JSON 信封，二进制字段均为 hex。

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::KdfConfig;

pub const KEYSTORE_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
/// 打开信封时接受的最大内存开销（1 GiB）
const MAX_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_ITERATIONS: u32 = 64;

/// 解密失败的内部分类，只用于日志
#[derive(Debug, Error)]
pub enum KeystoreCryptoError {
    #[error("malformed keystore: {0}")]
    Malformed(String),
    #[error("key derivation failed: {0}")]
    Kdf(String),
    #[error("authentication failed")]
    AuthFailed,
}

impl KeystoreCryptoError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Kdf(_) => "kdf",
            Self::AuthFailed => "auth_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoSection {
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub cipher: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// 密钥库 JSON 信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreEnvelope {
    pub version: u32,
    pub address: String,
    pub crypto: CryptoSection,
}

/// 派生出的对称密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    fn derive(pin: &[u8], salt: &[u8], m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, KeystoreCryptoError> {
        let params = Params::new(m_cost, t_cost, p_cost, Some(32))
            .map_err(|e| KeystoreCryptoError::Kdf(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = EncryptionKey { key: [0u8; 32] };
        argon2
            .hash_password_into(pin, salt, &mut key.key)
            .map_err(|e| KeystoreCryptoError::Kdf(e.to_string()))?;
        Ok(key)
    }

    fn cipher(&self) -> Result<Aes256Gcm, KeystoreCryptoError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| KeystoreCryptoError::Kdf(e.to_string()))
    }
}

/// 加密私钥并生成信封 JSON
pub fn seal(
    secret: &[u8],
    address: &str,
    pin: &[u8],
    kdf: &KdfConfig,
) -> Result<String, KeystoreCryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let key = EncryptionKey::derive(pin, &salt, kdf.memory_kib, kdf.iterations, kdf.parallelism)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()?
        .encrypt(&nonce, secret)
        .map_err(|_| KeystoreCryptoError::AuthFailed)?;

    let envelope = KeystoreEnvelope {
        version: KEYSTORE_VERSION,
        address: address.to_string(),
        crypto: CryptoSection {
            kdf: "argon2id".into(),
            kdfparams: KdfParams {
                m_cost: kdf.memory_kib,
                t_cost: kdf.iterations,
                p_cost: kdf.parallelism,
                salt: hex::encode(salt),
            },
            cipher: "aes-256-gcm".into(),
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        },
    };

    serde_json::to_string(&envelope).map_err(|e| KeystoreCryptoError::Malformed(e.to_string()))
}

/// 解析信封，不做解密
pub fn parse_envelope(blob: &str) -> Result<KeystoreEnvelope, KeystoreCryptoError> {
    let envelope: KeystoreEnvelope =
        serde_json::from_str(blob).map_err(|e| KeystoreCryptoError::Malformed(e.to_string()))?;

    if envelope.version != KEYSTORE_VERSION {
        return Err(KeystoreCryptoError::Malformed(format!(
            "unsupported version {}",
            envelope.version
        )));
    }
    if envelope.crypto.kdf != "argon2id" || envelope.crypto.cipher != "aes-256-gcm" {
        return Err(KeystoreCryptoError::Malformed("unsupported algorithm".into()));
    }
    let p = &envelope.crypto.kdfparams;
    if p.m_cost > MAX_MEMORY_KIB || p.t_cost > MAX_ITERATIONS {
        return Err(KeystoreCryptoError::Malformed("kdf parameters out of range".into()));
    }

    Ok(envelope)
}

/// 解密信封，返回私钥明文
pub fn open(blob: &str, pin: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeystoreCryptoError> {
    let envelope = parse_envelope(blob)?;
    let crypto = &envelope.crypto;

    let decode = |field: &str, value: &str| {
        hex::decode(value).map_err(|_| KeystoreCryptoError::Malformed(format!("bad hex in {field}")))
    };
    let salt = decode("salt", &crypto.kdfparams.salt)?;
    let nonce = decode("nonce", &crypto.nonce)?;
    let ciphertext = decode("ciphertext", &crypto.ciphertext)?;

    if nonce.len() != NONCE_LEN {
        return Err(KeystoreCryptoError::Malformed("nonce length".into()));
    }

    let p = &crypto.kdfparams;
    let key = EncryptionKey::derive(pin, &salt, p.m_cost, p.t_cost, p.p_cost)?;
    let plaintext = key
        .cipher()?
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| KeystoreCryptoError::AuthFailed)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_kdf() -> KdfConfig {
        KdfConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_seal_open() {
        let secret = [7u8; 32];
        let blob = seal(&secret, "0xabc", b"123456", &fast_kdf()).unwrap();

        let envelope = parse_envelope(&blob).unwrap();
        assert_eq!(envelope.address, "0xabc");
        assert_eq!(envelope.crypto.kdf, "argon2id");
        assert!(!blob.contains(&hex::encode(secret)));

        let plaintext = open(&blob, b"123456").unwrap();
        assert_eq!(plaintext.as_slice(), &secret);
    }

    #[test]
    fn test_wrong_pin_fails_authentication() {
        let blob = seal(&[1u8; 32], "0xabc", b"123456", &fast_kdf()).unwrap();
        assert!(matches!(
            open(&blob, b"654321"),
            Err(KeystoreCryptoError::AuthFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let blob = seal(&[1u8; 32], "0xabc", b"123456", &fast_kdf()).unwrap();
        let mut envelope = parse_envelope(&blob).unwrap();
        let mut ct = hex::decode(&envelope.crypto.ciphertext).unwrap();
        ct[0] ^= 0xff;
        envelope.crypto.ciphertext = hex::encode(ct);
        let tampered = serde_json::to_string(&envelope).unwrap();

        assert!(matches!(
            open(&tampered, b"123456"),
            Err(KeystoreCryptoError::AuthFailed)
        ));
    }

    #[test]
    fn test_malformed_blob() {
        assert_eq!(open("not json", b"1").unwrap_err().category(), "malformed");
        let blob = seal(&[1u8; 32], "0xabc", b"123456", &fast_kdf()).unwrap();
        let hostile = blob.replace("\"m_cost\":1024", "\"m_cost\":4000000");
        assert_eq!(open(&hostile, b"123456").unwrap_err().category(), "malformed");
    }

    #[test]
    fn test_fresh_salt_and_nonce() {
        let a = seal(&[1u8; 32], "0xabc", b"123456", &fast_kdf()).unwrap();
        let b = seal(&[1u8; 32], "0xabc", b"123456", &fast_kdf()).unwrap();
        assert_ne!(a, b);
    }
}
