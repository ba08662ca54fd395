// 密钥库数据访问
//
// 客户端侧：`KeystoreStore`，持有 Bearer 凭证，只存取密文。
// 服务端侧：`KeystoreRepository`，按账户保存，每账户一份，覆盖写入时版本号递增。

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    config::KeystoreConfig,
    domain::keystore::{EncryptedKeystore, StoreAck, StoredKeystore},
    error::{WalletError, WalletResult},
    infrastructure::log_redact::SensitiveRedact,
};

// ============ 客户端 ============

#[async_trait]
pub trait KeystoreStore: Send + Sync {
    /// 保存（覆盖）当前账户的密钥库
    async fn store(&self, keystore: &EncryptedKeystore) -> WalletResult<StoreAck>;

    /// 读取当前账户的密钥库，不存在时返回 `KeystoreNotFound`
    async fn fetch(&self) -> WalletResult<StoredKeystore>;
}

/// 接口返回的密钥库记录
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoreRecordBody {
    pub encrypted_keystore: String,
    pub wallet_address: String,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub has_wallet: Option<bool>,
}

/// 通过钱包服务端 HTTP 接口存取
pub struct HttpKeystoreStore {
    http_client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl HttpKeystoreStore {
    pub fn new(config: &KeystoreConfig, bearer_token: impl Into<String>) -> WalletResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| WalletError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/keystore", self.base_url)
    }

    fn status_error(status: reqwest::StatusCode) -> WalletError {
        match status.as_u16() {
            401 | 403 => WalletError::Keystore("not authorized".into()),
            code => WalletError::Keystore(format!("server returned HTTP {code}")),
        }
    }
}

#[async_trait]
impl KeystoreStore for HttpKeystoreStore {
    async fn store(&self, keystore: &EncryptedKeystore) -> WalletResult<StoreAck> {
        tracing::debug!(keystore = %keystore.redact(), "Storing keystore");

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.bearer_token)
            .json(keystore)
            .send()
            .await
            .map_err(|e| WalletError::Keystore(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response.status()));
        }

        response
            .json::<StoreAck>()
            .await
            .map_err(|e| WalletError::Keystore(format!("invalid store response: {e}")))
    }

    async fn fetch(&self) -> WalletResult<StoredKeystore> {
        let response = self
            .http_client
            .get(self.endpoint())
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| WalletError::Keystore(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(WalletError::KeystoreNotFound);
        }
        if !status.is_success() {
            return Err(Self::status_error(status));
        }

        let body: KeystoreRecordBody = response
            .json()
            .await
            .map_err(|e| WalletError::Keystore(format!("invalid fetch response: {e}")))?;

        if body.encrypted_keystore.is_empty() || body.has_wallet == Some(false) {
            return Err(WalletError::KeystoreNotFound);
        }

        Ok(StoredKeystore {
            keystore: EncryptedKeystore::new(body.encrypted_keystore, body.wallet_address),
            version: body.version.unwrap_or(1),
            updated_at: None,
        })
    }
}

/// 单账户内存存储（离线使用与测试）
#[derive(Default)]
pub struct InMemoryKeystoreStore {
    slot: RwLock<Option<StoredKeystore>>,
}

impl InMemoryKeystoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeystoreStore for InMemoryKeystoreStore {
    async fn store(&self, keystore: &EncryptedKeystore) -> WalletResult<StoreAck> {
        let mut slot = self.slot.write().await;
        let version = slot.as_ref().map(|s| s.version + 1).unwrap_or(1);
        *slot = Some(StoredKeystore {
            keystore: keystore.clone(),
            version,
            updated_at: Some(Utc::now()),
        });
        Ok(StoreAck {
            wallet_address: keystore.wallet_address.clone(),
            version: Some(version),
        })
    }

    async fn fetch(&self) -> WalletResult<StoredKeystore> {
        self.slot
            .read()
            .await
            .clone()
            .ok_or(WalletError::KeystoreNotFound)
    }
}

// ============ 服务端 ============

#[async_trait]
pub trait KeystoreRepository: Send + Sync {
    /// 最后写入者获胜，返回新版本号
    async fn put(&self, account_id: &str, keystore: EncryptedKeystore) -> WalletResult<StoredKeystore>;

    async fn get(&self, account_id: &str) -> WalletResult<Option<StoredKeystore>>;

    /// 随账户一起删除
    async fn delete(&self, account_id: &str) -> WalletResult<bool>;
}

#[derive(Default, Clone)]
pub struct InMemoryKeystoreRepository {
    records: Arc<RwLock<HashMap<String, StoredKeystore>>>,
}

impl InMemoryKeystoreRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeystoreRepository for InMemoryKeystoreRepository {
    async fn put(&self, account_id: &str, keystore: EncryptedKeystore) -> WalletResult<StoredKeystore> {
        let mut records = self.records.write().await;
        let version = records
            .get(account_id)
            .map(|r| r.version + 1)
            .unwrap_or(1);
        if version > 1 {
            tracing::info!(account_id = %account_id, version = version, "Overwriting existing keystore");
        }

        let record = StoredKeystore {
            keystore,
            version,
            updated_at: Some(Utc::now()),
        };
        records.insert(account_id.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, account_id: &str) -> WalletResult<Option<StoredKeystore>> {
        Ok(self.records.read().await.get(account_id).cloned())
    }

    async fn delete(&self, account_id: &str) -> WalletResult<bool> {
        Ok(self.records.write().await.remove(account_id).is_some())
    }
}
