//! 密钥库 API
//!
//! 服务端只保存客户端加密后的密钥库，不接触 PIN 和明文私钥。

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::middleware::{AccountId, TraceId},
    app_state::AppState,
    domain::keystore::EncryptedKeystore,
    error::{AppError, AppErrorCode},
    infrastructure::log_redact::{redact_address, SensitiveRedact},
    utils::address_validator::AddressValidator,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 请求/响应模型
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKeystoreRequest {
    #[serde(default)]
    pub encrypted_keystore: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKeystoreResponse {
    pub wallet_address: String,
    pub version: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchKeystoreResponse {
    pub encrypted_keystore: String,
    pub wallet_address: String,
    pub version: u64,
    pub has_wallet: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 处理函数
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /api/keystore
pub async fn store_keystore(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<AccountId>,
    Extension(trace_id): Extension<TraceId>,
    payload: Result<Json<StoreKeystoreRequest>, JsonRejection>,
) -> Result<Json<StoreKeystoreResponse>, AppError> {
    let with_trace = |e: AppError| e.with_trace_id(trace_id.0.clone());

    let Json(req) = payload.map_err(|e| with_trace(AppError::bad_request(e.body_text())))?;

    let encrypted_keystore = req
        .encrypted_keystore
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| with_trace(AppError::bad_request("encryptedKeystore is required")))?;
    let wallet_address = req
        .wallet_address
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| with_trace(AppError::bad_request("walletAddress is required")))?;

    if !AddressValidator::is_evm_address(&wallet_address) {
        return Err(with_trace(
            AppError::bad_request("walletAddress is not a valid address")
                .with_code(AppErrorCode::InvalidAddress),
        ));
    }

    let keystore = EncryptedKeystore::new(encrypted_keystore, wallet_address);
    tracing::info!(
        account_id = %account.0,
        keystore = %keystore.redact(),
        "Storing keystore"
    );

    let stored = state
        .keystores
        .put(&account.0, keystore)
        .await
        .map_err(|e| with_trace(AppError::from(e)))?;

    Ok(Json(StoreKeystoreResponse {
        wallet_address: stored.keystore.wallet_address,
        version: stored.version,
    }))
}

/// GET /api/keystore
pub async fn fetch_keystore(
    State(state): State<Arc<AppState>>,
    Extension(account): Extension<AccountId>,
    Extension(trace_id): Extension<TraceId>,
) -> Result<Json<FetchKeystoreResponse>, AppError> {
    let stored = state
        .keystores
        .get(&account.0)
        .await
        .map_err(|e| AppError::from(e).with_trace_id(trace_id.0.clone()))?
        .ok_or_else(|| {
            AppError::not_found("No keystore found")
                .with_code(AppErrorCode::KeystoreNotFound)
                .with_trace_id(trace_id.0.clone())
        })?;

    tracing::debug!(
        account_id = %account.0,
        wallet = %redact_address(&stored.keystore.wallet_address),
        version = stored.version,
        "Keystore fetched"
    );

    Ok(Json(FetchKeystoreResponse {
        encrypted_keystore: stored.keystore.encrypted_blob,
        wallet_address: stored.keystore.wallet_address,
        version: stored.version,
        has_wallet: true,
    }))
}
