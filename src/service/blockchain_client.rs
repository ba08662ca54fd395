// 区块链 JSON-RPC 客户端
// 只读调用有限次重试；广播只发送一次，失败原样上报

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use serde_json::{json, Value};

use crate::{
    infrastructure::rpc_validator,
    service::chain_provider::{CallRequest, ChainProvider, ChainReceipt, ProviderError},
};

const RETRY_DELAY_MS: u64 = 200;

/// 基于 reqwest 的 EVM JSON-RPC provider
pub struct JsonRpcProvider {
    http_client: reqwest::Client,
    url: String,
    read_retries: u32,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(url: &str, timeout: Duration, read_retries: u32) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http_client,
            url: url.to_string(),
            read_retries,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(err: reqwest::Error) -> ProviderError {
        // 连接阶段失败时请求不可能已送达节点
        if err.is_connect() {
            ProviderError::Connect(err.to_string())
        } else if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }

    /// 响应体中的 JSON-RPC `error` 对象
    fn rpc_error(body: &Value) -> Option<ProviderError> {
        let error = body.get("error").filter(|e| e.is_object())?;
        Some(ProviderError::Rpc {
            code: error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1),
            message: error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
                .to_string(),
        })
    }

    /// 发送一次 JSON-RPC 请求
    async fn request_once(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;

        // 部分节点以 4xx 返回明确的 JSON-RPC 拒绝，先看响应体里的 error
        if !status.is_success() {
            return Err(serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|body| Self::rpc_error(&body))
                .unwrap_or_else(|| ProviderError::Transport(format!("HTTP {status}"))));
        }

        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if let Some(err) = Self::rpc_error(&body) {
            return Err(err);
        }

        rpc_validator::validate_rpc_response(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(body["result"].clone())
    }

    /// 只读请求，传输类错误按配置重试
    async fn read(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.request_once(method, params.clone()).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.read_retries => {
                    attempt += 1;
                    tracing::debug!(
                        method = method,
                        attempt = attempt,
                        error = %e,
                        "Retrying read-only RPC call"
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64))
                        .await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn as_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, ProviderError> {
        value
            .as_str()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("{what} is not a string")))
    }

    fn call_object(request: &CallRequest) -> Value {
        let mut obj = json!({ "to": request.to });
        if let Some(from) = request.from {
            obj["from"] = json!(from);
        }
        if let Some(value) = request.value {
            obj["value"] = json!(value);
        }
        if let Some(data) = &request.data {
            obj["data"] = json!(data);
        }
        obj
    }
}

fn invalid(e: anyhow::Error) -> ProviderError {
    ProviderError::InvalidResponse(e.to_string())
}

#[async_trait]
impl ChainProvider for JsonRpcProvider {
    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError> {
        let result = self
            .read("eth_getBalance", json!([address, "latest"]))
            .await?;
        rpc_validator::validate_u256(Self::as_str(&result, "balance")?).map_err(invalid)
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError> {
        let result = self
            .read("eth_call", json!([Self::call_object(request), "latest"]))
            .await?;
        let hex_str = Self::as_str(&result, "call result")?;
        hex::decode(hex_str.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ProviderError> {
        let result = self
            .read("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        rpc_validator::validate_u64(Self::as_str(&result, "nonce")?).map_err(invalid)
    }

    async fn gas_price(&self) -> Result<U256, ProviderError> {
        let result = self.read("eth_gasPrice", json!([])).await?;
        rpc_validator::validate_u256(Self::as_str(&result, "gas price")?).map_err(invalid)
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ProviderError> {
        let result = self
            .read("eth_estimateGas", json!([Self::call_object(request)]))
            .await?;
        rpc_validator::validate_gas(Self::as_str(&result, "gas estimate")?).map_err(invalid)
    }

    async fn send_raw_transaction(&self, raw_tx: &Bytes) -> Result<String, ProviderError> {
        let result = self
            .request_once("eth_sendRawTransaction", json!([raw_tx]))
            .await?;
        rpc_validator::validate_tx_hash(Self::as_str(&result, "tx hash")?).map_err(invalid)
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<ChainReceipt>, ProviderError> {
        let result = self
            .read("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }

        let field = |name: &str| -> Result<Option<u64>, ProviderError> {
            match result.get(name).and_then(|v| v.as_str()) {
                Some(s) => rpc_validator::validate_u64(s).map(Some).map_err(invalid),
                None => Ok(None),
            }
        };

        Ok(Some(ChainReceipt {
            block_number: field("blockNumber")?,
            gas_used: field("gasUsed")?,
            status: field("status")?,
        }))
    }
}
