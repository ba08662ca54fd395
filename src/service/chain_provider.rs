//! 链上 RPC 访问的抽象
//!
//! 转账引擎与名称解析只依赖这个 trait，测试中可替换为脚本化实现。

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use thiserror::Error;

use crate::{
    config::RpcConfig,
    domain::network::NetworkRegistry,
    error::{WalletError, WalletResult},
    service::blockchain_client::JsonRpcProvider,
};

/// RPC 调用失败的分类
///
/// 对广播而言，`Connect` 说明请求没有发出；`Timeout`、`Transport`、
/// `InvalidResponse` 都无法确定节点是否已收到交易。
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// 只读调用是否值得重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_) | Self::Transport(_))
    }
}

impl From<ProviderError> for WalletError {
    fn from(err: ProviderError) -> Self {
        WalletError::Rpc(err.to_string())
    }
}

/// 交易回执中引擎关心的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    /// 1 成功，0 回滚
    pub status: Option<u64>,
}

/// 调用参数
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
}

#[async_trait]
pub trait ChainProvider: Send + Sync {
    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError>;

    /// `eth_call`，返回原始字节
    async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError>;

    /// pending 状态下的 nonce
    async fn get_transaction_count(&self, address: Address) -> Result<u64, ProviderError>;

    async fn gas_price(&self) -> Result<U256, ProviderError>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ProviderError>;

    /// 广播已签名交易，返回节点给出的哈希。实现方不得重试。
    async fn send_raw_transaction(&self, raw_tx: &Bytes) -> Result<String, ProviderError>;

    /// 未上链时返回 `None`
    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<ChainReceipt>, ProviderError>;
}

/// 按链 ID 选择 provider
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<u64, Arc<dyn ChainProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为注册表中每个网络创建 JSON-RPC provider
    pub fn from_registry(registry: &NetworkRegistry, rpc: &RpcConfig) -> WalletResult<Self> {
        let mut providers = Self::new();
        for network in registry.networks() {
            let provider = JsonRpcProvider::new(
                &network.rpc_url,
                Duration::from_millis(rpc.request_timeout_ms),
                rpc.read_retries,
            )
            .map_err(|e| WalletError::Config(e.to_string()))?;
            providers.insert(network.chain_id, Arc::new(provider));
        }
        Ok(providers)
    }

    pub fn insert(&mut self, chain_id: u64, provider: Arc<dyn ChainProvider>) {
        self.providers.insert(chain_id, provider);
    }

    pub fn with(mut self, chain_id: u64, provider: Arc<dyn ChainProvider>) -> Self {
        self.insert(chain_id, provider);
        self
    }

    pub fn get(&self, chain_id: u64) -> WalletResult<Arc<dyn ChainProvider>> {
        self.providers
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| WalletError::UnknownNetwork(chain_id.to_string()))
    }
}
