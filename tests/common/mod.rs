//! 测试辅助模块
//! 脚本化的链上 provider 与常用夹具

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use upalcore::{
    config::{KdfConfig, RpcConfig},
    domain::network::{NetworkRegistry, FLOW_TESTNET_CHAIN_ID, SEPOLIA_CHAIN_ID},
    domain::SigningKey,
    service::{
        chain_provider::{CallRequest, ChainProvider, ChainReceipt, ProviderError, ProviderRegistry},
        TransferEngine,
    },
};

/// 已知私钥及其地址
pub const TEST_PRIVATE_KEY: &str =
    "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const TEST_ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";
pub const RECIPIENT: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0";
pub const TEST_PIN: &str = "482916";

pub fn test_key() -> SigningKey {
    SigningKey::from_hex(TEST_PRIVATE_KEY).expect("valid test key")
}

/// 测试用的低开销 KDF 参数
pub fn fast_kdf() -> KdfConfig {
    KdfConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn test_rpc_config() -> RpcConfig {
    RpcConfig {
        request_timeout_ms: 500,
        read_retries: 0,
        confirmation_poll_ms: 10,
        confirmation_timeout_secs: 1,
        await_confirmation: false,
    }
}

/// 按链 ID 注册同一个 mock 的转账引擎
pub fn engine_with(mock: Arc<MockChainProvider>, rpc: RpcConfig) -> TransferEngine {
    let providers = ProviderRegistry::new()
        .with(SEPOLIA_CHAIN_ID, mock.clone())
        .with(FLOW_TESTNET_CHAIN_ID, mock);
    TransferEngine::new(Arc::new(NetworkRegistry::default()), providers, rpc)
}

pub fn word(value: u64) -> Bytes {
    let mut out = [0u8; 32];
    U256::from(value).to_big_endian(&mut out);
    Bytes::from(out.to_vec())
}

/// 脚本化 provider，记录调用次数
pub struct MockChainProvider {
    calls: AtomicUsize,
    broadcasts: AtomicUsize,
    balance: Mutex<U256>,
    call_result: Mutex<Result<Bytes, ProviderError>>,
    estimate: Mutex<Result<u64, ProviderError>>,
    broadcast: Mutex<Result<String, ProviderError>>,
    broadcast_delay: Mutex<Option<Duration>>,
    receipt: Mutex<Option<ChainReceipt>>,
    last_raw_tx: Mutex<Option<Bytes>>,
}

impl Default for MockChainProvider {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            broadcasts: AtomicUsize::new(0),
            balance: Mutex::new(U256::zero()),
            call_result: Mutex::new(Ok(Bytes::default())),
            estimate: Mutex::new(Ok(21_000)),
            broadcast: Mutex::new(Ok(format!("0x{}", "ab".repeat(32)))),
            broadcast_delay: Mutex::new(None),
            receipt: Mutex::new(None),
            last_raw_tx: Mutex::new(None),
        }
    }
}

impl MockChainProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_balance(&self, balance: U256) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_call_result(&self, result: Result<Bytes, ProviderError>) {
        *self.call_result.lock().unwrap() = result;
    }

    pub fn set_estimate(&self, result: Result<u64, ProviderError>) {
        *self.estimate.lock().unwrap() = result;
    }

    pub fn set_broadcast(&self, result: Result<String, ProviderError>) {
        *self.broadcast.lock().unwrap() = result;
    }

    pub fn set_broadcast_delay(&self, delay: Duration) {
        *self.broadcast_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_receipt(&self, receipt: Option<ChainReceipt>) {
        *self.receipt.lock().unwrap() = receipt;
    }

    /// 所有 RPC 调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.load(Ordering::SeqCst)
    }

    pub fn last_raw_tx(&self) -> Option<Bytes> {
        self.last_raw_tx.lock().unwrap().clone()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainProvider for MockChainProvider {
    async fn get_balance(&self, _address: Address) -> Result<U256, ProviderError> {
        self.hit();
        Ok(*self.balance.lock().unwrap())
    }

    async fn call(&self, _request: &CallRequest) -> Result<Bytes, ProviderError> {
        self.hit();
        self.call_result.lock().unwrap().clone()
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<u64, ProviderError> {
        self.hit();
        Ok(7)
    }

    async fn gas_price(&self) -> Result<U256, ProviderError> {
        self.hit();
        Ok(U256::from(1_000_000_000u64))
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> Result<u64, ProviderError> {
        self.hit();
        self.estimate.lock().unwrap().clone()
    }

    async fn send_raw_transaction(&self, raw_tx: &Bytes) -> Result<String, ProviderError> {
        self.hit();
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        *self.last_raw_tx.lock().unwrap() = Some(raw_tx.clone());

        let delay = *self.broadcast_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.broadcast.lock().unwrap().clone()
    }

    async fn get_transaction_receipt(
        &self,
        _tx_hash: &str,
    ) -> Result<Option<ChainReceipt>, ProviderError> {
        self.hit();
        Ok(self.receipt.lock().unwrap().clone())
    }
}
