//! 地址解析
//!
//! 名称按最长后缀路由到对应的解析后端；已是合法地址的输入原样返回。
//! 后端返回空、零地址或格式错误的地址一律视为解析失败。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::types::{Address, Bytes};
use serde::Deserialize;
use sha3::{Digest, Keccak256};

use crate::{
    config::ResolverConfig,
    domain::network::NetworkDescriptor,
    error::{WalletError, WalletResult},
    infrastructure::rpc_validator,
    service::chain_provider::{CallRequest, ChainProvider},
    utils::address_validator::{AddressFormat, AddressValidator},
};

/// 主网与 Sepolia 上的 ENS 注册表
pub const ENS_REGISTRY_ADDRESS: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";
/// 钱包服务端托管的子域名
pub const UPAL_SUFFIX: &str = ".upal.eth";
pub const ENS_SUFFIX: &str = ".eth";

const RESOLVER_SELECTOR: [u8; 4] = [0x01, 0x78, 0xb8, 0xbf];
const ADDR_SELECTOR: [u8; 4] = [0x3b, 0x3b, 0x57, 0xde];

#[async_trait]
pub trait NameService: Send + Sync {
    /// 没有关联地址时返回 `None`
    async fn resolve_name(&self, name: &str) -> WalletResult<Option<String>>;
}

/// EIP-137 namehash
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = Keccak256::digest(label.as_bytes());
        let mut hasher = Keccak256::new();
        hasher.update(node);
        hasher.update(label_hash);
        node.copy_from_slice(&hasher.finalize());
    }
    node
}

/// 通过链上 ENS 注册表解析
pub struct EnsRegistryNameService {
    provider: Arc<dyn ChainProvider>,
    registry: Address,
}

impl EnsRegistryNameService {
    pub fn new(provider: Arc<dyn ChainProvider>) -> WalletResult<Self> {
        let registry = ENS_REGISTRY_ADDRESS
            .parse()
            .map_err(|_| WalletError::Config("malformed ENS registry address".into()))?;
        Ok(Self { provider, registry })
    }

    async fn call_with_node(&self, to: Address, selector: [u8; 4], node: &[u8; 32]) -> WalletResult<Address> {
        let mut data = selector.to_vec();
        data.extend_from_slice(node);

        let result = self
            .provider
            .call(&CallRequest {
                to,
                data: Some(Bytes::from(data)),
                ..Default::default()
            })
            .await
            .map_err(|e| WalletError::ResolutionFailed(e.to_string()))?;

        if result.is_empty() {
            return Ok(Address::zero());
        }
        rpc_validator::validate_address_word(&result)
            .map_err(|e| WalletError::ResolutionFailed(e.to_string()))
    }
}

#[async_trait]
impl NameService for EnsRegistryNameService {
    async fn resolve_name(&self, name: &str) -> WalletResult<Option<String>> {
        let node = namehash(name);

        let resolver = self
            .call_with_node(self.registry, RESOLVER_SELECTOR, &node)
            .await?;
        if resolver.is_zero() {
            return Ok(None);
        }

        let addr = self.call_with_node(resolver, ADDR_SELECTOR, &node).await?;
        Ok(Some(format!("{addr:?}")))
    }
}

#[derive(Debug, Deserialize)]
struct OffchainAddress {
    #[serde(default)]
    chain: Option<serde_json::Value>,
    value: String,
}

#[derive(Debug, Deserialize)]
struct OffchainResolved {
    #[serde(default)]
    addresses: Vec<OffchainAddress>,
}

#[derive(Debug, Deserialize)]
struct OffchainResponse {
    #[serde(default)]
    success: bool,
    resolved: Option<OffchainResolved>,
}

/// 钱包服务端子域名解析（`*.upal.eth`）
pub struct OffchainNameService {
    http_client: reqwest::Client,
    base_url: String,
}

impl OffchainNameService {
    pub fn new(base_url: &str, timeout: Duration) -> WalletResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Config(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NameService for OffchainNameService {
    async fn resolve_name(&self, name: &str) -> WalletResult<Option<String>> {
        let url = format!("{}/api/ens/resolve/{}", self.base_url, name);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::ResolutionFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(WalletError::ResolutionFailed(format!(
                "resolver returned HTTP {}",
                response.status()
            )));
        }

        let body: OffchainResponse = response
            .json()
            .await
            .map_err(|e| WalletError::ResolutionFailed(e.to_string()))?;
        if !body.success {
            return Ok(None);
        }

        let addresses = body.resolved.map(|r| r.addresses).unwrap_or_default();
        let is_ethereum = |a: &&OffchainAddress| match &a.chain {
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("ethereum") || s == "60",
            Some(serde_json::Value::Number(n)) => n.as_u64() == Some(60),
            _ => false,
        };

        Ok(addresses
            .iter()
            .find(is_ethereum)
            .or_else(|| addresses.first())
            .map(|a| a.value.clone()))
    }
}

/// 名称解析器
#[derive(Clone, Default)]
pub struct AddressResolver {
    /// (后缀, 后端)，按后缀长度降序
    backends: Vec<(String, Arc<dyn NameService>)>,
}

impl AddressResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置装配：`.eth` 走链上注册表，`.upal.eth` 走服务端（若配置）
    pub fn from_config(
        config: &ResolverConfig,
        ens_provider: Arc<dyn ChainProvider>,
        timeout: Duration,
    ) -> WalletResult<Self> {
        let mut resolver =
            Self::new().with_backend(ENS_SUFFIX, Arc::new(EnsRegistryNameService::new(ens_provider)?));
        if let Some(base_url) = &config.offchain_base_url {
            resolver = resolver.with_backend(
                UPAL_SUFFIX,
                Arc::new(OffchainNameService::new(base_url, timeout)?),
            );
        }
        Ok(resolver)
    }

    pub fn with_backend(mut self, suffix: &str, backend: Arc<dyn NameService>) -> Self {
        let suffix = suffix.to_lowercase();
        self.backends.retain(|(s, _)| *s != suffix);
        self.backends.push((suffix, backend));
        self.backends.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// 输入是否为可解析的名称
    pub fn is_resolvable_name(&self, input: &str) -> bool {
        self.backend_for(input).is_some()
    }

    fn backend_for(&self, input: &str) -> Option<&Arc<dyn NameService>> {
        let lower = input.trim().to_lowercase();
        if !AddressValidator::is_name(&lower) {
            return None;
        }
        self.backends
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix.as_str()) && lower.len() > suffix.len())
            .map(|(_, b)| b)
    }

    /// 解析名称；合法地址原样返回
    pub async fn resolve(&self, input: &str) -> WalletResult<String> {
        let trimmed = input.trim();
        if AddressValidator::detect_format(trimmed).is_some() {
            return Ok(trimmed.to_string());
        }

        let backend = self
            .backend_for(trimmed)
            .ok_or_else(|| WalletError::InvalidAddress(trimmed.to_string()))?;

        let name = trimmed.to_lowercase();
        let resolved = backend.resolve_name(&name).await?;

        match resolved {
            Some(addr)
                if AddressValidator::is_evm_address(&addr)
                    && !AddressValidator::is_zero_address(&addr) =>
            {
                tracing::debug!(name = %name, "Name resolved");
                Ok(addr)
            }
            Some(_) => {
                tracing::warn!(name = %name, "Resolver returned an unusable address");
                Err(WalletError::ResolutionFailed(format!(
                    "{name} resolved to an invalid address"
                )))
            }
            None => Err(WalletError::ResolutionFailed(format!(
                "{name} has no associated address"
            ))),
        }
    }

    /// 解析并按网络地址格式校验
    pub async fn resolve_recipient(
        &self,
        input: &str,
        network: &NetworkDescriptor,
    ) -> WalletResult<String> {
        let address = self.resolve(input).await?;
        AddressValidator::validate(AddressFormat::Evm, &address).map_err(|_| {
            WalletError::InvalidAddress(format!(
                "{address} is not a valid address on {}",
                network.name
            ))
        })?;
        Ok(address)
    }
}
