//! 支付流程编排
//!
//! 一笔转账的固定顺序：预检代币与金额 → 解析并校验收款方 → 读取密钥库
//! → 解锁（阻塞线程池）→ 发送。输入有误时不读取密钥库，也不解锁。
//! 签名密钥由本次调用独占，任何一步出错都会在返回前释放。

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    domain::{
        network::NetworkRegistry,
        payment_target::PaymentTarget,
        signing_key::Pin,
        transfer::TransferReceipt,
    },
    error::{WalletError, WalletResult},
    infrastructure::log_redact::redact_identifier,
    repository::keystore_repository::KeystoreStore,
    service::{
        address_resolver::AddressResolver, chain_provider::ProviderRegistry,
        transfer_engine::TransferEngine, wallet_unlock::WalletUnlock,
    },
    utils::amount::parse_amount,
};

/// 法币金额的小数位
const FIAT_DECIMALS: u8 = 2;

/// 模拟法币通道的受理回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatReceipt {
    /// `upi_<uuid>`
    pub reference: String,
    pub identifier: String,
    pub provider: String,
    pub amount: String,
}

/// 按支付目标分派后的结果
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Chain(TransferReceipt),
    Fiat(FiatReceipt),
}

pub struct PaymentFlow {
    store: Arc<dyn KeystoreStore>,
    engine: Arc<TransferEngine>,
    resolver: AddressResolver,
}

impl PaymentFlow {
    pub fn new(
        store: Arc<dyn KeystoreStore>,
        engine: Arc<TransferEngine>,
        resolver: AddressResolver,
    ) -> Self {
        Self {
            store,
            engine,
            resolver,
        }
    }

    /// 按配置装配注册表、节点、转账引擎和名称解析器
    pub fn from_config(config: &Config, store: Arc<dyn KeystoreStore>) -> WalletResult<Self> {
        let registry = NetworkRegistry::with_overrides(&config.networks);
        registry
            .validate()
            .map_err(|e| WalletError::Config(e.to_string()))?;

        let providers = ProviderRegistry::from_registry(&registry, &config.rpc)?;
        let ens_provider = providers.get(config.resolver.ens_chain_id)?;
        let resolver = AddressResolver::from_config(
            &config.resolver,
            ens_provider,
            Duration::from_millis(config.rpc.request_timeout_ms),
        )?;

        let engine = TransferEngine::new(Arc::new(registry), providers, config.rpc.clone());
        Ok(Self::new(store, Arc::new(engine), resolver))
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    /// 链上支付。`network` 为链 ID 或网络标识，`recipient` 可以是地址或名称。
    pub async fn pay(
        &self,
        pin: Pin,
        recipient: &str,
        amount: &str,
        token_symbol: &str,
        network: &str,
    ) -> WalletResult<TransferReceipt> {
        let network = self.engine.registry().describe(network)?.clone();
        self.engine.check_asset(token_symbol, amount, &network)?;
        let to_address = self.resolver.resolve_recipient(recipient, &network).await?;

        let stored = self.store.fetch().await?;
        let signing_key = WalletUnlock::unlock(&stored.keystore, pin).await?;

        self.engine
            .send(signing_key, token_symbol, &to_address, amount, &network)
            .await
    }

    /// 模拟法币通道，不产生链上交互
    pub fn pay_fiat(&self, identifier: &str, provider: &str, amount: &str) -> WalletResult<FiatReceipt> {
        parse_amount(amount, FIAT_DECIMALS)?;

        let receipt = FiatReceipt {
            reference: format!("upi_{}", Uuid::new_v4().simple()),
            identifier: identifier.to_string(),
            provider: provider.to_string(),
            amount: amount.trim().to_string(),
        };
        tracing::info!(
            reference = %receipt.reference,
            identifier = %redact_identifier(identifier),
            "Fiat payment accepted"
        );
        Ok(receipt)
    }

    /// 按扫码结果支付
    pub async fn pay_target(
        &self,
        target: PaymentTarget,
        pin: Pin,
        amount: &str,
        token_symbol: &str,
        network: &str,
    ) -> WalletResult<PaymentOutcome> {
        match target.into_result()? {
            PaymentTarget::Fiat {
                identifier,
                provider,
            } => self
                .pay_fiat(&identifier, &provider, amount)
                .map(PaymentOutcome::Fiat),
            PaymentTarget::ChainAddress {
                address, warning, ..
            } => {
                if let Some(warning) = warning {
                    tracing::warn!(warning = %warning, "Paying a target with a chain warning");
                }
                self.pay(pin, &address, amount, token_symbol, network)
                    .await
                    .map(PaymentOutcome::Chain)
            }
            other => Err(WalletError::Unrecognized(other.kind().to_string())),
        }
    }
}
