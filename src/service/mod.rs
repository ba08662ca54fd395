//! Service 模块
//!
//! 解锁、转账、名称解析、扫码识别与支付流程编排

pub mod address_resolver;
pub mod blockchain_client;
pub mod chain_provider;
pub mod payment_flow;
pub mod qr_classifier;
pub mod transfer_engine;
pub mod wallet_setup;
pub mod wallet_unlock;

pub use address_resolver::{AddressResolver, NameService};
pub use blockchain_client::JsonRpcProvider;
pub use chain_provider::{ChainProvider, ProviderError, ProviderRegistry};
pub use payment_flow::{FiatReceipt, PaymentFlow, PaymentOutcome};
pub use qr_classifier::{ChainIdPolicy, QrClassifier};
pub use transfer_engine::TransferEngine;
pub use wallet_setup::{GeneratedWallet, WalletSetup};
pub use wallet_unlock::WalletUnlock;
