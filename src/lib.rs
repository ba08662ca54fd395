//! UPal Core - 多通道支付钱包核心
//!
//! 本地加密密钥库、PIN 解锁、按网络选择节点的原生币/代币转账，
//! 以及把扫码内容识别为支付目标。

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode, WalletError, WalletResult};

pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{
            EncryptedKeystore, NetworkDescriptor, NetworkRegistry, PaymentTarget, Pin, SigningKey,
            TargetNetwork, TransferReceipt, TransferStatus,
        },
        error::{WalletError, WalletResult},
        repository::{HttpKeystoreStore, KeystoreStore},
        service::{
            AddressResolver, PaymentFlow, QrClassifier, TransferEngine, WalletSetup, WalletUnlock,
        },
    };
}
