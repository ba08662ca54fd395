//! Domain 模块
//!
//! 网络、密钥、转账与支付目标等领域模型

pub mod keystore;
pub mod network;
pub mod payment_target;
pub mod signing_key;
pub mod transfer;

// 重新导出常用类型
pub use keystore::{EncryptedKeystore, StoreAck, StoredKeystore};
pub use network::{chain_name, NetworkDescriptor, NetworkRegistry, TokenDescriptor};
pub use payment_target::{PaymentTarget, TargetNetwork};
pub use signing_key::{Pin, SigningKey};
pub use transfer::{BuiltTransfer, TransferKind, TransferReceipt, TransferRequest, TransferStatus};
