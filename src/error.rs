use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// 钱包核心的领域错误
///
/// 每个变体对应一种用户可感知的失败类型；`Display` 面向日志，
/// `user_message` 面向用户。
#[derive(Debug, Error)]
pub enum WalletError {
    /// PIN 错误与密文损坏刻意不做区分
    #[error("invalid PIN or corrupted wallet data")]
    InvalidPinOrCorruptData,

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("token {token} is not supported on chain {chain_id}")]
    TokenNotSupported { token: String, chain_id: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("name resolution failed: {0}")]
    ResolutionFailed(String),

    /// 交易可能已上链，只能提示用户核实，不能自动重发
    #[error("submission outcome unknown for {tx_hash}: {reason}")]
    SubmissionUncertain { tx_hash: String, reason: String },

    #[error("submission failed: {reason}")]
    SubmissionFailed {
        tx_hash: Option<String>,
        reason: String,
    },

    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("unrecognized payment code: {0}")]
    Unrecognized(String),

    #[error("no keystore found")]
    KeystoreNotFound,

    #[error("a transfer from {0} is already in progress")]
    TransferInProgress(String),

    #[error("invalid PIN: {0}")]
    InvalidPin(String),

    #[error("invalid mnemonic phrase")]
    InvalidMnemonic,

    #[error("keystore store error: {0}")]
    Keystore(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WalletError {
    /// 稳定的机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidPinOrCorruptData => "invalid_pin_or_corrupt_data",
            WalletError::UnknownNetwork(_) => "unknown_network",
            WalletError::TokenNotSupported { .. } => "token_not_supported",
            WalletError::InvalidAddress(_) => "invalid_address",
            WalletError::InvalidAmount(_) => "invalid_amount",
            WalletError::ResolutionFailed(_) => "resolution_failed",
            WalletError::SubmissionUncertain { .. } => "submission_uncertain",
            WalletError::SubmissionFailed { .. } => "submission_failed",
            WalletError::UnsupportedProtocol(_) => "unsupported_protocol",
            WalletError::Unrecognized(_) => "unrecognized",
            WalletError::KeystoreNotFound => "keystore_not_found",
            WalletError::TransferInProgress(_) => "transfer_in_progress",
            WalletError::InvalidPin(_) => "invalid_pin",
            WalletError::InvalidMnemonic => "invalid_mnemonic",
            WalletError::Keystore(_) => "keystore_error",
            WalletError::Rpc(_) => "rpc_error",
            WalletError::Config(_) => "config_error",
        }
    }

    /// 展示给用户的提示文案
    pub fn user_message(&self) -> String {
        match self {
            WalletError::InvalidPinOrCorruptData => "Invalid PIN or corrupted wallet data".into(),
            WalletError::UnknownNetwork(n) => format!("Network {n} is not supported"),
            WalletError::TokenNotSupported { token, .. } => {
                format!("{token} is not available on this network")
            }
            WalletError::InvalidAddress(_) => "The recipient address is not valid".into(),
            WalletError::InvalidAmount(_) => "Please enter a valid amount".into(),
            WalletError::ResolutionFailed(_) => "Could not resolve the recipient name".into(),
            WalletError::SubmissionUncertain { tx_hash, .. } => format!(
                "The transfer may have been sent. Check transaction {tx_hash} on the block explorer before trying again."
            ),
            WalletError::SubmissionFailed { .. } => {
                "The transfer did not go through. No funds were moved.".into()
            }
            WalletError::UnsupportedProtocol(reason) => reason.clone(),
            WalletError::Unrecognized(_) => "This QR code is not a supported payment code".into(),
            WalletError::KeystoreNotFound => "No wallet found for this account".into(),
            WalletError::TransferInProgress(_) => {
                "Another transfer is still in progress. Please wait for it to finish.".into()
            }
            WalletError::InvalidPin(reason) => reason.clone(),
            WalletError::InvalidMnemonic => "Invalid recovery phrase".into(),
            WalletError::Keystore(_) => "Could not reach the wallet backup service".into(),
            WalletError::Rpc(_) => "The network is not responding. Please try again.".into(),
            WalletError::Config(_) => "Wallet is misconfigured".into(),
        }
    }

    /// 是否为发起任何网络请求之前就能确定的校验失败
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WalletError::InvalidAddress(_)
                | WalletError::InvalidAmount(_)
                | WalletError::TokenNotSupported { .. }
                | WalletError::UnknownNetwork(_)
        )
    }

    /// 关联的交易哈希（若已签名）
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            WalletError::SubmissionUncertain { tx_hash, .. } => Some(tx_hash),
            WalletError::SubmissionFailed { tx_hash, .. } => tx_hash.as_deref(),
            _ => None,
        }
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    BadRequest,
    Unauthorized,
    NotFound,
    Internal,
    InvalidAddress,
    TokenInvalid,
    KeystoreNotFound,
    ValidationFailed,
    ExternalServiceError,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::Unauthorized => "unauthorized",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Internal => "internal",
            AppErrorCode::InvalidAddress => "invalid_address",
            AppErrorCode::TokenInvalid => "token_invalid",
            AppErrorCode::KeystoreNotFound => "keystore_not_found",
            AppErrorCode::ValidationFailed => "validation_failed",
            AppErrorCode::ExternalServiceError => "external_service_error",
        }
    }
}

/// HTTP 层错误
#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Unauthorized, StatusCode::UNAUTHORIZED, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::NotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn with_code(mut self, code: AppErrorCode) -> Self {
        self.code = code;
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        let message = err.user_message();
        match err {
            WalletError::KeystoreNotFound => {
                AppError::not_found("No keystore found").with_code(AppErrorCode::KeystoreNotFound)
            }
            WalletError::InvalidAddress(_) => {
                AppError::bad_request(message).with_code(AppErrorCode::InvalidAddress)
            }
            e if e.is_validation() => {
                AppError::bad_request(message).with_code(AppErrorCode::ValidationFailed)
            }
            WalletError::InvalidPin(_)
            | WalletError::InvalidMnemonic
            | WalletError::UnsupportedProtocol(_)
            | WalletError::Unrecognized(_) => AppError::bad_request(message),
            WalletError::Keystore(_) | WalletError::Rpc(_) => AppError::new(
                AppErrorCode::ExternalServiceError,
                StatusCode::BAD_GATEWAY,
                message,
            ),
            other => {
                tracing::error!(error = %other, "Unhandled wallet error at HTTP boundary");
                AppError::internal("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(WalletError::InvalidAddress("x".into()).is_validation());
        assert!(WalletError::InvalidAmount("-1".into()).is_validation());
        assert!(WalletError::TokenNotSupported {
            token: "PYUSD".into(),
            chain_id: 545
        }
        .is_validation());
        assert!(!WalletError::InvalidPinOrCorruptData.is_validation());
        assert!(!WalletError::SubmissionUncertain {
            tx_hash: "0xabc".into(),
            reason: "timeout".into()
        }
        .is_validation());
    }

    #[test]
    fn test_uncertain_message_warns_against_resubmission() {
        let err = WalletError::SubmissionUncertain {
            tx_hash: "0xabc".into(),
            reason: "timeout".into(),
        };
        let msg = err.user_message();
        assert!(msg.contains("0xabc"));
        assert!(msg.contains("before trying again"));
        assert_eq!(err.tx_hash(), Some("0xabc"));
    }

    #[test]
    fn test_unlock_message_is_uniform() {
        assert_eq!(
            WalletError::InvalidPinOrCorruptData.user_message(),
            "Invalid PIN or corrupted wallet data"
        );
    }

    #[test]
    fn test_app_error_mapping() {
        let app: AppError = WalletError::KeystoreNotFound.into();
        assert_eq!(app.status, StatusCode::NOT_FOUND);
        assert_eq!(app.code, AppErrorCode::KeystoreNotFound);

        let app: AppError = WalletError::InvalidAddress("nope".into()).into();
        assert_eq!(app.status, StatusCode::BAD_REQUEST);

        let app: AppError = WalletError::Keystore("down".into()).into();
        assert_eq!(app.status, StatusCode::BAD_GATEWAY);
    }
}
