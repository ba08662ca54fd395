pub mod encryption;
pub mod jwt;
pub mod log_redact;
pub mod logging;
pub mod rpc_validator;
