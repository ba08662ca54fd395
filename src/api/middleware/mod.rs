pub mod auth;
pub mod trace_id;

pub use auth::{auth_middleware, AccountId};
pub use trace_id::{trace_id_middleware, TraceId, TRACE_ID_HEADER};
