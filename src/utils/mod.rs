pub mod address_validator;
pub mod amount;

pub use address_validator::{AddressFormat, AddressValidator};
pub use amount::{format_amount, parse_amount};
