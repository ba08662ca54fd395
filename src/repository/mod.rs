pub mod keystore_repository;

pub use keystore_repository::{
    HttpKeystoreStore, InMemoryKeystoreRepository, InMemoryKeystoreStore, KeystoreRepository,
    KeystoreStore,
};
