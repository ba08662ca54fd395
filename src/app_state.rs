use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::jwt::JwtKeys,
    repository::keystore_repository::{InMemoryKeystoreRepository, KeystoreRepository},
};

/// 应用状态
/// 密钥库服务端路由共享的资源
#[derive(Clone)]
pub struct AppState {
    pub keystores: Arc<dyn KeystoreRepository>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub fn new(keystores: Arc<dyn KeystoreRepository>, jwt: JwtKeys) -> Self {
        Self { keystores, jwt }
    }

    /// 按配置创建（内存存储）
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let jwt = JwtKeys::from_secret(&config.server.jwt_secret)?;
        Ok(Self::new(Arc::new(InMemoryKeystoreRepository::new()), jwt))
    }
}
