//! JWT Token 生成和验证模块
//!
//! 密钥库接口只需要账户 ID（`sub`），不携带角色或租户信息。

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Account ID
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl Claims {
    pub fn new(account_id: &str, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: account_id.to_string(),
            exp: (now + Duration::seconds(expires_in_secs)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// HS256 签名密钥
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.len() < 32 {
            return Err(anyhow!("JWT secret must be at least 32 characters long"));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// 签发 Token
    pub fn generate_token(&self, account_id: &str, expires_in_secs: i64) -> Result<String> {
        let claims = Claims::new(account_id, expires_in_secs);
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| anyhow!("Failed to encode token: {}", e))
    }

    /// 验证 Token 并返回 Claims
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 10; // 允许10秒时钟偏差

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                tracing::warn!("JWT: token verification failed: {}", e);
                anyhow!("Token verification failed: {}", e)
            })?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(anyhow!("Token has an empty subject"));
        }

        Ok(claims)
    }
}
