//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 钱包核心配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub networks: NetworksConfig,
    #[serde(default)]
    pub keystore: KeystoreConfig,
    #[serde(default)]
    pub kdf: KdfConfig,
    #[serde(default)]
    pub qr: QrConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// RPC 调用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// 单次请求超时（毫秒）
    pub request_timeout_ms: u64,
    /// 只读调用的重试次数，广播永不重试
    pub read_retries: u32,
    pub confirmation_poll_ms: u64,
    pub confirmation_timeout_secs: u64,
    /// 发送后是否等待上链确认
    pub await_confirmation: bool,
}

/// 网络 RPC 端点覆盖（为空时使用注册表内置端点）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworksConfig {
    pub flow_testnet_rpc_url: Option<String>,
    pub sepolia_rpc_url: Option<String>,
    pub ethereum_rpc_url: Option<String>,
}

/// 远端密钥库存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
}

/// Argon2id 工作因子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// 二维码识别配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    /// 当前支持的链 ID（默认 Sepolia）
    pub supported_chain_id: u64,
    /// "warn" 或 "strict"
    pub chain_id_policy: String,
}

/// 名称解析配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// 钱包服务端子域名解析地址，例如 https://api.example.com
    pub offchain_base_url: Option<String>,
    /// ENS 注册表所在链
    pub ens_chain_id: u64,
}

/// 密钥库服务端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// 允许跨域访问的前端来源，未配置时不加 CORS 头
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: env_or("RPC_TIMEOUT_MS", 15_000),
            read_retries: env_or("RPC_READ_RETRIES", 2),
            confirmation_poll_ms: env_or("RPC_CONFIRMATION_POLL_MS", 2_000),
            confirmation_timeout_secs: env_or("RPC_CONFIRMATION_TIMEOUT_SECS", 120),
            await_confirmation: env_or("RPC_AWAIT_CONFIRMATION", true),
        }
    }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            api_base_url: std::env::var("KEYSTORE_API_URL")
                .unwrap_or_else(|_| "http://localhost:3001".into()),
            request_timeout_ms: env_or("KEYSTORE_TIMEOUT_MS", 10_000),
        }
    }
}

impl KdfConfig {
    /// 允许的最低内存开销（KiB）
    pub const MIN_MEMORY_KIB: u32 = 8 * 1024;
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_kib: env_or("KDF_MEMORY_KIB", 19 * 1024),
            iterations: env_or("KDF_ITERATIONS", 2),
            parallelism: env_or("KDF_PARALLELISM", 1),
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            supported_chain_id: env_or("QR_SUPPORTED_CHAIN_ID", 11_155_111),
            chain_id_policy: std::env::var("QR_CHAIN_ID_POLICY").unwrap_or_else(|_| "warn".into()),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            offchain_base_url: std::env::var("RESOLVER_OFFCHAIN_URL").ok(),
            ens_chain_id: env_or("RESOLVER_ENS_CHAIN_ID", 11_155_111),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into()),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_default(),
            allowed_origin: std::env::var("ALLOWED_ORIGIN").ok(),
        }
    }
}

impl NetworksConfig {
    pub fn from_env() -> Self {
        Self {
            flow_testnet_rpc_url: std::env::var("FLOW_TESTNET_RPC_URL").ok(),
            sepolia_rpc_url: std::env::var("SEPOLIA_RPC_URL").ok(),
            ethereum_rpc_url: std::env::var("ETHEREUM_RPC_URL").ok(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            logging: LoggingConfig::default(),
            rpc: RpcConfig::default(),
            networks: NetworksConfig::from_env(),
            keystore: KeystoreConfig::default(),
            kdf: KdfConfig::default(),
            qr: QrConfig::default(),
            resolver: ResolverConfig::default(),
            server: ServerConfig::default(),
        })
    }

    /// 从 TOML 配置文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        if self.rpc.request_timeout_ms == 0 {
            anyhow::bail!("rpc.request_timeout_ms must be greater than 0");
        }
        if self.rpc.confirmation_poll_ms == 0 {
            anyhow::bail!("rpc.confirmation_poll_ms must be greater than 0");
        }
        if self.keystore.request_timeout_ms == 0 {
            anyhow::bail!("keystore.request_timeout_ms must be greater than 0");
        }
        if self.keystore.api_base_url.is_empty() {
            anyhow::bail!("keystore.api_base_url cannot be empty");
        }

        if self.kdf.memory_kib < KdfConfig::MIN_MEMORY_KIB {
            anyhow::bail!(
                "kdf.memory_kib must be at least {} (got {})",
                KdfConfig::MIN_MEMORY_KIB,
                self.kdf.memory_kib
            );
        }
        if self.kdf.iterations == 0 || self.kdf.parallelism == 0 {
            anyhow::bail!("kdf.iterations and kdf.parallelism must be greater than 0");
        }

        if self.qr.chain_id_policy != "warn" && self.qr.chain_id_policy != "strict" {
            anyhow::bail!("Invalid qr.chain_id_policy: {}", self.qr.chain_id_policy);
        }

        if !self.server.jwt_secret.is_empty() && self.server.jwt_secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 characters long");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn sample() -> Config {
        Config {
            logging: LoggingConfig {
                level: "info".into(),
                format: "json".into(),
            },
            rpc: RpcConfig {
                request_timeout_ms: 5_000,
                read_retries: 1,
                confirmation_poll_ms: 500,
                confirmation_timeout_secs: 30,
                await_confirmation: false,
            },
            networks: NetworksConfig::default(),
            keystore: KeystoreConfig {
                api_base_url: "http://localhost:3001".into(),
                request_timeout_ms: 1_000,
            },
            kdf: KdfConfig {
                memory_kib: 19 * 1024,
                iterations: 2,
                parallelism: 1,
            },
            qr: QrConfig {
                supported_chain_id: 11_155_111,
                chain_id_policy: "warn".into(),
            },
            resolver: ResolverConfig {
                offchain_base_url: None,
                ens_chain_id: 11_155_111,
            },
            server: ServerConfig {
                bind_addr: "127.0.0.1:3001".into(),
                jwt_secret: "test_secret_that_is_at_least_32_characters_long".into(),
                allowed_origin: None,
            },
        }
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "text"

[rpc]
request_timeout_ms = 3000
read_retries = 0
confirmation_poll_ms = 250
confirmation_timeout_secs = 10
await_confirmation = false

[networks]
sepolia_rpc_url = "https://sepolia.example.org"

[keystore]
api_base_url = "https://wallet.example.org"
request_timeout_ms = 2000

[kdf]
memory_kib = 16384
iterations = 3
parallelism = 1

[qr]
supported_chain_id = 545
chain_id_policy = "strict"

[resolver]
ens_chain_id = 1

[server]
bind_addr = "127.0.0.1:9090"
jwt_secret = "test_secret_that_is_at_least_32_characters_long"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.rpc.request_timeout_ms, 3000);
        assert_eq!(
            config.networks.sepolia_rpc_url.as_deref(),
            Some("https://sepolia.example.org")
        );
        assert!(config.networks.flow_testnet_rpc_url.is_none());
        assert_eq!(config.qr.supported_chain_id, 545);
        assert_eq!(config.qr.chain_id_policy, "strict");
        assert_eq!(config.resolver.ens_chain_id, 1);
        assert!(config.resolver.offchain_base_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_missing_file_fails() {
        assert!(Config::from_file("/nonexistent/upalcore.toml").is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(sample().validate().is_ok());

        let mut config = sample();
        config.logging.level = "verbose".into();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.kdf.memory_kib = 1024;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.qr.chain_id_policy = "ignore".into();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.server.jwt_secret = "short".into();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.rpc.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
