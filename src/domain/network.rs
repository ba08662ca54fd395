//! 网络注册表
//!
//! 静态描述支持的链（RPC 端点、链 ID、原生币、代币合约地址）。
//! 纯查询，无 I/O，构建后不可变。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::NetworksConfig,
    error::{WalletError, WalletResult},
    utils::address_validator::AddressValidator,
};

pub const FLOW_TESTNET_CHAIN_ID: u64 = 545;
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
pub const ETHEREUM_CHAIN_ID: u64 = 1;

/// 网络描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    /// 规范键，例如 `sepolia`
    pub key: String,
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub native_symbol: String,
    pub native_decimals: u8,
    pub block_explorer_url: String,
}

impl NetworkDescriptor {
    /// 区块浏览器中交易页面的链接
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.block_explorer_url.trim_end_matches('/'), tx_hash)
    }
}

/// 代币描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub symbol: String,
    pub decimals: u8,
    pub is_native: bool,
    /// chainId -> 合约地址；`None` 表示该链上没有部署
    pub contract_address_by_chain_id: HashMap<u64, Option<String>>,
}

impl TokenDescriptor {
    fn native(symbol: &str, decimals: u8, chains: &[u64]) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            is_native: true,
            contract_address_by_chain_id: chains.iter().map(|id| (*id, None)).collect(),
        }
    }

    /// 该代币在指定链上是否为原生币
    pub fn is_native_on(&self, chain_id: u64) -> bool {
        self.is_native && self.contract_address_by_chain_id.contains_key(&chain_id)
    }
}

/// 网络与代币注册表
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: HashMap<u64, NetworkDescriptor>,
    aliases: HashMap<String, u64>,
    tokens: HashMap<String, TokenDescriptor>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::with_overrides(&NetworksConfig::default())
    }
}

impl NetworkRegistry {
    /// 内置网络，RPC 端点可由配置覆盖
    pub fn with_overrides(overrides: &NetworksConfig) -> Self {
        let networks = vec![
            NetworkDescriptor {
                key: "flow-testnet".into(),
                name: "Flow EVM Testnet".into(),
                rpc_url: overrides
                    .flow_testnet_rpc_url
                    .clone()
                    .unwrap_or_else(|| "https://testnet.evm.nodes.onflow.org".into()),
                chain_id: FLOW_TESTNET_CHAIN_ID,
                native_symbol: "FLOW".into(),
                native_decimals: 18,
                block_explorer_url: "https://evm-testnet.flowscan.org".into(),
            },
            NetworkDescriptor {
                key: "sepolia".into(),
                name: "Ethereum Sepolia".into(),
                rpc_url: overrides
                    .sepolia_rpc_url
                    .clone()
                    .unwrap_or_else(|| "https://ethereum-sepolia-rpc.publicnode.com".into()),
                chain_id: SEPOLIA_CHAIN_ID,
                native_symbol: "ETH".into(),
                native_decimals: 18,
                block_explorer_url: "https://sepolia.etherscan.io".into(),
            },
            NetworkDescriptor {
                key: "ethereum".into(),
                name: "Ethereum Mainnet".into(),
                rpc_url: overrides
                    .ethereum_rpc_url
                    .clone()
                    .unwrap_or_else(|| "https://ethereum-rpc.publicnode.com".into()),
                chain_id: ETHEREUM_CHAIN_ID,
                native_symbol: "ETH".into(),
                native_decimals: 18,
                block_explorer_url: "https://etherscan.io".into(),
            },
        ];

        let pyusd = TokenDescriptor {
            symbol: "PYUSD".into(),
            decimals: 6,
            is_native: false,
            contract_address_by_chain_id: HashMap::from([
                // Flow EVM 测试网尚未部署
                (FLOW_TESTNET_CHAIN_ID, None),
                (
                    SEPOLIA_CHAIN_ID,
                    Some("0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9".to_string()),
                ),
                (
                    ETHEREUM_CHAIN_ID,
                    Some("0x6c3ea9036406852006290770BEdFcAbA0e23A0e8".to_string()),
                ),
            ]),
        };

        let tokens = vec![
            TokenDescriptor::native("FLOW", 18, &[FLOW_TESTNET_CHAIN_ID]),
            TokenDescriptor::native("ETH", 18, &[SEPOLIA_CHAIN_ID, ETHEREUM_CHAIN_ID]),
            pyusd,
        ];

        let aliases = [
            ("flow", FLOW_TESTNET_CHAIN_ID),
            ("flow-testnet", FLOW_TESTNET_CHAIN_ID),
            ("flowtestnet", FLOW_TESTNET_CHAIN_ID),
            ("sepolia", SEPOLIA_CHAIN_ID),
            ("ethereum-sepolia", SEPOLIA_CHAIN_ID),
            ("ethereum", ETHEREUM_CHAIN_ID),
            ("mainnet", ETHEREUM_CHAIN_ID),
            ("eth", ETHEREUM_CHAIN_ID),
        ];

        Self::from_parts(networks, tokens, &aliases)
    }

    /// 由显式的网络与代币列表构建
    pub fn from_parts(
        networks: Vec<NetworkDescriptor>,
        tokens: Vec<TokenDescriptor>,
        aliases: &[(&str, u64)],
    ) -> Self {
        let mut alias_map: HashMap<String, u64> = aliases
            .iter()
            .map(|(a, id)| (a.to_lowercase(), *id))
            .collect();
        for n in &networks {
            alias_map.entry(n.key.to_lowercase()).or_insert(n.chain_id);
        }

        Self {
            networks: networks.into_iter().map(|n| (n.chain_id, n)).collect(),
            aliases: alias_map,
            tokens: tokens
                .into_iter()
                .map(|t| (t.symbol.to_uppercase(), t))
                .collect(),
        }
    }

    /// 按链 ID（十进制或 0x 十六进制）、网络键或别名查找网络
    pub fn describe(&self, chain_id_or_symbol: &str) -> WalletResult<&NetworkDescriptor> {
        let input = chain_id_or_symbol.trim();

        let chain_id = if let Some(hex) = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
        {
            u64::from_str_radix(hex, 16).ok()
        } else if let Ok(id) = input.parse::<u64>() {
            Some(id)
        } else {
            self.aliases.get(&input.to_lowercase()).copied()
        };

        chain_id
            .and_then(|id| self.networks.get(&id))
            .ok_or_else(|| WalletError::UnknownNetwork(input.to_string()))
    }

    pub fn by_chain_id(&self, chain_id: u64) -> WalletResult<&NetworkDescriptor> {
        self.networks
            .get(&chain_id)
            .ok_or_else(|| WalletError::UnknownNetwork(chain_id.to_string()))
    }

    pub fn networks(&self) -> impl Iterator<Item = &NetworkDescriptor> {
        self.networks.values()
    }

    pub fn token(&self, symbol: &str) -> WalletResult<&TokenDescriptor> {
        self.tokens
            .get(&symbol.trim().to_uppercase())
            .ok_or_else(|| WalletError::TokenNotSupported {
                token: symbol.to_string(),
                chain_id: 0,
            })
    }

    /// 链的原生币描述
    pub fn native_token(&self, chain_id: u64) -> WalletResult<&TokenDescriptor> {
        let network = self.by_chain_id(chain_id)?;
        self.token(&network.native_symbol)
    }

    /// 非原生代币在指定链上的合约地址
    ///
    /// 原生币不走这条路径，对原生币调用同样返回 `TokenNotSupported`。
    pub fn token_address(&self, token_symbol: &str, chain_id: u64) -> WalletResult<String> {
        let not_supported = || WalletError::TokenNotSupported {
            token: token_symbol.to_string(),
            chain_id,
        };

        let token = self
            .tokens
            .get(&token_symbol.trim().to_uppercase())
            .ok_or_else(not_supported)?;
        if token.is_native {
            return Err(not_supported());
        }

        token
            .contract_address_by_chain_id
            .get(&chain_id)
            .and_then(|addr| addr.clone())
            .ok_or_else(not_supported)
    }

    /// 校验注册表完整性
    pub fn validate(&self) -> anyhow::Result<()> {
        for (id, n) in &self.networks {
            if *id != n.chain_id {
                anyhow::bail!("network {} registered under chain id {}", n.key, id);
            }
            if n.name.is_empty() || n.rpc_url.is_empty() || n.native_symbol.is_empty() {
                anyhow::bail!("network {} has empty fields", n.chain_id);
            }
            if !n.rpc_url.starts_with("http://") && !n.rpc_url.starts_with("https://") {
                anyhow::bail!("network {} has a non-HTTP rpc url", n.chain_id);
            }
        }

        for t in self.tokens.values() {
            for (chain_id, addr) in &t.contract_address_by_chain_id {
                match (t.is_native, addr) {
                    (true, Some(_)) => {
                        anyhow::bail!("native token {} carries a contract address", t.symbol)
                    }
                    (false, Some(a)) if !AddressValidator::is_evm_address(a) => {
                        anyhow::bail!("token {} has malformed contract on {}", t.symbol, chain_id)
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

/// 常见链 ID 的可读名称
pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        1 => "Ethereum Mainnet".into(),
        5 => "Ethereum Goerli".into(),
        137 => "Polygon Mainnet".into(),
        545 => "Flow EVM Testnet".into(),
        80_001 => "Polygon Mumbai".into(),
        11_155_111 => "Ethereum Sepolia".into(),
        other => format!("Chain ID {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_by_id_hex_and_alias() {
        let registry = NetworkRegistry::default();

        assert_eq!(registry.describe("545").unwrap().native_symbol, "FLOW");
        assert_eq!(registry.describe("0xaa36a7").unwrap().chain_id, SEPOLIA_CHAIN_ID);
        assert_eq!(registry.describe("Sepolia").unwrap().chain_id, SEPOLIA_CHAIN_ID);
        assert_eq!(registry.describe("flow").unwrap().chain_id, FLOW_TESTNET_CHAIN_ID);
        assert_eq!(registry.describe("mainnet").unwrap().chain_id, ETHEREUM_CHAIN_ID);
    }

    #[test]
    fn test_unknown_network() {
        let registry = NetworkRegistry::default();
        assert!(matches!(
            registry.describe("137"),
            Err(WalletError::UnknownNetwork(_))
        ));
        assert!(matches!(
            registry.describe("solana"),
            Err(WalletError::UnknownNetwork(_))
        ));
    }

    #[test]
    fn test_token_address_lookup() {
        let registry = NetworkRegistry::default();

        assert_eq!(
            registry.token_address("pyusd", SEPOLIA_CHAIN_ID).unwrap(),
            "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9"
        );
        assert!(matches!(
            registry.token_address("PYUSD", FLOW_TESTNET_CHAIN_ID),
            Err(WalletError::TokenNotSupported { chain_id: 545, .. })
        ));
        assert!(matches!(
            registry.token_address("DOGE", SEPOLIA_CHAIN_ID),
            Err(WalletError::TokenNotSupported { .. })
        ));
    }

    #[test]
    fn test_native_tokens() {
        let registry = NetworkRegistry::default();
        let flow = registry.native_token(FLOW_TESTNET_CHAIN_ID).unwrap();
        assert_eq!(flow.symbol, "FLOW");
        assert!(flow.is_native_on(FLOW_TESTNET_CHAIN_ID));
        assert!(!flow.is_native_on(SEPOLIA_CHAIN_ID));
        assert!(registry.token_address("ETH", SEPOLIA_CHAIN_ID).is_err());
    }

    #[test]
    fn test_overrides_and_validate() {
        let overrides = NetworksConfig {
            sepolia_rpc_url: Some("http://127.0.0.1:8545".into()),
            ..Default::default()
        };
        let registry = NetworkRegistry::with_overrides(&overrides);
        assert_eq!(
            registry.by_chain_id(SEPOLIA_CHAIN_ID).unwrap().rpc_url,
            "http://127.0.0.1:8545"
        );
        assert!(registry.validate().is_ok());
        assert_eq!(registry.networks().count(), 3);
    }

    #[test]
    fn test_chain_names() {
        assert_eq!(chain_name(1), "Ethereum Mainnet");
        assert_eq!(chain_name(30), "Chain ID 30");
    }

    #[test]
    fn test_tx_url() {
        let registry = NetworkRegistry::default();
        let n = registry.by_chain_id(SEPOLIA_CHAIN_ID).unwrap();
        assert_eq!(n.tx_url("0xabc"), "https://sepolia.etherscan.io/tx/0xabc");
    }
}
