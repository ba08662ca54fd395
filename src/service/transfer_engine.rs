//! 转账引擎
//!
//! 构建、签名、广播原生币与 ERC20 转账。所有校验（网络、地址、金额、代币映射）
//! 都在第一次 RPC 调用之前完成；广播只发送一次，超时等无法确认送达的失败
//! 报告为 `SubmissionUncertain`，绝不自动重发。

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use ethers::{
    types::{transaction::eip2718::TypedTransaction, Address, TransactionRequest, U256},
    utils::keccak256,
};

use crate::{
    config::RpcConfig,
    domain::{
        network::{NetworkDescriptor, NetworkRegistry},
        signing_key::SigningKey,
        transfer::{
            erc20_balance_of_data, BuiltTransfer, TransferKind, TransferReceipt, TransferRequest,
            TransferStatus,
        },
    },
    error::{WalletError, WalletResult},
    infrastructure::log_redact::{redact_address, redact_hex_string, SensitiveRedact},
    service::chain_provider::{CallRequest, ChainProvider, ProviderError, ProviderRegistry},
    utils::{
        address_validator::{AddressFormat, AddressValidator},
        amount::{format_amount, parse_amount},
    },
};

/// 原生币转账的默认 gas limit
pub const NATIVE_GAS_LIMIT: u64 = 21_000;
/// ERC20 转账的默认 gas limit
pub const TOKEN_GAS_LIMIT: u64 = 65_000;

/// 同一发送地址同时只允许一笔转账
#[derive(Default)]
struct InFlight {
    senders: Mutex<HashSet<Address>>,
}

struct InFlightGuard {
    owner: Arc<InFlight>,
    sender: Address,
}

impl InFlight {
    fn acquire(self: &Arc<Self>, sender: Address) -> WalletResult<InFlightGuard> {
        let mut senders = self.senders.lock().unwrap_or_else(|p| p.into_inner());
        if !senders.insert(sender) {
            return Err(WalletError::TransferInProgress(redact_address(&format!(
                "{sender:?}"
            ))));
        }
        Ok(InFlightGuard {
            owner: Arc::clone(self),
            sender,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut senders = self.owner.senders.lock().unwrap_or_else(|p| p.into_inner());
        senders.remove(&self.sender);
    }
}

/// 转账引擎
pub struct TransferEngine {
    registry: Arc<NetworkRegistry>,
    providers: ProviderRegistry,
    rpc: RpcConfig,
    in_flight: Arc<InFlight>,
}

impl TransferEngine {
    pub fn new(registry: Arc<NetworkRegistry>, providers: ProviderRegistry, rpc: RpcConfig) -> Self {
        Self {
            registry,
            providers,
            rpc,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    fn provider(&self, network: &NetworkDescriptor) -> WalletResult<Arc<dyn ChainProvider>> {
        self.providers.get(network.chain_id)
    }

    /// 网络必须已注册
    fn check_network(&self, network: &NetworkDescriptor) -> WalletResult<()> {
        self.registry.by_chain_id(network.chain_id).map(|_| ())
    }

    /// 代币是否为该网络原生币；未登记的代币按不支持处理
    fn is_native(&self, token_symbol: &str, network: &NetworkDescriptor) -> WalletResult<bool> {
        self.registry
            .token(token_symbol)
            .map(|t| t.is_native_on(network.chain_id))
            .map_err(|_| WalletError::TokenNotSupported {
                token: token_symbol.to_string(),
                chain_id: network.chain_id,
            })
    }

    /// 代币映射与金额的预检，不需要收款方与签名密钥
    pub fn check_asset(
        &self,
        token_symbol: &str,
        amount: &str,
        network: &NetworkDescriptor,
    ) -> WalletResult<()> {
        self.check_network(network)?;
        let decimals = if self.is_native(token_symbol, network)? {
            network.native_decimals
        } else {
            self.registry.token_address(token_symbol, network.chain_id)?;
            self.registry.token(token_symbol)?.decimals
        };
        parse_amount(amount, decimals).map(|_| ())
    }

    fn parse_recipient(to_address: &str) -> WalletResult<Address> {
        let to = to_address.trim();
        AddressValidator::validate(AddressFormat::Evm, to)?;
        to.parse::<Address>()
            .map_err(|_| WalletError::InvalidAddress(to.to_string()))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 预检（Built），无副作用
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn prepare_native(
        &self,
        from: Address,
        to_address: &str,
        amount: &str,
        network: &NetworkDescriptor,
    ) -> WalletResult<BuiltTransfer> {
        self.check_network(network)?;
        let recipient = Self::parse_recipient(to_address)?;
        let value = parse_amount(amount, network.native_decimals)?;

        Ok(BuiltTransfer {
            from,
            recipient,
            kind: TransferKind::Native,
            value,
            token_symbol: network.native_symbol.clone(),
            chain_id: network.chain_id,
            status: TransferStatus::Built,
        })
    }

    pub fn prepare_token(
        &self,
        from: Address,
        token_symbol: &str,
        to_address: &str,
        amount: &str,
        network: &NetworkDescriptor,
    ) -> WalletResult<BuiltTransfer> {
        self.check_network(network)?;

        // 原生币和未映射的代币都走 TokenNotSupported
        let contract = self.registry.token_address(token_symbol, network.chain_id)?;
        let token = self.registry.token(token_symbol)?;
        let contract: Address = contract.parse().map_err(|_| {
            WalletError::Config(format!("malformed contract for {}", token.symbol))
        })?;

        let recipient = Self::parse_recipient(to_address)?;
        let value = parse_amount(amount, token.decimals)?;

        Ok(BuiltTransfer {
            from,
            recipient,
            kind: TransferKind::Token { contract },
            value,
            token_symbol: token.symbol.clone(),
            chain_id: network.chain_id,
            status: TransferStatus::Built,
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 签名与广播（Built → Submitted）
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 签名并广播。签名密钥在函数返回时释放。
    pub async fn submit(
        &self,
        built: BuiltTransfer,
        signing_key: SigningKey,
        network: &NetworkDescriptor,
    ) -> WalletResult<TransferReceipt> {
        if built.status != TransferStatus::Built || built.chain_id != network.chain_id {
            return Err(WalletError::SubmissionFailed {
                tx_hash: None,
                reason: "transfer is not in a submittable state".into(),
            });
        }
        if signing_key.address() != built.from {
            return Err(WalletError::SubmissionFailed {
                tx_hash: None,
                reason: "signing key does not match sender".into(),
            });
        }

        let provider = self.provider(network)?;

        let nonce = provider.get_transaction_count(built.from).await?;
        let gas_price = provider.gas_price().await?;

        let call = CallRequest {
            from: Some(built.from),
            to: built.tx_to(),
            value: Some(built.tx_value()),
            data: built.tx_data(),
        };
        let default_gas = if built.is_native() {
            NATIVE_GAS_LIMIT
        } else {
            TOKEN_GAS_LIMIT
        };
        let gas_limit = match provider.estimate_gas(&call).await {
            Ok(gas) => gas,
            Err(ProviderError::Rpc { code, message }) => {
                // 预估即回滚（余额不足等），不广播
                tracing::warn!(code = code, message = %message, "Gas estimation rejected transfer");
                return Err(WalletError::SubmissionFailed {
                    tx_hash: None,
                    reason: message,
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, default_gas = default_gas, "Gas estimation unavailable, using default");
                default_gas
            }
        };

        let mut tx = TransactionRequest::new()
            .from(built.from)
            .to(built.tx_to())
            .value(built.tx_value())
            .nonce(nonce)
            .gas(gas_limit)
            .gas_price(gas_price)
            .chain_id(built.chain_id);
        if let Some(data) = built.tx_data() {
            tx = tx.data(data);
        }
        let typed = TypedTransaction::Legacy(tx);

        let signature = signing_key.sign_transaction(&typed, built.chain_id)?;
        drop(signing_key);

        let raw = typed.rlp_signed(&signature);
        let tx_hash = format!("0x{}", hex::encode(keccak256(&raw)));

        tracing::info!(
            tx_hash = %tx_hash,
            chain_id = built.chain_id,
            from = %redact_address(&format!("{:?}", built.from)),
            to = %redact_address(&format!("{:?}", built.recipient)),
            token = %built.token_symbol,
            nonce = nonce,
            gas_limit = gas_limit,
            raw_tx = %redact_hex_string(&raw.to_string(), 10),
            "Broadcasting transfer"
        );

        match provider.send_raw_transaction(&raw).await {
            Ok(node_hash) => {
                if !node_hash.eq_ignore_ascii_case(&tx_hash) {
                    tracing::warn!(local = %tx_hash, node = %node_hash, "Node returned a different transaction hash");
                }
                tracing::info!(tx_hash = %tx_hash, status = %TransferStatus::Submitted, "Transfer submitted");
                Ok(TransferReceipt::submitted(tx_hash, network))
            }
            Err(e) => Err(Self::classify_broadcast_error(tx_hash, e)),
        }
    }

    /// 广播失败分类
    fn classify_broadcast_error(tx_hash: String, err: ProviderError) -> WalletError {
        match err {
            ProviderError::Rpc { code, message } => {
                tracing::warn!(tx_hash = %tx_hash, code = code, message = %message, "Transfer rejected by node");
                WalletError::SubmissionFailed {
                    tx_hash: Some(tx_hash),
                    reason: message,
                }
            }
            ProviderError::Connect(reason) => {
                tracing::warn!(tx_hash = %tx_hash, reason = %reason, "Node unreachable, transfer not sent");
                WalletError::SubmissionFailed {
                    tx_hash: Some(tx_hash),
                    reason,
                }
            }
            other => {
                tracing::error!(
                    tx_hash = %tx_hash,
                    error = %other,
                    "Broadcast outcome unknown; caller must check chain state before resubmitting"
                );
                WalletError::SubmissionUncertain {
                    tx_hash,
                    reason: other.to_string(),
                }
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 确认（Submitted → Confirmed | Failed）
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 轮询回执直到确认、回滚或超时。超时返回仍为 `Submitted` 的回执。
    pub async fn confirm(
        &self,
        receipt: TransferReceipt,
        network: &NetworkDescriptor,
    ) -> WalletResult<TransferReceipt> {
        if receipt.status != TransferStatus::Submitted {
            return Ok(receipt);
        }

        let provider = self.provider(network)?;
        let poll = Duration::from_millis(self.rpc.confirmation_poll_ms.max(1));
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.rpc.confirmation_timeout_secs);

        loop {
            match provider
                .get_transaction_receipt(&receipt.transaction_hash)
                .await
            {
                Ok(Some(chain)) if chain.status == Some(0) => {
                    tracing::warn!(tx_hash = %receipt.transaction_hash, "Transfer reverted on chain");
                    return Err(WalletError::SubmissionFailed {
                        tx_hash: Some(receipt.transaction_hash),
                        reason: "transaction reverted".into(),
                    });
                }
                Ok(Some(chain)) if chain.block_number.is_some() => {
                    tracing::info!(
                        tx_hash = %receipt.transaction_hash,
                        block_number = ?chain.block_number,
                        gas_used = ?chain.gas_used,
                        "Transfer confirmed"
                    );
                    return Ok(TransferReceipt {
                        block_number: chain.block_number,
                        gas_used: chain.gas_used,
                        status: TransferStatus::Confirmed,
                        ..receipt
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(tx_hash = %receipt.transaction_hash, error = %e, "Receipt poll failed");
                }
            }

            if tokio::time::Instant::now() + poll > deadline {
                tracing::info!(tx_hash = %receipt.transaction_hash, "Confirmation wait elapsed, transfer still pending");
                return Ok(receipt);
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn finish(
        &self,
        receipt: TransferReceipt,
        network: &NetworkDescriptor,
    ) -> WalletResult<TransferReceipt> {
        if self.rpc.await_confirmation {
            self.confirm(receipt, network).await
        } else {
            Ok(receipt)
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 对外转账入口
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 原生币转账
    pub async fn send_native(
        &self,
        signing_key: SigningKey,
        to_address: &str,
        amount: &str,
        network: &NetworkDescriptor,
    ) -> WalletResult<TransferReceipt> {
        let _guard = self.in_flight.acquire(signing_key.address())?;
        let built = self.prepare_native(signing_key.address(), to_address, amount, network)?;
        let receipt = self.submit(built, signing_key, network).await?;
        self.finish(receipt, network).await
    }

    /// ERC20 代币转账
    pub async fn send_token(
        &self,
        signing_key: SigningKey,
        token_symbol: &str,
        to_address: &str,
        amount: &str,
        network: &NetworkDescriptor,
    ) -> WalletResult<TransferReceipt> {
        let _guard = self.in_flight.acquire(signing_key.address())?;
        let built = self.prepare_token(
            signing_key.address(),
            token_symbol,
            to_address,
            amount,
            network,
        )?;
        let receipt = self.submit(built, signing_key, network).await?;
        self.finish(receipt, network).await
    }

    /// 按代币类型分派到原生币或代币转账
    pub async fn send(
        &self,
        signing_key: SigningKey,
        token_symbol: &str,
        to_address: &str,
        amount: &str,
        network: &NetworkDescriptor,
    ) -> WalletResult<TransferReceipt> {
        if self.is_native(token_symbol, network)? {
            self.send_native(signing_key, to_address, amount, network)
                .await
        } else {
            self.send_token(signing_key, token_symbol, to_address, amount, network)
                .await
        }
    }

    /// 执行一个完整的转账请求
    pub async fn execute(&self, request: TransferRequest) -> WalletResult<TransferReceipt> {
        tracing::debug!(request = %request.redact(), "Executing transfer request");
        let TransferRequest {
            signing_key,
            to_address,
            amount,
            network,
            token,
        } = request;
        self.send(signing_key, &token.symbol, &to_address, &amount, &network)
            .await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 余额查询
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn balance_of_native(
        &self,
        address: &str,
        network: &NetworkDescriptor,
    ) -> WalletResult<String> {
        self.check_network(network)?;
        let owner = Self::parse_recipient(address)?;
        let balance = self.provider(network)?.get_balance(owner).await?;
        Ok(format_amount(balance, network.native_decimals))
    }

    pub async fn balance_of_token(
        &self,
        address: &str,
        token_symbol: &str,
        network: &NetworkDescriptor,
    ) -> WalletResult<String> {
        self.check_network(network)?;
        let contract = self.registry.token_address(token_symbol, network.chain_id)?;
        let token = self.registry.token(token_symbol)?;
        let owner = Self::parse_recipient(address)?;
        let contract: Address = contract
            .parse()
            .map_err(|_| WalletError::Config(format!("malformed contract for {}", token.symbol)))?;

        let data = self
            .provider(network)?
            .call(&CallRequest {
                to: contract,
                data: Some(erc20_balance_of_data(owner)),
                ..Default::default()
            })
            .await?;

        if data.len() < 32 {
            return Err(WalletError::Rpc(format!(
                "balanceOf returned {} bytes",
                data.len()
            )));
        }
        let balance = U256::from_big_endian(&data[..32]);
        Ok(format_amount(balance, token.decimals))
    }
}
