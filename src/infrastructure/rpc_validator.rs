// RPC响应校验模块 - 防止链上数据污染

use anyhow::{Context, Result};
use ethers::types::{Address, U256};

fn strip_quantity(hex: &str) -> Result<&str> {
    let body = hex
        .strip_prefix("0x")
        .with_context(|| format!("Quantity missing 0x prefix: {hex}"))?;
    if body.is_empty() {
        anyhow::bail!("Empty quantity");
    }
    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Quantity contains non-hex characters");
    }
    Ok(body)
}

/// 验证 256 位数量（余额、gas price）
pub fn validate_u256(quantity_hex: &str) -> Result<U256> {
    let body = strip_quantity(quantity_hex)?;

    // 最多32字节 = 64个十六进制字符
    if body.len() > 64 {
        anyhow::bail!("Quantity hex string too long: {}", body.len());
    }

    U256::from_str_radix(body, 16).context("Failed to parse quantity from hex")
}

/// 验证 u64 数量（nonce、区块号、gasUsed）
pub fn validate_u64(quantity_hex: &str) -> Result<u64> {
    let body = strip_quantity(quantity_hex)?;

    if body.len() > 16 {
        anyhow::bail!("Quantity hex string too long: {}", body.len());
    }

    u64::from_str_radix(body, 16).context("Failed to parse u64 quantity from hex")
}

/// 验证RPC返回的gas值
pub fn validate_gas(gas_hex: &str) -> Result<u64> {
    let gas = validate_u64(gas_hex)?;

    // 最大gas limit：通常不超过30,000,000
    const MAX_REASONABLE_GAS: u64 = 30_000_000;
    if gas > MAX_REASONABLE_GAS {
        anyhow::bail!("Gas exceeds reasonable maximum: {}", gas);
    }

    Ok(gas)
}

/// 验证交易哈希格式
pub fn validate_tx_hash(tx_hash: &str) -> Result<String> {
    let hash = tx_hash.trim_start_matches("0x");

    // 32字节 = 64个十六进制字符
    if hash.len() != 64 {
        anyhow::bail!(
            "Invalid transaction hash length: expected 64, got {}",
            hash.len()
        );
    }
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid transaction hash format: contains non-hex characters");
    }

    Ok(format!("0x{}", hash.to_lowercase()))
}

/// 从 32 字节 ABI 返回值中取出地址（高 12 字节必须为 0）
pub fn validate_address_word(data: &[u8]) -> Result<Address> {
    if data.len() < 32 {
        anyhow::bail!("ABI word too short: {} bytes", data.len());
    }
    let word = &data[..32];
    if word[..12].iter().any(|b| *b != 0) {
        anyhow::bail!("ABI word is not a left-padded address");
    }
    Ok(Address::from_slice(&word[12..]))
}

/// 验证RPC响应格式
pub fn validate_rpc_response(json: &serde_json::Value) -> Result<()> {
    if let Some(version) = json.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            anyhow::bail!("Unsupported JSON-RPC version: {:?}", version);
        }
    }

    if json.get("result").is_none() {
        anyhow::bail!("Missing result field in RPC response");
    }

    Ok(())
}
