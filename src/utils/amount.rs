//! 金额解析与格式化
//!
//! 十进制字符串 <-> 最小单位整数，任意精度，不经过浮点。

use ethers::types::U256;

use crate::error::{WalletError, WalletResult};

/// 将十进制金额按精度放大为最小单位
///
/// 拒绝：空串、符号、指数、多个小数点、超出精度的小数位、零、溢出。
pub fn parse_amount(amount: &str, decimals: u8) -> WalletResult<U256> {
    let invalid = |why: &str| WalletError::InvalidAmount(format!("{amount:?}: {why}"));

    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid("no digits"));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid("not a positive decimal number"));
    }
    if frac_part.len() > decimals as usize {
        return Err(invalid("too many decimal places"));
    }

    let digits = format!(
        "{}{}{}",
        int_part,
        frac_part,
        "0".repeat(decimals as usize - frac_part.len())
    );
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Err(invalid("must be greater than zero"));
    }

    U256::from_dec_str(digits).map_err(|_| invalid("out of range"))
}

/// 将最小单位格式化为十进制字符串，去掉小数末尾的 0
pub fn format_amount(value: U256, decimals: u8) -> String {
    let raw = value.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return raw;
    }

    let padded = if raw.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - raw.len() + 1), raw)
    } else {
        raw
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_amounts() {
        assert_eq!(
            parse_amount("1", 18).unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        assert_eq!(parse_amount("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(parse_amount(".25", 6).unwrap(), U256::from(250_000u64));
        assert_eq!(parse_amount(" 0.000001 ", 6).unwrap(), U256::from(1u64));
        assert_eq!(parse_amount("10.", 2).unwrap(), U256::from(1000u64));
    }

    #[test]
    fn test_parse_rejects_invalid_amounts() {
        for bad in ["", "0", "0.000", "-1", "+1", "1e18", "1.2.3", "abc", ".", " "] {
            assert!(
                matches!(parse_amount(bad, 18), Err(WalletError::InvalidAmount(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(parse_amount("0.0000001", 6).is_err());
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let huge = "9".repeat(80);
        assert!(parse_amount(&huge, 18).is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_amount(U256::zero(), 18), "0");
        assert_eq!(format_amount(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_amount(U256::from(42u64), 0), "42");
        assert_eq!(
            format_amount(U256::from(2_000_000_000_000_000_000u64), 18),
            "2"
        );
    }
}
