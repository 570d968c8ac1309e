// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use std::time::Duration;

use alloy::primitives::{Address, U256};

/// Default JSON-RPC endpoint for the gated token's chain (Taraxa mainnet).
pub const DEFAULT_RPC_URL: &str = "https://rpc.mainnet.taraxa.io/";

/// Default gated ERC-20 contract.
pub const DEFAULT_TOKEN_CONTRACT: &str = "0x7944e09006504c062816d4EF083A5184c0929BB5";

/// Decimals assumed for the gated token unless configured otherwise.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Default upper bound for a single chain call.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime configuration of the single chain and token being gated on.
#[derive(Debug, Clone)]
pub struct TokenGateConfig {
    /// RPC endpoint URL
    pub rpc_url: String,
    /// ERC-20 contract holding the gated balance
    pub token_contract: Address,
    /// Token decimals used to scale the threshold
    pub decimals: u8,
    /// Minimum balance, in whole-token base units (already scaled)
    pub threshold: U256,
    /// Bound applied to every chain call
    pub rpc_timeout: Duration,
}

/// Parse a decimal token amount (`"10"`, `"2.5"`) into base units.
///
/// Rejects more fractional digits than the token has decimals, signs,
/// exponents and empty input.
pub fn parse_token_amount(amount: &str, decimals: u8) -> Result<U256, String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err("amount is empty".to_string());
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(format!("`{amount}` is not a number"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(format!("`{amount}` is not a plain decimal number"));
    }
    if fraction.len() > decimals as usize {
        return Err(format!(
            "`{amount}` has more than {decimals} fractional digits"
        ));
    }

    let padded = format!("{:0<width$}", fraction, width = decimals as usize);
    let digits = format!("{}{}", if whole.is_empty() { "0" } else { whole }, padded);
    U256::from_str_radix(&digits, 10).map_err(|e| format!("`{amount}` is out of range: {e}"))
}

/// Format a token balance with the specified decimals.
///
/// Fractional digits are truncated to six places; used for log output only.
pub fn format_token_balance(balance: U256, decimals: u8) -> String {
    if balance.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = balance / divisor;
    let remainder = balance % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, &trimmed[..trimmed.len().min(6)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_TOKEN: u64 = 1_000_000_000_000_000_000;

    #[test]
    fn parse_whole_amount() {
        assert_eq!(
            parse_token_amount("10", 18).unwrap(),
            U256::from(10u64) * U256::from(ONE_TOKEN)
        );
        assert_eq!(parse_token_amount("0", 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn parse_fractional_amount() {
        assert_eq!(
            parse_token_amount("2.5", 18).unwrap(),
            U256::from(2_500_000_000_000_000_000u64)
        );
        assert_eq!(parse_token_amount(".5", 1).unwrap(), U256::from(5u64));
        assert_eq!(parse_token_amount("1.25", 6).unwrap(), U256::from(1_250_000u64));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_token_amount("", 18).is_err());
        assert!(parse_token_amount(".", 18).is_err());
        assert!(parse_token_amount("-1", 18).is_err());
        assert!(parse_token_amount("1e18", 18).is_err());
        assert!(parse_token_amount("1.2345678", 6).is_err());
        assert!(parse_token_amount("ten", 18).is_err());
    }

    #[test]
    fn format_balance_truncates() {
        assert_eq!(format_token_balance(U256::from(ONE_TOKEN), 18), "1");
        assert_eq!(
            format_token_balance(U256::from(1_234_567_890_000_000_000u64), 18),
            "1.234567"
        );
        assert_eq!(format_token_balance(U256::ZERO, 18), "0");
        assert_eq!(format_token_balance(U256::from(1_000_000u64), 6), "1");
    }
}
