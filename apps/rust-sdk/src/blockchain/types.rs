// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger types and constants.

use alloy::primitives::{TxHash, U256};

use super::ledger::LedgerError;

/// Network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL (empty when the network has none)
    pub explorer_url: &'static str,
}

impl NetworkConfig {
    /// Explorer link for a transaction, if the network has an explorer.
    pub fn tx_url(&self, tx_hash: &TxHash) -> Option<String> {
        if self.explorer_url.is_empty() {
            None
        } else {
            Some(format!("{}/tx/{}", self.explorer_url, tx_hash))
        }
    }
}

/// Ethereum Sepolia, where the PrivateTransfer contract is deployed.
pub const SEPOLIA: NetworkConfig = NetworkConfig {
    name: "Ethereum Sepolia",
    chain_id: 11155111,
    rpc_url: "https://1rpc.io/sepolia",
    explorer_url: "https://sepolia.etherscan.io",
};

/// In-process development network.
pub const DEVNET: NetworkConfig = NetworkConfig {
    name: "Local Devnet",
    chain_id: 31337,
    rpc_url: "http://127.0.0.1:8545",
    explorer_url: "",
};

/// Decimals of the native unit.
pub const NATIVE_DECIMALS: u8 = 18;

/// Symbol of the native unit.
pub const NATIVE_SYMBOL: &str = "ETH";

/// Handle returned by the ledger once a transaction has been submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTx {
    pub tx_hash: TxHash,
}

/// Transaction receipt after confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block number where transaction was included
    pub block_number: u64,
    /// Gas actually used
    pub gas_used: u64,
    /// Whether the transaction was successful
    pub success: bool,
}

/// Parse a human-readable amount to wei.
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "0.5")
/// * `decimals` - Number of decimals (18 for the native unit)
///
/// Negative numbers, empty strings and excess precision are rejected.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, LedgerError> {
    let parts: Vec<&str> = amount.split('.').collect();

    if parts.len() > 2 {
        return Err(LedgerError::InvalidAmount(
            "Invalid amount format".to_string(),
        ));
    }

    if parts[0].is_empty() && parts.get(1).map_or(true, |p| p.is_empty()) {
        return Err(LedgerError::InvalidAmount("Amount is empty".to_string()));
    }

    let whole = if parts[0].is_empty() {
        0u128
    } else {
        if !parts[0].chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::InvalidAmount(
                "Invalid whole number".to_string(),
            ));
        }
        parts[0]
            .parse::<u128>()
            .map_err(|_| LedgerError::InvalidAmount("Invalid whole number".to_string()))?
    };

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if dec_str.len() > decimals as usize {
            return Err(LedgerError::InvalidAmount(format!(
                "Too many decimal places (max {})",
                decimals
            )));
        }
        if !dec_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::InvalidAmount("Invalid decimal".to_string()));
        }
        // Pad with zeros to match decimals
        let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
        padded
            .parse::<u128>()
            .map_err(|_| LedgerError::InvalidAmount("Invalid decimal".to_string()))?
    } else {
        0u128
    };

    let multiplier = 10u128.pow(decimals as u32);
    let total = whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or_else(|| LedgerError::InvalidAmount("Amount overflow".to_string()))?;

    Ok(U256::from(total))
}

/// Format wei to a human-readable amount.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

/// Format wei in the native unit.
pub fn format_native(amount: U256) -> String {
    format_amount(amount, NATIVE_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_whole() {
        let result = parse_amount("1", 18).unwrap();
        assert_eq!(result, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_amount_decimal() {
        let result = parse_amount("0.5", 18).unwrap();
        assert_eq!(result, U256::from(500_000_000_000_000_000u64));

        let result = parse_amount(".2", 18).unwrap();
        assert_eq!(result, U256::from(200_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_amount_rejects_negative_and_garbage() {
        assert!(parse_amount("-1", 18).is_err());
        assert!(parse_amount("-0.5", 18).is_err());
        assert!(parse_amount("", 18).is_err());
        assert!(parse_amount(".", 18).is_err());
        assert!(parse_amount("1.2.3", 18).is_err());
        assert!(parse_amount("abc", 18).is_err());
        assert!(parse_amount("+1", 18).is_err());
    }

    #[test]
    fn test_parse_amount_precision_limit() {
        assert!(parse_amount("0.000000000000000001", 18).is_ok());
        assert!(parse_amount("0.0000000000000000001", 18).is_err());
    }

    #[test]
    fn test_parse_amount_zero_is_not_an_error() {
        // Positivity is a caller-level rule, not a parsing rule.
        assert_eq!(parse_amount("0", 18).unwrap(), U256::ZERO);
        assert_eq!(parse_amount("0.0", 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_format_amount() {
        let one = U256::from(1_000_000_000_000_000_000u64);
        assert_eq!(format_amount(one, 18), "1");

        let three_tenths = U256::from(300_000_000_000_000_000u64);
        assert_eq!(format_native(three_tenths), "0.3");

        assert_eq!(format_amount(U256::ZERO, 18), "0");
        assert_eq!(format_amount(U256::from(1u64), 18), "0.000000000000000001");
    }

    #[test]
    fn explorer_links() {
        let hash = TxHash::repeat_byte(0xab);
        assert!(SEPOLIA
            .tx_url(&hash)
            .unwrap()
            .starts_with("https://sepolia.etherscan.io/tx/0xabab"));
        assert!(DEVNET.tx_url(&hash).is_none());
    }
}
