// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names and default values. Configuration is read once
//! when the SDK or CLI starts.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PT_CONTRACT_ADDRESS` | PrivateTransfer contract address | Sepolia deployment |
//! | `PT_RPC_URL` | Ledger JSON-RPC endpoint | `https://1rpc.io/sepolia` |
//! | `PT_CHAIN_ID` | Ledger chain id | `11155111` |
//! | `PT_GATEWAY_URL` | Encryption gateway base URL | `http://127.0.0.1:8787` |
//! | `PT_DECRYPTION_VALIDITY_DAYS` | Validity window of decryption requests | `10` |
//! | `PT_SIGNER_KEY` | Submitter private key (hex) | Required unless a key path is set |
//! | `PT_SIGNER_KEY_PATH` | Submitter private key file (PEM) | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::str::FromStr;

use alloy::primitives::Address;

use crate::blockchain::{NetworkConfig, SEPOLIA};
use crate::error::SdkError;

/// Environment variable for the contract address.
pub const ENV_CONTRACT_ADDRESS: &str = "PT_CONTRACT_ADDRESS";

/// Environment variable for the ledger RPC endpoint.
pub const ENV_RPC_URL: &str = "PT_RPC_URL";

/// Environment variable for the ledger chain id.
pub const ENV_CHAIN_ID: &str = "PT_CHAIN_ID";

/// Environment variable for the encryption gateway base URL.
pub const ENV_GATEWAY_URL: &str = "PT_GATEWAY_URL";

/// Environment variable for the decryption request validity window.
pub const ENV_DECRYPTION_VALIDITY_DAYS: &str = "PT_DECRYPTION_VALIDITY_DAYS";

/// Environment variable holding the submitter key as hex.
///
/// Never logged. Prefer `PT_SIGNER_KEY_PATH` outside development.
pub const ENV_SIGNER_KEY: &str = "PT_SIGNER_KEY";

/// Environment variable pointing at a PEM file with the submitter key.
pub const ENV_SIGNER_KEY_PATH: &str = "PT_SIGNER_KEY_PATH";

/// Environment variable selecting the log format.
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// PrivateTransfer deployment on Ethereum Sepolia.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x8ea2dDD9DD550d500B4cef4C560fE27cde37508D";

/// Default encryption gateway sidecar.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8787";

/// Default validity of a signed decryption request.
pub const DEFAULT_DECRYPTION_VALIDITY_DAYS: u64 = 10;

/// Default `RUST_LOG` filter.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Connection settings of the SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkConfig {
    pub contract_address: Address,
    pub rpc_url: String,
    pub gateway_url: String,
    pub chain_id: u64,
    pub decryption_validity_days: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self::sepolia()
    }
}

impl SdkConfig {
    /// Settings of the public Sepolia deployment.
    pub fn sepolia() -> Self {
        Self::for_network(&SEPOLIA, parse_default_contract())
    }

    /// Settings for a network and contract, with default gateway settings.
    pub fn for_network(network: &NetworkConfig, contract_address: Address) -> Self {
        Self {
            contract_address,
            rpc_url: network.rpc_url.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            chain_id: network.chain_id,
            decryption_validity_days: DEFAULT_DECRYPTION_VALIDITY_DAYS,
        }
    }

    /// Load from the process environment, falling back to Sepolia defaults.
    pub fn from_env() -> Result<Self, SdkError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SdkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::sepolia();

        let contract_address = match read(ENV_CONTRACT_ADDRESS) {
            Some(raw) => Address::from_str(&raw).map_err(|e| {
                SdkError::Config(format!("{ENV_CONTRACT_ADDRESS} is not an address: {e}"))
            })?,
            None => defaults.contract_address,
        };

        let config = Self {
            contract_address,
            rpc_url: read(ENV_RPC_URL).unwrap_or(defaults.rpc_url),
            gateway_url: read(ENV_GATEWAY_URL).unwrap_or(defaults.gateway_url),
            chain_id: parse_number(ENV_CHAIN_ID, read(ENV_CHAIN_ID))?.unwrap_or(defaults.chain_id),
            decryption_validity_days: parse_number(
                ENV_DECRYPTION_VALIDITY_DAYS,
                read(ENV_DECRYPTION_VALIDITY_DAYS),
            )?
            .unwrap_or(defaults.decryption_validity_days),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check URLs and numeric ranges.
    pub fn validate(&self) -> Result<(), SdkError> {
        url::Url::parse(&self.rpc_url)
            .map_err(|e| SdkError::Config(format!("{ENV_RPC_URL} is not a URL: {e}")))?;
        url::Url::parse(&self.gateway_url)
            .map_err(|e| SdkError::Config(format!("{ENV_GATEWAY_URL} is not a URL: {e}")))?;
        if self.decryption_validity_days == 0 {
            return Err(SdkError::Config(format!(
                "{ENV_DECRYPTION_VALIDITY_DAYS} must be at least 1"
            )));
        }
        Ok(())
    }
}

fn parse_default_contract() -> Address {
    Address::from_str(DEFAULT_CONTRACT_ADDRESS).unwrap_or(Address::ZERO)
}

fn parse_number(name: &str, raw: Option<String>) -> Result<Option<u64>, SdkError> {
    raw.map(|value| {
        value
            .parse::<u64>()
            .map_err(|_| SdkError::Config(format!("{name} must be a non-negative integer")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&'static str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, String> =
            vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_point_at_sepolia_deployment() {
        let config = SdkConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, SdkConfig::sepolia());
        assert_eq!(config.chain_id, 11155111);
        assert_eq!(config.rpc_url, "https://1rpc.io/sepolia");
        assert_eq!(
            config.contract_address.to_string().to_lowercase(),
            DEFAULT_CONTRACT_ADDRESS.to_lowercase()
        );
    }

    #[test]
    fn overrides_are_applied() {
        let config = SdkConfig::from_lookup(lookup_from(&[
            (ENV_CONTRACT_ADDRESS, "0x0000000000000000000000000000000000000abc"),
            (ENV_RPC_URL, "http://127.0.0.1:8545"),
            (ENV_CHAIN_ID, "31337"),
            (ENV_DECRYPTION_VALIDITY_DAYS, " 3 "),
            (ENV_GATEWAY_URL, "   "),
        ]))
        .unwrap();

        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.decryption_validity_days, 3);
        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.gateway_url, DEFAULT_GATEWAY_URL);
        assert_eq!(
            config.contract_address,
            Address::from_str("0x0000000000000000000000000000000000000abc").unwrap()
        );
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for vars in [
            vec![(ENV_CONTRACT_ADDRESS, "nope")],
            vec![(ENV_CHAIN_ID, "-1")],
            vec![(ENV_RPC_URL, "not a url")],
            vec![(ENV_DECRYPTION_VALIDITY_DAYS, "0")],
        ] {
            let err = SdkConfig::from_lookup(lookup_from(&vars)).unwrap_err();
            assert!(matches!(err, SdkError::Config(_)), "{vars:?}");
        }
    }
}
