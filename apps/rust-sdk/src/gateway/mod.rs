// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encryption Gateway client interface.
//!
//! The gateway turns plaintext operation fields into opaque ciphertext
//! handles bound to a `(contract, sender)` pair, and decrypts handles for a
//! caller who presents a capability-signed decryption request.
//!
//! - `http` - JSON client for a gateway sidecar
//! - `local` - in-process gateway used by the devnet

pub mod http;
pub mod local;

use std::collections::HashMap;
use std::fmt;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use crate::capability::SignedDecryptionRequest;

pub use http::HttpGateway;
pub use local::LocalGateway;

/// Opaque reference to an encrypted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub B256);

impl Handle {
    pub const ZERO: Handle = Handle(B256::ZERO);

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<B256> for Handle {
    fn from(value: B256) -> Self {
        Handle(value)
    }
}

/// A cleartext value going into, or coming out of, the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plaintext {
    Uint(U256),
    Address(Address),
    Bool(bool),
}

impl Plaintext {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Plaintext::Uint(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Plaintext::Address(value) => Some(*value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Plaintext::Uint(_) => "uint256",
            Plaintext::Address(_) => "address",
            Plaintext::Bool(_) => "bool",
        }
    }
}

/// Builder for an encrypted input bound to a contract and a sender.
///
/// Values are kept in insertion order; the gateway returns one handle per
/// value in the same order.
#[derive(Clone)]
pub struct EncryptedInput {
    contract: Address,
    sender: Address,
    values: Vec<Plaintext>,
}

impl EncryptedInput {
    pub fn new(contract: Address, sender: Address) -> Self {
        Self {
            contract,
            sender,
            values: Vec::new(),
        }
    }

    pub fn add_u256(mut self, value: U256) -> Self {
        self.values.push(Plaintext::Uint(value));
        self
    }

    pub fn add_address(mut self, value: Address) -> Self {
        self.values.push(Plaintext::Address(value));
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn values(&self) -> &[Plaintext] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// Inputs carry capability identifiers, so only the shape is printed.
impl fmt::Debug for EncryptedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = self.values.iter().map(Plaintext::type_name).collect();
        f.debug_struct("EncryptedInput")
            .field("contract", &self.contract)
            .field("sender", &self.sender)
            .field("types", &types)
            .finish()
    }
}

/// Handles and input proof produced by [`EncryptionGateway::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub handles: Vec<Handle>,
    pub input_proof: Bytes,
}

impl EncryptedPayload {
    /// The handles as a fixed-size array, failing when the gateway returned
    /// a different number of handles than were requested.
    pub fn handle_array<const N: usize>(&self) -> Result<[Handle; N], GatewayError> {
        <[Handle; N]>::try_from(self.handles.as_slice()).map_err(|_| {
            GatewayError::InvalidResponse(format!(
                "expected {} handles, gateway returned {}",
                N,
                self.handles.len()
            ))
        })
    }
}

/// Errors reported by an encryption gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Request(String),

    #[error("Gateway response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Encrypted input rejected: {0}")]
    InvalidInput(String),

    #[error("Decryption denied: {0}")]
    Unauthorized(String),

    #[error("Unknown ciphertext handle: {0}")]
    UnknownHandle(Handle),
}

/// The confidential-compute gateway consumed by the SDK.
#[async_trait]
pub trait EncryptionGateway: Send + Sync {
    /// Encrypt the input's values, returning one handle per value plus a
    /// proof binding them to the input's contract and sender.
    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedPayload, GatewayError>;

    /// Decrypt the handles named in a signed request.
    async fn decrypt(
        &self,
        request: &SignedDecryptionRequest,
    ) -> Result<HashMap<Handle, Plaintext>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_insertion_order() {
        let input = EncryptedInput::new(Address::repeat_byte(1), Address::repeat_byte(2))
            .add_u256(U256::from(7u64))
            .add_address(Address::repeat_byte(3));

        assert_eq!(input.len(), 2);
        assert_eq!(input.values()[0], Plaintext::Uint(U256::from(7u64)));
        assert_eq!(input.values()[1], Plaintext::Address(Address::repeat_byte(3)));
    }

    #[test]
    fn debug_output_hides_values() {
        let secret_value = U256::from(0xdead_beef_u64);
        let input = EncryptedInput::new(Address::ZERO, Address::ZERO).add_u256(secret_value);
        let printed = format!("{input:?}");
        assert!(printed.contains("uint256"));
        assert!(!printed.contains(&secret_value.to_string()));
        assert!(!printed.to_lowercase().contains("deadbeef"));
    }

    #[test]
    fn handle_array_checks_count() {
        let payload = EncryptedPayload {
            handles: vec![Handle(B256::repeat_byte(1)), Handle(B256::repeat_byte(2))],
            input_proof: Bytes::new(),
        };
        let pair: [Handle; 2] = payload.handle_array().unwrap();
        assert_eq!(pair[1], Handle(B256::repeat_byte(2)));
        assert!(payload.handle_array::<4>().is_err());
    }
}
