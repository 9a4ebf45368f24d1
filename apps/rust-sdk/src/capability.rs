// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password capabilities and decryption authorization.
//!
//! A capability is a random secp256k1 keypair. Its private key is the
//! password: the only proof needed to read or claim a vault. The vault key
//! on the ledger is the capability identifier, `keccak256(private key)` read
//! as a big-endian 256-bit integer.
//!
//! Reading encrypted vault fields requires an EIP-712 signature by the
//! capability over the handles being decrypted. The private key itself is
//! never sent anywhere and is redacted from `Debug` output.

use std::fmt;
use std::str::FromStr;

use alloy::{
    primitives::{keccak256, Address, Bytes, Signature, B256, U256},
    signers::{local::PrivateKeySigner, SignerSync},
    sol,
    sol_types::{eip712_domain, SolStruct},
};
use chrono::Utc;

use crate::error::SdkError;
use crate::gateway::Handle;

/// EIP-712 domain name for decryption requests.
pub const DECRYPTION_DOMAIN_NAME: &str = "PrivateTransferDecryption";

/// EIP-712 domain version for decryption requests.
pub const DECRYPTION_DOMAIN_VERSION: &str = "1";

/// Seconds in one day of request validity.
const SECONDS_PER_DAY: u64 = 86_400;

sol! {
    /// Typed payload signed by a capability to authorize decryption.
    struct DecryptionAuthorization {
        bytes32[] handles;
        address contractAddress;
        uint256 startTimestamp;
        uint256 durationDays;
        bytes publicKey;
    }
}

// =============================================================================
// Identifier
// =============================================================================

/// Public-facing vault key derived from a capability.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityId(U256);

impl CapabilityId {
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn into_u256(self) -> U256 {
        self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", B256::from(self.0.to_be_bytes::<32>()))
    }
}

impl fmt::Debug for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityId({self})")
    }
}

impl FromStr for CapabilityId {
    type Err = SdkError;

    /// Accepts `0x`-prefixed hex or a decimal integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str(s.trim())
            .map(CapabilityId)
            .map_err(|_| SdkError::validation("Capability identifier is not a 256-bit integer"))
    }
}

// =============================================================================
// Secret
// =============================================================================

/// Private material of a capability.
#[derive(Clone)]
pub struct CapabilitySecret {
    signer: PrivateKeySigner,
}

impl CapabilitySecret {
    /// Draw a fresh random capability key.
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Parse a hex-encoded private key (with or without `0x`).
    ///
    /// Malformed material fails with an authorization error whose message
    /// never echoes the input.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, SdkError> {
        let key_bytes = alloy::hex::decode(private_key_hex.trim())
            .map_err(|_| SdkError::authorization("Capability private key is not valid hex"))?;

        if key_bytes.len() != 32 {
            return Err(SdkError::authorization(
                "Capability private key must be 32 bytes",
            ));
        }

        let signer = PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|_| SdkError::authorization("Capability private key is not a valid scalar"))?;

        Ok(Self { signer })
    }

    /// Address of the capability keypair.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Vault identifier derived from this capability.
    pub fn identifier(&self) -> CapabilityId {
        derive_identifier(self)
    }

    /// Compressed SEC1 public key of the capability.
    pub fn public_key(&self) -> Bytes {
        let point = self.signer.credential().verifying_key().to_encoded_point(true);
        Bytes::copy_from_slice(point.as_bytes())
    }

    /// Hex form of the private key, `0x`-prefixed. The caller is responsible
    /// for persisting it; the SDK never stores it.
    pub fn expose_hex(&self) -> String {
        alloy::hex::encode_prefixed(self.signer.to_bytes())
    }

    fn key_bytes(&self) -> B256 {
        self.signer.to_bytes()
    }
}

impl fmt::Debug for CapabilitySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySecret")
            .field("address", &self.address())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// A freshly generated capability.
#[derive(Debug, Clone)]
pub struct GeneratedCapability {
    /// Private material, surfaced to the depositor once
    pub secret: CapabilitySecret,
    /// Address of the capability keypair
    pub address: Address,
    /// Vault identifier
    pub identifier: CapabilityId,
}

/// Generate a new random capability.
pub fn generate_capability() -> GeneratedCapability {
    let secret = CapabilitySecret::random();
    GeneratedCapability {
        address: secret.address(),
        identifier: secret.identifier(),
        secret,
    }
}

/// Derive the vault identifier of a capability.
pub fn derive_identifier(secret: &CapabilitySecret) -> CapabilityId {
    let digest = keccak256(secret.key_bytes());
    CapabilityId(U256::from_be_bytes(digest.0))
}

// =============================================================================
// Decryption requests
// =============================================================================

/// Decryption authorization payload before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionRequest {
    /// Handles the requester wants decrypted
    pub handles: Vec<Handle>,
    /// Contract the handles belong to
    pub contract_address: Address,
    /// Chain of the contract (EIP-712 domain)
    pub chain_id: u64,
    /// Unix timestamp from which the request is valid
    pub start_timestamp: u64,
    /// Validity window in days
    pub duration_days: u64,
    /// Requester public key, filled in when signing
    pub public_key: Bytes,
}

impl DecryptionRequest {
    /// Request valid from now for `duration_days`.
    pub fn new(
        handles: Vec<Handle>,
        contract_address: Address,
        chain_id: u64,
        duration_days: u64,
    ) -> Self {
        Self {
            handles,
            contract_address,
            chain_id,
            start_timestamp: Utc::now().timestamp().max(0) as u64,
            duration_days,
            public_key: Bytes::new(),
        }
    }

    /// Unix timestamp at which the request stops being valid.
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    /// EIP-712 signing hash of the request.
    pub fn signing_hash(&self) -> B256 {
        let domain = eip712_domain! {
            name: DECRYPTION_DOMAIN_NAME,
            version: DECRYPTION_DOMAIN_VERSION,
            chain_id: self.chain_id,
            verifying_contract: self.contract_address,
        };
        self.typed().eip712_signing_hash(&domain)
    }

    fn typed(&self) -> DecryptionAuthorization {
        DecryptionAuthorization {
            handles: self.handles.iter().map(|h| h.0).collect(),
            contractAddress: self.contract_address,
            startTimestamp: U256::from(self.start_timestamp),
            durationDays: U256::from(self.duration_days),
            publicKey: self.public_key.clone(),
        }
    }
}

/// A decryption request signed by a capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDecryptionRequest {
    pub request: DecryptionRequest,
    pub signature: Signature,
    /// Address of the signing capability
    pub signer: Address,
}

/// Why a signed decryption request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestRejection {
    #[error("signature does not recover to the requesting capability")]
    BadSignature,

    #[error("public key does not belong to the signer")]
    KeyMismatch,

    #[error("decryption request is not yet valid")]
    NotYetValid,

    #[error("decryption request has expired")]
    Expired,
}

impl SignedDecryptionRequest {
    /// Check the signature, the embedded public key and the validity window
    /// at `now` (unix seconds). Returns the authorized capability address.
    pub fn verify(&self, now: u64) -> Result<Address, RequestRejection> {
        let hash = self.request.signing_hash();
        let recovered = self
            .signature
            .recover_address_from_prehash(&hash)
            .map_err(|_| RequestRejection::BadSignature)?;
        if recovered != self.signer {
            return Err(RequestRejection::BadSignature);
        }

        let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.request.public_key)
            .map_err(|_| RequestRejection::KeyMismatch)?;
        if alloy::signers::utils::public_key_to_address(&key) != self.signer {
            return Err(RequestRejection::KeyMismatch);
        }

        if now < self.request.start_timestamp {
            return Err(RequestRejection::NotYetValid);
        }
        if now > self.request.expires_at() {
            return Err(RequestRejection::Expired);
        }

        Ok(self.signer)
    }
}

/// Sign a decryption request with a capability's private key.
pub fn sign_decryption_request(
    secret: &CapabilitySecret,
    mut request: DecryptionRequest,
) -> Result<SignedDecryptionRequest, SdkError> {
    request.public_key = secret.public_key();
    let hash = request.signing_hash();
    let signature = secret
        .signer
        .sign_hash_sync(&hash)
        .map_err(|e| SdkError::authorization(format!("Failed to sign decryption request: {e}")))?;

    Ok(SignedDecryptionRequest {
        request,
        signature,
        signer: secret.address(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn sample_request() -> DecryptionRequest {
        DecryptionRequest {
            handles: vec![Handle(B256::repeat_byte(0x01)), Handle(B256::repeat_byte(0x02))],
            contract_address: Address::repeat_byte(0xcc),
            chain_id: 31337,
            start_timestamp: 1_700_000_000,
            duration_days: 1,
            public_key: Bytes::new(),
        }
    }

    #[test]
    fn generated_capabilities_are_distinct() {
        let a = generate_capability();
        let b = generate_capability();
        assert_ne!(a.identifier, b.identifier);
        assert_ne!(a.address, b.address);
        assert_eq!(a.identifier, a.secret.identifier());
        assert_eq!(a.address, a.secret.address());
    }

    #[test]
    fn identifier_is_deterministic() {
        let first = CapabilitySecret::from_hex(TEST_KEY).unwrap();
        let second = CapabilitySecret::from_hex(TEST_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(derive_identifier(&first), derive_identifier(&second));

        let expected = U256::from_be_bytes(keccak256(first.key_bytes()).0);
        assert_eq!(first.identifier().into_u256(), expected);
    }

    #[test]
    fn hex_round_trip() {
        let secret = CapabilitySecret::from_hex(TEST_KEY).unwrap();
        assert_eq!(secret.expose_hex(), TEST_KEY);
    }

    #[test]
    fn malformed_keys_are_authorization_errors() {
        for bad in ["", "0x1234", "not-hex", &"00".repeat(32)] {
            let err = CapabilitySecret::from_hex(bad).unwrap_err();
            assert!(matches!(err, SdkError::Authorization(_)), "{bad}: {err:?}");
            assert!(!err.to_string().contains("not-hex"));
        }
    }

    #[test]
    fn debug_redacts_private_key() {
        let secret = CapabilitySecret::from_hex(TEST_KEY).unwrap();
        let printed = format!("{secret:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains(TEST_KEY.trim_start_matches("0x")));
    }

    #[test]
    fn identifier_parses_hex_and_decimal() {
        let id: CapabilityId = "0x10".parse().unwrap();
        assert_eq!(id.into_u256(), U256::from(16u64));
        let id: CapabilityId = "16".parse().unwrap();
        assert_eq!(id.into_u256(), U256::from(16u64));
        assert!("0xzz".parse::<CapabilityId>().is_err());

        let secret = CapabilitySecret::from_hex(TEST_KEY).unwrap();
        let shown = secret.identifier().to_string();
        assert_eq!(shown.len(), 66);
        assert_eq!(shown.parse::<CapabilityId>().unwrap(), secret.identifier());
    }

    #[test]
    fn signed_request_verifies() {
        let secret = CapabilitySecret::from_hex(TEST_KEY).unwrap();
        let signed = sign_decryption_request(&secret, sample_request()).unwrap();

        assert_eq!(signed.signer, secret.address());
        assert_eq!(signed.request.public_key, secret.public_key());
        assert_eq!(signed.verify(1_700_000_100), Ok(secret.address()));
    }

    #[test]
    fn tampered_request_is_rejected() {
        let secret = CapabilitySecret::from_hex(TEST_KEY).unwrap();
        let mut signed = sign_decryption_request(&secret, sample_request()).unwrap();
        signed.request.handles.push(Handle(B256::repeat_byte(0x03)));
        assert_eq!(signed.verify(1_700_000_100), Err(RequestRejection::BadSignature));
    }

    #[test]
    fn foreign_signer_is_rejected() {
        let secret = CapabilitySecret::from_hex(TEST_KEY).unwrap();
        let mut signed = sign_decryption_request(&secret, sample_request()).unwrap();
        signed.signer = CapabilitySecret::random().address();
        assert_eq!(signed.verify(1_700_000_100), Err(RequestRejection::BadSignature));
    }

    #[test]
    fn validity_window_is_enforced() {
        let secret = CapabilitySecret::from_hex(TEST_KEY).unwrap();
        let signed = sign_decryption_request(&secret, sample_request()).unwrap();

        assert_eq!(signed.verify(1_699_999_999), Err(RequestRejection::NotYetValid));
        let expiry = signed.request.expires_at();
        assert_eq!(expiry, 1_700_000_000 + 86_400);
        assert!(signed.verify(expiry).is_ok());
        assert_eq!(signed.verify(expiry + 1), Err(RequestRejection::Expired));
    }
}
