// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public error type of the SDK.
//!
//! Every public operation either returns its typed result or exactly one
//! [`SdkError`]. Nothing is retried internally. Capability material never
//! appears in an error message.

use crate::blockchain::LedgerError;
use crate::gateway::GatewayError;

/// Errors surfaced by SDK operations.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Bad local input. Raised before any gateway or ledger call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The supplied capability does not belong to the task being completed.
    #[error("Capability does not match this task")]
    AuthorizationMismatch,

    /// Signing or decryption authorization failed.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// The encryption gateway could not produce or open ciphertexts.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The ledger rejected or reverted the operation. The reason is the
    /// ledger's own, passed through verbatim.
    #[error("Contract call failed: {0}")]
    ContractCall(String),

    /// No published vault exists for the capability.
    #[error("No vault found for this capability")]
    NotFound,

    /// Any failure of a deposit after local validation.
    #[error("Deposit failed: {0}")]
    DepositFailed(#[source] Box<SdkError>),

    /// Connecting to the gateway or ledger failed.
    #[error("SDK initialization failed: {0}")]
    Initialization(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of an [`SdkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    Encryption,
    ContractCall,
    NotFound,
    Initialization,
    Config,
}

impl SdkError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption(message.into())
    }

    /// Kind of the error. A wrapped deposit failure reports its cause's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdkError::Validation(_) | SdkError::AuthorizationMismatch => ErrorKind::Validation,
            SdkError::Authorization(_) => ErrorKind::Authorization,
            SdkError::Encryption(_) => ErrorKind::Encryption,
            SdkError::ContractCall(_) => ErrorKind::ContractCall,
            SdkError::NotFound => ErrorKind::NotFound,
            SdkError::DepositFailed(cause) => cause.kind(),
            SdkError::Initialization(_) => ErrorKind::Initialization,
            SdkError::Config(_) => ErrorKind::Config,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            SdkError::Validation(_) => "validation_error",
            SdkError::AuthorizationMismatch => "authorization_mismatch",
            SdkError::Authorization(_) => "authorization_error",
            SdkError::Encryption(_) => "encryption_error",
            SdkError::ContractCall(_) => "contract_call_error",
            SdkError::NotFound => "not_found",
            SdkError::DepositFailed(_) => "deposit_failed",
            SdkError::Initialization(_) => "initialization_error",
            SdkError::Config(_) => "config_error",
        }
    }

    /// The cause of a wrapped deposit failure, or the error itself.
    pub fn root(&self) -> &SdkError {
        match self {
            SdkError::DepositFailed(cause) => cause.root(),
            other => other,
        }
    }
}

impl From<LedgerError> for SdkError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Reverted(reason) => SdkError::ContractCall(reason),
            LedgerError::InvalidAmount(message) => SdkError::Validation(message),
            other => SdkError::ContractCall(other.to_string()),
        }
    }
}

impl From<GatewayError> for SdkError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized(reason) => SdkError::Authorization(reason),
            other => SdkError::Encryption(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind_and_message() {
        let err = SdkError::validation("Amount must be greater than zero");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "Validation failed: Amount must be greater than zero"
        );

        assert_eq!(SdkError::authorization("bad key").kind(), ErrorKind::Authorization);
        assert_eq!(SdkError::encryption("gateway down").kind(), ErrorKind::Encryption);
        assert_eq!(SdkError::NotFound.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn setup_failures_have_their_own_kinds() {
        let err = SdkError::Initialization("devnet unavailable".to_string());
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert_eq!(err.error_code(), "initialization_error");
        assert_eq!(err.to_string(), "SDK initialization failed: devnet unavailable");

        let err = SdkError::Config("PT_CHAIN_ID is not a number".to_string());
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.error_code(), "config_error");
    }

    #[test]
    fn mismatch_is_a_validation_error() {
        let err = SdkError::AuthorizationMismatch;
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.error_code(), "authorization_mismatch");
    }

    #[test]
    fn deposit_failed_reports_cause_kind() {
        let err = SdkError::DepositFailed(Box::new(SdkError::encryption("proof rejected")));
        assert_eq!(err.kind(), ErrorKind::Encryption);
        assert_eq!(err.error_code(), "deposit_failed");
        assert!(matches!(err.root(), SdkError::Encryption(_)));
        assert_eq!(err.to_string(), "Deposit failed: Encryption failed: proof rejected");
    }

    #[test]
    fn ledger_revert_reason_is_passed_through_verbatim() {
        let err: SdkError = LedgerError::Reverted("vault drained".to_string()).into();
        match err {
            SdkError::ContractCall(reason) => assert_eq!(reason, "vault drained"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn gateway_denial_maps_to_authorization() {
        let err: SdkError = GatewayError::Unauthorized("request expired".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let err: SdkError = GatewayError::Request("connection refused".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Encryption);
    }
}
