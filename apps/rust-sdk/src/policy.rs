// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer policies: who may withdraw from a vault.
//!
//! On the wire a policy is a numeric transfer type plus a target address,
//! with the zero address meaning "no recipient restriction". In the SDK the
//! restriction is a variant of [`TransferPolicy`] so the sentinel can never
//! be mistaken for a real account.

use std::fmt;

use alloy::primitives::{Address, U256};

use crate::error::SdkError;

/// Wire-level transfer type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransferType {
    /// Only the recorded recipient may withdraw.
    SpecifiedRecipient = 1,
    /// Anyone holding the capability may withdraw.
    AnyoneWithPassword = 2,
    /// A trustee completes the withdrawal to the recorded recipient.
    EntrustedWithdrawal = 3,
}

impl TransferType {
    pub const ALL: [TransferType; 3] = [
        TransferType::SpecifiedRecipient,
        TransferType::AnyoneWithPassword,
        TransferType::EntrustedWithdrawal,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(TransferType::SpecifiedRecipient),
            2 => Some(TransferType::AnyoneWithPassword),
            3 => Some(TransferType::EntrustedWithdrawal),
            _ => None,
        }
    }

    pub fn requires_recipient(self) -> bool {
        !matches!(self, TransferType::AnyoneWithPassword)
    }

    pub fn label(self) -> &'static str {
        match self {
            TransferType::SpecifiedRecipient => "specified-recipient",
            TransferType::AnyoneWithPassword => "anyone-with-password",
            TransferType::EntrustedWithdrawal => "entrusted-withdrawal",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TransferType {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let by_code = s.parse::<u64>().ok().and_then(TransferType::from_code);
        by_code
            .or_else(|| TransferType::ALL.into_iter().find(|t| t.label() == s))
            .ok_or_else(|| SdkError::validation(format!("Unknown transfer type: {s}")))
    }
}

/// Access policy of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPolicy {
    /// Anyone with the capability may withdraw.
    Open,
    /// Only this recipient may withdraw.
    Restricted(Address),
    /// Trustees complete withdrawals paying out to this recipient.
    Entrusted(Address),
}

/// A withdrawal refused by a vault's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("unauthorized caller")]
    UnauthorizedCaller,

    #[error("entrusted vaults are withdrawn through entrustWithdraw")]
    EntrustedOnly,

    #[error("vault is not an entrusted withdrawal")]
    NotEntrusted,
}

impl TransferPolicy {
    /// Build the policy for a deposit.
    ///
    /// Recipients are required, and must be non-zero, for specified-recipient
    /// and entrusted-withdrawal. A recipient passed with the open policy is
    /// ignored.
    pub fn resolve(
        transfer_type: TransferType,
        recipient: Option<Address>,
    ) -> Result<Self, SdkError> {
        if transfer_type == TransferType::AnyoneWithPassword {
            return Ok(TransferPolicy::Open);
        }

        let recipient = recipient.ok_or_else(|| {
            SdkError::validation(format!("Recipient address is required for {transfer_type}"))
        })?;
        if recipient.is_zero() {
            return Err(SdkError::validation(
                "Recipient address must not be the zero address",
            ));
        }

        Ok(match transfer_type {
            TransferType::SpecifiedRecipient => TransferPolicy::Restricted(recipient),
            _ => TransferPolicy::Entrusted(recipient),
        })
    }

    /// Rebuild a policy from its wire form.
    pub fn from_wire(transfer_type: U256, target: Address) -> Option<Self> {
        let code = u64::try_from(transfer_type).ok()?;
        match TransferType::from_code(code)? {
            TransferType::AnyoneWithPassword => Some(TransferPolicy::Open),
            TransferType::SpecifiedRecipient if !target.is_zero() => {
                Some(TransferPolicy::Restricted(target))
            }
            TransferType::EntrustedWithdrawal if !target.is_zero() => {
                Some(TransferPolicy::Entrusted(target))
            }
            _ => None,
        }
    }

    pub fn transfer_type(&self) -> TransferType {
        match self {
            TransferPolicy::Open => TransferType::AnyoneWithPassword,
            TransferPolicy::Restricted(_) => TransferType::SpecifiedRecipient,
            TransferPolicy::Entrusted(_) => TransferType::EntrustedWithdrawal,
        }
    }

    /// Target address on the wire; zero for the open policy.
    pub fn target_address(&self) -> Address {
        match self {
            TransferPolicy::Open => Address::ZERO,
            TransferPolicy::Restricted(recipient) | TransferPolicy::Entrusted(recipient) => {
                *recipient
            }
        }
    }

    /// The recorded recipient, if the policy has one.
    pub fn recipient(&self) -> Option<Address> {
        match self {
            TransferPolicy::Open => None,
            TransferPolicy::Restricted(recipient) | TransferPolicy::Entrusted(recipient) => {
                Some(*recipient)
            }
        }
    }

    /// Check a direct withdrawal by `caller`.
    pub fn authorize_withdrawal(&self, caller: Address) -> Result<(), PolicyViolation> {
        match self {
            TransferPolicy::Open => Ok(()),
            TransferPolicy::Restricted(recipient) if *recipient == caller => Ok(()),
            TransferPolicy::Restricted(_) => Err(PolicyViolation::UnauthorizedCaller),
            TransferPolicy::Entrusted(_) => Err(PolicyViolation::EntrustedOnly),
        }
    }

    /// Recipient of an entrusted payout.
    pub fn entrusted_recipient(&self) -> Result<Address, PolicyViolation> {
        match self {
            TransferPolicy::Entrusted(recipient) => Ok(*recipient),
            _ => Err(PolicyViolation::NotEntrusted),
        }
    }
}
