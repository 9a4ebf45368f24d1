// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault model.
//!
//! - [`VaultView`] - decrypted view of a vault, read with the capability
//! - [`VaultBook`] - append-only ledger-side record of vaults and movements
//!
//! A vault's balance is never stored. It is the deposited amount minus every
//! movement (withdrawal or commission) recorded against the vault, so the
//! history and the balance cannot drift apart. Vaults are never removed; a
//! closed vault is one whose computed balance is zero.

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use tracing::{debug, info};

use crate::blockchain::{format_native, VaultHandles};
use crate::capability::{sign_decryption_request, CapabilityId, CapabilitySecret, DecryptionRequest};
use crate::error::SdkError;
use crate::gateway::{Handle, Plaintext};
use crate::policy::TransferPolicy;
use crate::sdk::PrivateTransferSdk;

// =============================================================================
// Read path
// =============================================================================

/// A withdrawal record in cleartext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalView {
    pub receiver: Address,
    pub amount: U256,
    pub amount_human: String,
}

/// Decrypted view of a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultView {
    pub published: bool,
    pub policy: TransferPolicy,
    /// Remaining balance in wei
    pub balance: U256,
    /// Remaining balance in the native unit
    pub balance_human: String,
    pub capability_address: Address,
    pub depositor: Address,
    /// Wire target address (zero for the open policy)
    pub target_address: Address,
    /// Withdrawal records, oldest first
    pub withdrawals: Vec<WithdrawalView>,
}

impl VaultView {
    /// Map decrypted values back onto the vault's handles.
    pub fn from_decrypted(
        handles: &VaultHandles,
        values: &HashMap<Handle, Plaintext>,
    ) -> Result<Self, SdkError> {
        let transfer_type = uint_at(values, handles.transfer_type)?;
        let target_address = address_at(values, handles.target_address)?;
        let policy = TransferPolicy::from_wire(transfer_type, target_address)
            .ok_or_else(|| SdkError::encryption("Vault carries an unknown transfer policy"))?;
        let balance = uint_at(values, handles.balance)?;

        let withdrawals = handles
            .withdrawals
            .iter()
            .map(|record| {
                let amount = uint_at(values, record.amount)?;
                Ok(WithdrawalView {
                    receiver: address_at(values, record.receiver)?,
                    amount,
                    amount_human: format_native(amount),
                })
            })
            .collect::<Result<Vec<_>, SdkError>>()?;

        Ok(Self {
            published: handles.published,
            policy,
            balance,
            balance_human: format_native(balance),
            capability_address: address_at(values, handles.capability_address)?,
            depositor: address_at(values, handles.depositor)?,
            target_address,
            withdrawals,
        })
    }

    /// Most recent withdrawal record.
    pub fn last_withdrawal(&self) -> Option<&WithdrawalView> {
        self.withdrawals.last()
    }
}

fn value_at(values: &HashMap<Handle, Plaintext>, handle: Handle) -> Result<Plaintext, SdkError> {
    values
        .get(&handle)
        .copied()
        .ok_or_else(|| SdkError::encryption(format!("Gateway returned no value for {handle}")))
}

fn uint_at(values: &HashMap<Handle, Plaintext>, handle: Handle) -> Result<U256, SdkError> {
    let value = value_at(values, handle)?;
    value.as_uint().ok_or_else(|| {
        SdkError::encryption(format!("Expected uint256 for {handle}, got {}", value.type_name()))
    })
}

fn address_at(values: &HashMap<Handle, Plaintext>, handle: Handle) -> Result<Address, SdkError> {
    let value = value_at(values, handle)?;
    value.as_address().ok_or_else(|| {
        SdkError::encryption(format!("Expected address for {handle}, got {}", value.type_name()))
    })
}

impl PrivateTransferSdk {
    /// Read and decrypt the vault owned by a capability.
    ///
    /// The capability signs a decryption request locally; only the signature
    /// and public key reach the gateway. Fails with [`SdkError::NotFound`]
    /// when no vault was published for the capability.
    pub async fn get_vault_view(&self, secret: &CapabilitySecret) -> Result<VaultView, SdkError> {
        let connection = self.connection().await?;
        let handles = connection.ledger.get_vault(secret.identifier()).await?;
        if !handles.published {
            return Err(SdkError::NotFound);
        }

        let request = DecryptionRequest::new(
            handles.all(),
            connection.ledger.contract_address(),
            self.config().chain_id,
            self.config().decryption_validity_days,
        );
        let signed = sign_decryption_request(secret, request)?;
        let values = connection.gateway.decrypt(&signed).await?;

        let view = VaultView::from_decrypted(&handles, &values)?;
        debug!(
            withdrawals = view.withdrawals.len(),
            transfer_type = %view.policy.transfer_type(),
            "Vault view decrypted"
        );
        Ok(view)
    }
}

// =============================================================================
// Ledger-side record
// =============================================================================

/// Why the vault book refused an operation. Messages are the contract's
/// revert reasons.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultBookError {
    #[error("vault already published")]
    AlreadyPublished,

    #[error("vault not found")]
    NotFound,

    #[error("value zero")]
    ZeroValue,

    #[error("vault drained")]
    Drained,

    #[error("InsufficientBalance({balance}, {needed})")]
    InsufficientBalance { balance: U256, needed: U256 },
}

/// Immutable part of a published vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRecord {
    pub identifier: CapabilityId,
    pub policy: TransferPolicy,
    pub capability_address: Address,
    pub depositor: Address,
    pub deposited: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MovementKind {
    Withdrawal,
    Commission,
}

#[derive(Debug, Clone, Copy)]
struct Movement {
    vault: usize,
    kind: MovementKind,
    receiver: Address,
    amount: U256,
}

/// A withdrawal record as stored in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdrawal {
    pub receiver: Address,
    pub amount: U256,
}

/// Result of settling an entrusted withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub recipient: Address,
    pub payout: U256,
    pub trustee: Address,
    pub commission: U256,
}

/// Append-only arena of vaults and their movements.
#[derive(Debug, Default)]
pub struct VaultBook {
    vaults: Vec<VaultRecord>,
    index: HashMap<CapabilityId, usize>,
    movements: Vec<Movement>,
}

impl VaultBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a vault. Each identifier can be published once.
    pub fn publish(&mut self, record: VaultRecord) -> Result<(), VaultBookError> {
        if record.deposited.is_zero() {
            return Err(VaultBookError::ZeroValue);
        }
        if self.index.contains_key(&record.identifier) {
            return Err(VaultBookError::AlreadyPublished);
        }

        self.index.insert(record.identifier, self.vaults.len());
        self.vaults.push(record);
        Ok(())
    }

    pub fn vault(&self, identifier: CapabilityId) -> Option<&VaultRecord> {
        self.index.get(&identifier).map(|&slot| &self.vaults[slot])
    }

    pub fn is_published(&self, identifier: CapabilityId) -> bool {
        self.index.contains_key(&identifier)
    }

    /// Deposited amount minus every movement recorded against the vault.
    pub fn balance(&self, identifier: CapabilityId) -> Result<U256, VaultBookError> {
        let slot = self.slot(identifier)?;
        Ok(self.balance_at(slot))
    }

    /// Withdrawal records of a vault, oldest first.
    pub fn withdrawals(&self, identifier: CapabilityId) -> Result<Vec<Withdrawal>, VaultBookError> {
        let slot = self.slot(identifier)?;
        Ok(self
            .movements
            .iter()
            .filter(|m| m.vault == slot && m.kind == MovementKind::Withdrawal)
            .map(|m| Withdrawal {
                receiver: m.receiver,
                amount: m.amount,
            })
            .collect())
    }

    /// Whether the vault has been fully drained.
    pub fn is_closed(&self, identifier: CapabilityId) -> Result<bool, VaultBookError> {
        Ok(self.balance(identifier)?.is_zero())
    }

    /// Record a withdrawal of `amount` to `receiver`.
    pub fn withdraw(
        &mut self,
        identifier: CapabilityId,
        receiver: Address,
        amount: U256,
    ) -> Result<(), VaultBookError> {
        let slot = self.slot(identifier)?;
        let balance = self.balance_at(slot);
        if balance.is_zero() {
            return Err(VaultBookError::Drained);
        }
        if amount.is_zero() {
            return Err(VaultBookError::ZeroValue);
        }
        if amount > balance {
            return Err(VaultBookError::InsufficientBalance {
                balance,
                needed: amount,
            });
        }

        self.movements.push(Movement {
            vault: slot,
            kind: MovementKind::Withdrawal,
            receiver,
            amount,
        });
        Ok(())
    }

    /// Withdraw the whole remaining balance to `receiver`.
    pub fn drain_to(
        &mut self,
        identifier: CapabilityId,
        receiver: Address,
    ) -> Result<U256, VaultBookError> {
        let balance = self.balance(identifier)?;
        self.withdraw(identifier, receiver, balance)?;
        Ok(balance)
    }

    /// Settle an entrusted withdrawal: the whole balance leaves the vault,
    /// the trustee earns `floor(balance * fee_rate / 1000)` and the recipient
    /// receives the rest.
    pub fn settle_entrusted(
        &mut self,
        identifier: CapabilityId,
        recipient: Address,
        trustee: Address,
        fee_rate: u64,
    ) -> Result<Settlement, VaultBookError> {
        let slot = self.slot(identifier)?;
        let balance = self.balance_at(slot);
        if balance.is_zero() {
            return Err(VaultBookError::Drained);
        }

        let commission = crate::market::commission(balance, fee_rate);
        let payout = balance - commission;

        self.movements.push(Movement {
            vault: slot,
            kind: MovementKind::Withdrawal,
            receiver: recipient,
            amount: payout,
        });
        if !commission.is_zero() {
            self.movements.push(Movement {
                vault: slot,
                kind: MovementKind::Commission,
                receiver: trustee,
                amount: commission,
            });
        }

        info!(fee_rate, "Entrusted withdrawal settled");
        Ok(Settlement {
            recipient,
            payout,
            trustee,
            commission,
        })
    }

    /// Entrusted vaults with remaining balance, in publication order.
    pub fn open_tasks(&self) -> Vec<(CapabilityId, U256)> {
        self.vaults
            .iter()
            .enumerate()
            .filter(|(_, record)| matches!(record.policy, TransferPolicy::Entrusted(_)))
            .map(|(slot, record)| (record.identifier, self.balance_at(slot)))
            .filter(|(_, balance)| !balance.is_zero())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    fn slot(&self, identifier: CapabilityId) -> Result<usize, VaultBookError> {
        self.index
            .get(&identifier)
            .copied()
            .ok_or(VaultBookError::NotFound)
    }

    fn balance_at(&self, slot: usize) -> U256 {
        let moved = self
            .movements
            .iter()
            .filter(|m| m.vault == slot)
            .fold(U256::ZERO, |acc, m| acc + m.amount);
        self.vaults[slot].deposited - moved
    }
}
