// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The Ledger interface consumed by the SDK.
//!
//! The Ledger stores ciphertext handles, enforces balance checks atomically
//! and produces receipts. Every mutating call goes through [`Ledger::submit`]
//! and is finalized with [`Ledger::await_receipt`].

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use super::types::{PendingTx, TxReceipt};
use crate::capability::CapabilityId;
use crate::gateway::Handle;

/// A state-changing call on the PrivateTransfer contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    /// Publish a vault: identifier, transfer type, capability address and
    /// target address handles, carrying `value` in the native unit.
    Deposit {
        handles: [Handle; 4],
        input_proof: Bytes,
        value: U256,
    },
    /// Withdraw an amount: identifier and amount handles.
    Withdraw {
        handles: [Handle; 2],
        input_proof: Bytes,
    },
    /// Complete an entrusted withdrawal on behalf of the recipient.
    EntrustWithdraw { handle: Handle, input_proof: Bytes },
    /// Return the remaining balance to the depositor.
    Refund { handle: Handle, input_proof: Bytes },
    /// Change the global fee rate (owner only).
    ChangeFee { fee: u64 },
}

impl LedgerCall {
    /// Contract function name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCall::Deposit { .. } => "deposit",
            LedgerCall::Withdraw { .. } => "withdraw",
            LedgerCall::EntrustWithdraw { .. } => "entrustWithdraw",
            LedgerCall::Refund { .. } => "refund",
            LedgerCall::ChangeFee { .. } => "changeFee",
        }
    }
}

/// Handles of a single withdrawal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalHandles {
    pub receiver: Handle,
    pub amount: Handle,
}

/// Encrypted fields of a vault as stored on the Ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultHandles {
    /// Plaintext on the Ledger
    pub published: bool,
    pub transfer_type: Handle,
    pub balance: Handle,
    pub capability_address: Handle,
    pub depositor: Handle,
    pub target_address: Handle,
    pub withdrawals: Vec<WithdrawalHandles>,
}

impl VaultHandles {
    /// Record returned for an identifier that was never published.
    pub fn unpublished() -> Self {
        Self {
            published: false,
            transfer_type: Handle::ZERO,
            balance: Handle::ZERO,
            capability_address: Handle::ZERO,
            depositor: Handle::ZERO,
            target_address: Handle::ZERO,
            withdrawals: Vec::new(),
        }
    }

    /// Every handle of the vault, header fields first, then each withdrawal
    /// as `(receiver, amount)`.
    pub fn all(&self) -> Vec<Handle> {
        let mut handles = vec![
            self.transfer_type,
            self.balance,
            self.capability_address,
            self.depositor,
            self.target_address,
        ];
        for withdrawal in &self.withdrawals {
            handles.push(withdrawal.receiver);
            handles.push(withdrawal.amount);
        }
        handles
    }
}

/// An entrusted-withdrawal vault with claimable balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskEntry {
    pub identifier: CapabilityId,
    pub amount: U256,
}

/// Errors reported by a Ledger implementation.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    /// Rejection reason as reported by the contract.
    #[error("{0}")]
    Reverted(String),
}

/// The ledger execution environment hosting the PrivateTransfer contract.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address of the PrivateTransfer contract.
    fn contract_address(&self) -> Address;

    /// Account submitting transactions through this ledger handle.
    fn sender(&self) -> Address;

    /// Submit a call, returning once the transaction has a hash.
    async fn submit(&self, call: LedgerCall) -> Result<PendingTx, LedgerError>;

    /// Wait for a submitted transaction to be final. A reverted transaction
    /// is an error carrying the contract's reason.
    async fn await_receipt(&self, pending: &PendingTx) -> Result<TxReceipt, LedgerError>;

    /// Ciphertext handles of a vault.
    async fn get_vault(&self, identifier: CapabilityId) -> Result<VaultHandles, LedgerError>;

    /// All entrusted-withdrawal vaults with remaining balance.
    async fn get_tasks(&self) -> Result<Vec<TaskEntry>, LedgerError>;

    /// Global fee rate in parts-per-1000.
    async fn fee_rate(&self) -> Result<u64, LedgerError>;
}
