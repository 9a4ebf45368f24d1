// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Write path: deposit, withdraw and refund.
//!
//! Amounts are human-readable strings in the native unit ("0.5"). Local
//! validation runs before anything else and raises directly; every failure
//! after it goes through the transaction lifecycle so `on_error` fires.

use alloy::primitives::{Address, U256};
use tracing::info;

use crate::blockchain::{parse_amount, format_native, LedgerCall, TxReceipt, NATIVE_DECIMALS};
use crate::capability::{generate_capability, CapabilitySecret, GeneratedCapability};
use crate::coordinator::{Confirmed, TxLifecycle};
use crate::error::SdkError;
use crate::gateway::EncryptedInput;
use crate::policy::{TransferPolicy, TransferType};
use crate::sdk::PrivateTransferSdk;

/// Parameters of a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositParams {
    pub transfer_type: TransferType,
    /// Amount in the native unit, e.g. "0.5"
    pub amount: String,
    /// Required for specified-recipient and entrusted-withdrawal
    pub recipient: Option<Address>,
}

impl DepositParams {
    pub fn new(transfer_type: TransferType, amount: impl Into<String>) -> Self {
        Self {
            transfer_type,
            amount: amount.into(),
            recipient: None,
        }
    }

    pub fn recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }
}

/// Outcome of a confirmed deposit.
///
/// `capability` holds the only copy of the vault's password. The SDK keeps
/// nothing; the caller must store it.
#[derive(Debug, Clone)]
pub struct DepositResult {
    pub receipt: TxReceipt,
    pub capability: GeneratedCapability,
    pub policy: TransferPolicy,
    /// Wire target address (zero for the open policy)
    pub target_address: Address,
    pub amount: U256,
    pub amount_human: String,
}

/// Outcome of a confirmed withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawResult {
    pub receipt: TxReceipt,
    /// Requested amount in wei
    pub amount: U256,
    pub amount_human: String,
}

/// Outcome of a confirmed refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundResult {
    pub receipt: TxReceipt,
    /// Amount returned to the depositor, read back from the vault
    pub amount: U256,
    pub amount_human: String,
}

impl Confirmed for DepositResult {
    fn receipt(&self) -> &TxReceipt {
        &self.receipt
    }
}

impl Confirmed for WithdrawResult {
    fn receipt(&self) -> &TxReceipt {
        &self.receipt
    }
}

impl Confirmed for RefundResult {
    fn receipt(&self) -> &TxReceipt {
        &self.receipt
    }
}

/// Parse a human amount and require it to be positive.
pub fn validate_amount(raw: &str) -> Result<U256, SdkError> {
    let amount = parse_amount(raw.trim(), NATIVE_DECIMALS)?;
    if amount.is_zero() {
        return Err(SdkError::validation("Amount must be greater than zero"));
    }
    Ok(amount)
}

impl PrivateTransferSdk {
    /// Lock `params.amount` in a new vault under a fresh capability.
    ///
    /// Failures after local validation are wrapped in
    /// [`SdkError::DepositFailed`]. Retrying generates a new capability.
    pub async fn deposit(&self, params: DepositParams) -> Result<DepositResult, SdkError> {
        let amount = validate_amount(&params.amount)?;
        let policy = TransferPolicy::resolve(params.transfer_type, params.recipient)?;
        let capability = generate_capability();

        let mut lifecycle = self.lifecycle("deposit");
        let outcome = self
            .deposit_inner(&mut lifecycle, capability, policy, amount)
            .await
            .map_err(|cause| SdkError::DepositFailed(Box::new(cause)));
        lifecycle.finish(outcome)
    }

    async fn deposit_inner(
        &self,
        lifecycle: &mut TxLifecycle,
        capability: GeneratedCapability,
        policy: TransferPolicy,
        amount: U256,
    ) -> Result<DepositResult, SdkError> {
        let connection = self.connection().await?;
        let ledger = connection.ledger.as_ref();

        let input = EncryptedInput::new(ledger.contract_address(), ledger.sender())
            .add_u256(capability.identifier.into_u256())
            .add_u256(U256::from(policy.transfer_type().code()))
            .add_address(capability.address)
            .add_address(policy.target_address());
        let payload = connection.gateway.encrypt(input).await?;

        let call = LedgerCall::Deposit {
            handles: payload.handle_array()?,
            input_proof: payload.input_proof,
            value: amount,
        };
        let receipt = lifecycle.submit(ledger, call).await?;

        info!(
            tx_hash = %receipt.tx_hash,
            transfer_type = %policy.transfer_type(),
            "Deposit confirmed"
        );
        Ok(DepositResult {
            receipt,
            target_address: policy.target_address(),
            policy,
            capability,
            amount,
            amount_human: format_native(amount),
        })
    }

    /// Withdraw `amount` from the vault of `secret` to the submitting
    /// account. Balance and policy are enforced by the ledger.
    pub async fn withdraw(
        &self,
        secret: &CapabilitySecret,
        amount: &str,
    ) -> Result<WithdrawResult, SdkError> {
        let amount = validate_amount(amount)?;

        let mut lifecycle = self.lifecycle("withdraw");
        let outcome = self.withdraw_inner(&mut lifecycle, secret, amount).await;
        lifecycle.finish(outcome)
    }

    async fn withdraw_inner(
        &self,
        lifecycle: &mut TxLifecycle,
        secret: &CapabilitySecret,
        amount: U256,
    ) -> Result<WithdrawResult, SdkError> {
        let connection = self.connection().await?;
        let ledger = connection.ledger.as_ref();

        let input = EncryptedInput::new(ledger.contract_address(), ledger.sender())
            .add_u256(secret.identifier().into_u256())
            .add_u256(amount);
        let payload = connection.gateway.encrypt(input).await?;

        let call = LedgerCall::Withdraw {
            handles: payload.handle_array()?,
            input_proof: payload.input_proof,
        };
        let receipt = lifecycle.submit(ledger, call).await?;

        info!(tx_hash = %receipt.tx_hash, "Withdrawal confirmed");
        Ok(WithdrawResult {
            receipt,
            amount,
            amount_human: format_native(amount),
        })
    }

    /// Return the remaining balance of the vault to its depositor.
    ///
    /// The refunded amount is read back from the vault after confirmation.
    pub async fn refund(&self, secret: &CapabilitySecret) -> Result<RefundResult, SdkError> {
        let mut lifecycle = self.lifecycle("refund");
        let outcome = self.refund_inner(&mut lifecycle, secret).await;
        lifecycle.finish(outcome)
    }

    async fn refund_inner(
        &self,
        lifecycle: &mut TxLifecycle,
        secret: &CapabilitySecret,
    ) -> Result<RefundResult, SdkError> {
        let connection = self.connection().await?;
        let ledger = connection.ledger.as_ref();

        let input = EncryptedInput::new(ledger.contract_address(), ledger.sender())
            .add_u256(secret.identifier().into_u256());
        let payload = connection.gateway.encrypt(input).await?;

        let [handle] = payload.handle_array::<1>()?;
        let call = LedgerCall::Refund {
            handle,
            input_proof: payload.input_proof,
        };
        let receipt = lifecycle.submit(ledger, call).await?;

        let view = self.get_vault_view(secret).await?;
        let refunded = view.last_withdrawal().ok_or_else(|| {
            SdkError::ContractCall("refund left no withdrawal record".to_string())
        })?;

        info!(tx_hash = %receipt.tx_hash, "Refund confirmed");
        Ok(RefundResult {
            receipt,
            amount: refunded.amount,
            amount_human: refunded.amount_human.clone(),
        })
    }
}
