// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process PrivateTransfer ledger.
//!
//! Executes the contract's rules against a [`VaultBook`]: input proofs must
//! match the submitting account, withdrawals are checked against the vault
//! policy and balance atomically, entrusted withdrawals pay the trustee a
//! commission at the fee rate current at execution time, and only the owner
//! may change the fee.
//!
//! Transactions execute in arrival order as [`Ledger::submit`] accepts them,
//! each in its own block. A revert still surfaces from `await_receipt`, the
//! way it does on a live chain, and a transaction whose receipt is never
//! awaited has taken effect all the same.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::ledger::{Ledger, LedgerCall, LedgerError, TaskEntry, VaultHandles, WithdrawalHandles};
use super::types::{PendingTx, TxReceipt};
use crate::capability::CapabilityId;
use crate::gateway::{Handle, LocalGateway, Plaintext};
use crate::policy::TransferPolicy;
use crate::vault::{VaultBook, VaultRecord};

/// Highest accepted fee rate, parts-per-1000.
pub const MAX_FEE_RATE: u64 = 1000;

const GAS_PER_CALL: u64 = 21_000;

#[derive(Debug, Default)]
struct ChainState {
    book: VaultBook,
    sealed: HashMap<CapabilityId, VaultHandles>,
    fee_rate: u64,
    block_number: u64,
    nonce: u64,
    mined: HashMap<TxHash, Result<TxReceipt, String>>,
    credits: HashMap<Address, U256>,
    reject_next: Option<String>,
}

impl ChainState {
    fn credit(&mut self, account: Address, amount: U256) {
        *self.credits.entry(account).or_default() += amount;
    }
}

/// Contract state shared by every [`SimulatedLedger`] handle.
#[derive(Debug)]
pub struct SimulatedChain {
    contract: Address,
    owner: Address,
    gateway: Arc<LocalGateway>,
    state: Mutex<ChainState>,
    submissions: AtomicUsize,
    views: AtomicUsize,
}

impl SimulatedChain {
    pub fn new(contract: Address, owner: Address, fee_rate: u64, gateway: Arc<LocalGateway>) -> Self {
        Self {
            contract,
            owner,
            gateway,
            state: Mutex::new(ChainState {
                fee_rate,
                ..ChainState::default()
            }),
            submissions: AtomicUsize::new(0),
            views: AtomicUsize::new(0),
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Number of transactions submitted.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Number of view calls served.
    pub fn views(&self) -> usize {
        self.views.load(Ordering::SeqCst)
    }

    /// Total native value paid out to `account`.
    pub async fn credited(&self, account: Address) -> U256 {
        let state = self.state.lock().await;
        state.credits.get(&account).copied().unwrap_or_default()
    }

    /// Make the next submission fail before it gets a transaction hash.
    pub async fn reject_next_submission(&self, reason: impl Into<String>) {
        self.state.lock().await.reject_next = Some(reason.into());
    }

    async fn submit(&self, sender: Address, call: LedgerCall) -> Result<PendingTx, LedgerError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if let Some(reason) = state.reject_next.take() {
            return Err(LedgerError::Reverted(reason));
        }

        state.nonce += 1;
        let mut preimage = Vec::with_capacity(28);
        preimage.extend_from_slice(sender.as_slice());
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        let tx_hash = keccak256(&preimage);

        let name = call.name();
        let executed = self.execute(&mut state, sender, call).await;
        state.block_number += 1;

        let outcome = executed.map(|()| TxReceipt {
            tx_hash,
            block_number: state.block_number,
            gas_used: GAS_PER_CALL,
            success: true,
        });
        match &outcome {
            Ok(receipt) => info!(
                call = name,
                tx_hash = %tx_hash,
                block_number = receipt.block_number,
                "Transaction executed"
            ),
            Err(reason) => info!(call = name, tx_hash = %tx_hash, reason = %reason, "Transaction reverted"),
        }
        state.mined.insert(tx_hash, outcome);
        Ok(PendingTx { tx_hash })
    }

    async fn await_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, LedgerError> {
        let state = self.state.lock().await;
        let outcome = state
            .mined
            .get(&tx_hash)
            .ok_or_else(|| LedgerError::Rpc(format!("transaction {tx_hash} not found")))?;
        debug!(tx_hash = %tx_hash, "Receipt served");
        outcome.clone().map_err(LedgerError::Reverted)
    }

    async fn execute(
        &self,
        state: &mut ChainState,
        sender: Address,
        call: LedgerCall,
    ) -> Result<(), String> {
        match call {
            LedgerCall::Deposit {
                handles,
                input_proof,
                value,
            } => self.deposit(state, sender, &handles, &input_proof, value).await,
            LedgerCall::Withdraw {
                handles,
                input_proof,
            } => {
                let inputs = self.open(sender, &handles, &input_proof).await?;
                let identifier = identifier_from(&inputs[0])?;
                let amount = inputs[1].as_uint().ok_or("amount must be uint256")?;

                let record = state
                    .book
                    .vault(identifier)
                    .ok_or("vault not found")?
                    .clone();
                record
                    .policy
                    .authorize_withdrawal(sender)
                    .map_err(|e| e.to_string())?;
                state
                    .book
                    .withdraw(identifier, sender, amount)
                    .map_err(|e| e.to_string())?;
                state.credit(sender, amount);
                self.record_movement(state, &record, sender, amount).await
            }
            LedgerCall::EntrustWithdraw {
                handle,
                input_proof,
            } => {
                let inputs = self.open(sender, &[handle], &input_proof).await?;
                let identifier = identifier_from(&inputs[0])?;

                let record = state
                    .book
                    .vault(identifier)
                    .ok_or("vault not found")?
                    .clone();
                let recipient = record
                    .policy
                    .entrusted_recipient()
                    .map_err(|e| e.to_string())?;
                let fee_rate = state.fee_rate;
                let settlement = state
                    .book
                    .settle_entrusted(identifier, recipient, sender, fee_rate)
                    .map_err(|e| e.to_string())?;
                state.credit(settlement.recipient, settlement.payout);
                state.credit(settlement.trustee, settlement.commission);
                self.record_movement(state, &record, settlement.recipient, settlement.payout)
                    .await
            }
            LedgerCall::Refund {
                handle,
                input_proof,
            } => {
                let inputs = self.open(sender, &[handle], &input_proof).await?;
                let identifier = identifier_from(&inputs[0])?;

                let record = state
                    .book
                    .vault(identifier)
                    .ok_or("vault not found")?
                    .clone();
                if record.depositor != sender {
                    return Err("unauthorized caller".to_string());
                }
                let amount = state
                    .book
                    .drain_to(identifier, sender)
                    .map_err(|e| e.to_string())?;
                state.credit(sender, amount);
                self.record_movement(state, &record, sender, amount).await
            }
            LedgerCall::ChangeFee { fee } => {
                if sender != self.owner {
                    return Err("caller is not the owner".to_string());
                }
                if fee > MAX_FEE_RATE {
                    return Err(format!("fee exceeds {MAX_FEE_RATE}"));
                }
                state.fee_rate = fee;
                Ok(())
            }
        }
    }

    async fn deposit(
        &self,
        state: &mut ChainState,
        sender: Address,
        handles: &[Handle; 4],
        input_proof: &Bytes,
        value: U256,
    ) -> Result<(), String> {
        if value.is_zero() {
            return Err("value zero".to_string());
        }
        let inputs = self.open(sender, handles, input_proof).await?;
        let identifier = identifier_from(&inputs[0])?;
        let transfer_type = inputs[1].as_uint().ok_or("transfer type must be uint256")?;
        let capability_address = inputs[2]
            .as_address()
            .ok_or("password address must be an address")?;
        let target = inputs[3].as_address().ok_or("allow address must be an address")?;
        let policy =
            TransferPolicy::from_wire(transfer_type, target).ok_or("invalid transfer type")?;

        state
            .book
            .publish(VaultRecord {
                identifier,
                policy,
                capability_address,
                depositor: sender,
                deposited: value,
            })
            .map_err(|e| e.to_string())?;

        let readers = [capability_address, sender];
        let gateway = &self.gateway;
        let sealed = VaultHandles {
            published: true,
            transfer_type: gateway
                .seal(self.contract, Plaintext::Uint(transfer_type), &readers)
                .await,
            balance: gateway
                .seal(self.contract, Plaintext::Uint(value), &readers)
                .await,
            capability_address: gateway
                .seal(self.contract, Plaintext::Address(capability_address), &readers)
                .await,
            depositor: gateway
                .seal(self.contract, Plaintext::Address(sender), &readers)
                .await,
            target_address: gateway
                .seal(self.contract, Plaintext::Address(target), &readers)
                .await,
            withdrawals: Vec::new(),
        };
        state.sealed.insert(identifier, sealed);
        Ok(())
    }

    /// Re-encrypt the balance and append a withdrawal record.
    async fn record_movement(
        &self,
        state: &mut ChainState,
        record: &VaultRecord,
        receiver: Address,
        amount: U256,
    ) -> Result<(), String> {
        let balance = state
            .book
            .balance(record.identifier)
            .map_err(|e| e.to_string())?;
        let readers = [record.capability_address, record.depositor];

        let balance_handle = self
            .gateway
            .seal(self.contract, Plaintext::Uint(balance), &readers)
            .await;
        let withdrawal = WithdrawalHandles {
            receiver: self
                .gateway
                .seal(self.contract, Plaintext::Address(receiver), &readers)
                .await,
            amount: self
                .gateway
                .seal(self.contract, Plaintext::Uint(amount), &readers)
                .await,
        };

        let sealed = state
            .sealed
            .get_mut(&record.identifier)
            .ok_or("vault not found")?;
        sealed.balance = balance_handle;
        sealed.withdrawals.push(withdrawal);
        Ok(())
    }

    async fn open(
        &self,
        sender: Address,
        handles: &[Handle],
        input_proof: &Bytes,
    ) -> Result<Vec<Plaintext>, String> {
        self.gateway
            .open_inputs(self.contract, sender, handles, input_proof)
            .await
            .map_err(|e| e.to_string())
    }

    async fn get_vault(&self, identifier: CapabilityId) -> VaultHandles {
        self.views.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        state
            .sealed
            .get(&identifier)
            .cloned()
            .unwrap_or_else(VaultHandles::unpublished)
    }

    async fn get_tasks(&self) -> Vec<TaskEntry> {
        self.views.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        state
            .book
            .open_tasks()
            .into_iter()
            .map(|(identifier, amount)| TaskEntry { identifier, amount })
            .collect()
    }

    async fn fee_rate(&self) -> u64 {
        self.views.fetch_add(1, Ordering::SeqCst);
        self.state.lock().await.fee_rate
    }
}

fn identifier_from(value: &Plaintext) -> Result<CapabilityId, String> {
    value
        .as_uint()
        .map(CapabilityId::new)
        .ok_or_else(|| "password must be uint256".to_string())
}

/// A [`SimulatedChain`] seen from one submitting account.
#[derive(Debug, Clone)]
pub struct SimulatedLedger {
    chain: Arc<SimulatedChain>,
    sender: Address,
}

impl SimulatedLedger {
    pub fn new(chain: Arc<SimulatedChain>, sender: Address) -> Self {
        Self { chain, sender }
    }

    pub fn chain(&self) -> &Arc<SimulatedChain> {
        &self.chain
    }
}

#[async_trait]
impl Ledger for SimulatedLedger {
    fn contract_address(&self) -> Address {
        self.chain.contract
    }

    fn sender(&self) -> Address {
        self.sender
    }

    async fn submit(&self, call: LedgerCall) -> Result<PendingTx, LedgerError> {
        self.chain.submit(self.sender, call).await
    }

    async fn await_receipt(&self, pending: &PendingTx) -> Result<TxReceipt, LedgerError> {
        self.chain.await_receipt(pending.tx_hash).await
    }

    async fn get_vault(&self, identifier: CapabilityId) -> Result<VaultHandles, LedgerError> {
        Ok(self.chain.get_vault(identifier).await)
    }

    async fn get_tasks(&self) -> Result<Vec<TaskEntry>, LedgerError> {
        Ok(self.chain.get_tasks().await)
    }

    async fn fee_rate(&self) -> Result<u64, LedgerError> {
        Ok(self.chain.fee_rate().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{EncryptedInput, EncryptionGateway};

    const CONTRACT: Address = Address::repeat_byte(0xc0);
    const OWNER: Address = Address::repeat_byte(0x01);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn chain(fee_rate: u64) -> (Arc<SimulatedChain>, Arc<LocalGateway>) {
        let gateway = Arc::new(LocalGateway::new(31337));
        let chain = Arc::new(SimulatedChain::new(CONTRACT, OWNER, fee_rate, Arc::clone(&gateway)));
        (chain, gateway)
    }

    async fn deposit_call(
        gateway: &LocalGateway,
        sender: Address,
        identifier: u64,
        transfer_type: u8,
        target: Address,
        value: u64,
    ) -> LedgerCall {
        let payload = gateway
            .encrypt(
                EncryptedInput::new(CONTRACT, sender)
                    .add_u256(U256::from(identifier))
                    .add_u256(U256::from(transfer_type))
                    .add_address(Address::repeat_byte(0xca))
                    .add_address(target),
            )
            .await
            .unwrap();
        LedgerCall::Deposit {
            handles: payload.handle_array().unwrap(),
            input_proof: payload.input_proof,
            value: U256::from(value),
        }
    }

    async fn run(ledger: &SimulatedLedger, call: LedgerCall) -> Result<TxReceipt, LedgerError> {
        let pending = ledger.submit(call).await?;
        ledger.await_receipt(&pending).await
    }

    #[tokio::test]
    async fn deposit_publishes_sealed_vault() {
        let (chain, gateway) = chain(50);
        let alice = SimulatedLedger::new(Arc::clone(&chain), ALICE);

        let call = deposit_call(&gateway, ALICE, 7, 2, Address::ZERO, 1_000).await;
        let receipt = run(&alice, call).await.unwrap();
        assert_eq!(receipt.block_number, 1);

        let vault = alice.get_vault(CapabilityId::new(U256::from(7u8))).await.unwrap();
        assert!(vault.published);
        assert!(vault.withdrawals.is_empty());
        assert!(!alice
            .get_vault(CapabilityId::new(U256::from(8u8)))
            .await
            .unwrap()
            .published);
    }

    #[tokio::test]
    async fn receipts_are_stable_once_mined() {
        let (chain, gateway) = chain(50);
        let alice = SimulatedLedger::new(Arc::clone(&chain), ALICE);

        let pending = alice
            .submit(deposit_call(&gateway, ALICE, 7, 2, Address::ZERO, 1_000).await)
            .await
            .unwrap();
        let first = alice.await_receipt(&pending).await.unwrap();
        let second = alice.await_receipt(&pending).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn inputs_from_another_sender_are_rejected() {
        let (chain, gateway) = chain(50);
        let bob = SimulatedLedger::new(Arc::clone(&chain), BOB);

        let call = deposit_call(&gateway, ALICE, 7, 2, Address::ZERO, 1_000).await;
        let err = run(&bob, call).await.unwrap_err();
        assert!(err.to_string().contains("input proof"));
        assert!(!bob.get_vault(CapabilityId::new(U256::from(7u8))).await.unwrap().published);
    }

    #[tokio::test]
    async fn zero_value_and_invalid_policy_revert() {
        let (chain, gateway) = chain(50);
        let alice = SimulatedLedger::new(Arc::clone(&chain), ALICE);

        let call = deposit_call(&gateway, ALICE, 7, 2, Address::ZERO, 0).await;
        assert_eq!(run(&alice, call).await.unwrap_err().to_string(), "value zero");

        let call = deposit_call(&gateway, ALICE, 7, 1, Address::ZERO, 10).await;
        assert_eq!(
            run(&alice, call).await.unwrap_err().to_string(),
            "invalid transfer type"
        );
    }

    #[tokio::test]
    async fn entrusted_withdrawal_pays_trustee_and_recipient() {
        let (chain, gateway) = chain(50);
        let alice = SimulatedLedger::new(Arc::clone(&chain), ALICE);
        let trustee = SimulatedLedger::new(Arc::clone(&chain), BOB);
        let recipient = Address::repeat_byte(0xee);

        run(&alice, deposit_call(&gateway, ALICE, 9, 3, recipient, 1_000).await)
            .await
            .unwrap();
        assert_eq!(trustee.get_tasks().await.unwrap().len(), 1);

        let payload = gateway
            .encrypt(EncryptedInput::new(CONTRACT, BOB).add_u256(U256::from(9u8)))
            .await
            .unwrap();
        run(
            &trustee,
            LedgerCall::EntrustWithdraw {
                handle: payload.handles[0],
                input_proof: payload.input_proof,
            },
        )
        .await
        .unwrap();

        assert_eq!(chain.credited(BOB).await, U256::from(50u64));
        assert_eq!(chain.credited(recipient).await, U256::from(950u64));
        assert!(trustee.get_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fee_changes_are_owner_only_and_capped() {
        let (chain, _) = chain(50);
        let owner = SimulatedLedger::new(Arc::clone(&chain), OWNER);
        let alice = SimulatedLedger::new(Arc::clone(&chain), ALICE);

        let err = run(&alice, LedgerCall::ChangeFee { fee: 10 }).await.unwrap_err();
        assert_eq!(err.to_string(), "caller is not the owner");

        let err = run(&owner, LedgerCall::ChangeFee { fee: 1001 }).await.unwrap_err();
        assert_eq!(err.to_string(), "fee exceeds 1000");

        run(&owner, LedgerCall::ChangeFee { fee: 10 }).await.unwrap();
        assert_eq!(owner.fee_rate().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn unobserved_transactions_still_take_effect() {
        let (chain, gateway) = chain(50);
        let alice = SimulatedLedger::new(Arc::clone(&chain), ALICE);

        alice
            .submit(deposit_call(&gateway, ALICE, 7, 2, Address::ZERO, 1_000).await)
            .await
            .unwrap();

        let vault = alice.get_vault(CapabilityId::new(U256::from(7u8))).await.unwrap();
        assert!(vault.published);
    }

    #[tokio::test]
    async fn withdrawals_execute_in_arrival_order() {
        let (chain, gateway) = chain(50);
        let alice = SimulatedLedger::new(Arc::clone(&chain), ALICE);
        run(&alice, deposit_call(&gateway, ALICE, 7, 2, Address::ZERO, 1_000).await)
            .await
            .unwrap();

        let mut pending = Vec::new();
        for amount in [600u64, 500] {
            let payload = gateway
                .encrypt(
                    EncryptedInput::new(CONTRACT, ALICE)
                        .add_u256(U256::from(7u8))
                        .add_u256(U256::from(amount)),
                )
                .await
                .unwrap();
            let call = LedgerCall::Withdraw {
                handles: payload.handle_array().unwrap(),
                input_proof: payload.input_proof,
            };
            pending.push(alice.submit(call).await.unwrap());
        }

        // Receipts awaited in reverse order do not change the outcome.
        let second = alice.await_receipt(&pending[1]).await.unwrap_err();
        assert!(second.to_string().starts_with("InsufficientBalance"));
        alice.await_receipt(&pending[0]).await.unwrap();

        assert_eq!(chain.credited(ALICE).await, U256::from(600u64));
        let vault = alice.get_vault(CapabilityId::new(U256::from(7u8))).await.unwrap();
        assert_eq!(vault.withdrawals.len(), 1);
    }

    #[tokio::test]
    async fn unknown_transaction_is_an_rpc_error() {
        let (chain, _) = chain(50);
        let alice = SimulatedLedger::new(chain, ALICE);
        let err = alice
            .await_receipt(&PendingTx {
                tx_hash: TxHash::repeat_byte(0x99),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rpc(_)));
    }
}
