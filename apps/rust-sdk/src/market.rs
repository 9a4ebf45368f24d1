// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Bounty Market
//!
//! Entrusted-withdrawal vaults with a remaining balance are published as
//! tasks. Any account may complete a task by submitting the withdrawal on
//! the recipient's behalf; the Ledger pays it a commission of
//! `floor(amount * fee_rate / 1000)` and sends the rest to the recipient.
//!
//! The fee rate is read from the Ledger on every listing and completion.
//! [`TaskWatcher`] re-lists tasks on an interval for long-running trustees.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::blockchain::{format_native, LedgerCall, TxReceipt};
use crate::capability::{CapabilityId, CapabilitySecret};
use crate::coordinator::{Confirmed, TxLifecycle};
use crate::error::SdkError;
use crate::gateway::EncryptedInput;
use crate::sdk::PrivateTransferSdk;

/// Denominator of the fee rate.
pub const FEE_DENOMINATOR: u64 = 1000;

/// Default interval between task sweeps.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// `floor(amount * fee_rate / 1000)` without overflowing 256 bits.
pub fn commission(amount: U256, fee_rate: u64) -> U256 {
    let denominator = U256::from(FEE_DENOMINATOR);
    let fee = U256::from(fee_rate);
    let whole = amount / denominator;
    let rest = amount % denominator;
    whole
        .saturating_mul(fee)
        .saturating_add(rest * fee / denominator)
}

/// An open entrusted withdrawal, priced at the fee rate read when listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub identifier: CapabilityId,
    /// Remaining vault balance in wei
    pub amount: U256,
    pub commission: U256,
    /// What the completer earns; equal to `commission`
    pub total_reward: U256,
    pub fee_rate: u64,
}

impl Task {
    pub fn new(identifier: CapabilityId, amount: U256, fee_rate: u64) -> Self {
        let commission = commission(amount, fee_rate);
        Self {
            identifier,
            amount,
            commission,
            total_reward: commission,
            fee_rate,
        }
    }

    pub fn amount_human(&self) -> String {
        format_native(self.amount)
    }

    pub fn commission_human(&self) -> String {
        format_native(self.commission)
    }

    pub fn total_reward_human(&self) -> String {
        format_native(self.total_reward)
    }
}

/// The task with the highest commission, if any.
pub fn most_profitable(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().max_by_key(|task| task.commission)
}

/// Proof that the caller may complete a task.
#[derive(Debug, Clone)]
pub enum TaskCredential {
    Secret(CapabilitySecret),
    Identifier(CapabilityId),
}

impl TaskCredential {
    pub fn identifier(&self) -> CapabilityId {
        match self {
            TaskCredential::Secret(secret) => secret.identifier(),
            TaskCredential::Identifier(identifier) => *identifier,
        }
    }
}

impl From<CapabilitySecret> for TaskCredential {
    fn from(secret: CapabilitySecret) -> Self {
        TaskCredential::Secret(secret)
    }
}

impl From<&CapabilitySecret> for TaskCredential {
    fn from(secret: &CapabilitySecret) -> Self {
        TaskCredential::Secret(secret.clone())
    }
}

impl From<CapabilityId> for TaskCredential {
    fn from(identifier: CapabilityId) -> Self {
        TaskCredential::Identifier(identifier)
    }
}

/// Outcome of a completed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteResult {
    pub receipt: TxReceipt,
    pub identifier: CapabilityId,
    /// Commission estimated when the task was listed
    pub commission: U256,
    pub commission_human: String,
    /// Fee rate read just before submission; the Ledger applies the rate
    /// current when the transaction executes
    pub fee_rate_at_submission: u64,
}

impl Confirmed for CompleteResult {
    fn receipt(&self) -> &TxReceipt {
        &self.receipt
    }
}

impl PrivateTransferSdk {
    /// Current fee rate in parts-per-1000.
    pub async fn fee_rate(&self) -> Result<u64, SdkError> {
        let connection = self.connection().await?;
        Ok(connection.ledger.fee_rate().await?)
    }

    /// Snapshot of the open tasks.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, SdkError> {
        let connection = self.connection().await?;
        let fee_rate = connection.ledger.fee_rate().await?;
        let entries = connection.ledger.get_tasks().await?;

        let tasks: Vec<Task> = entries
            .into_iter()
            .filter(|entry| !entry.amount.is_zero())
            .map(|entry| Task::new(entry.identifier, entry.amount, fee_rate))
            .collect();
        info!(count = tasks.len(), fee_rate, "Listed tasks");
        Ok(tasks)
    }

    /// Complete an entrusted withdrawal.
    ///
    /// `credential` must name the task's vault, either through its capability
    /// or its identifier; anything else fails before touching the network.
    pub async fn complete_task(
        &self,
        task: &Task,
        credential: impl Into<TaskCredential>,
    ) -> Result<CompleteResult, SdkError> {
        if credential.into().identifier() != task.identifier {
            return Err(SdkError::AuthorizationMismatch);
        }

        let mut lifecycle = self.lifecycle("entrustWithdraw");
        let outcome = self.complete_task_inner(&mut lifecycle, task).await;
        lifecycle.finish(outcome)
    }

    async fn complete_task_inner(
        &self,
        lifecycle: &mut TxLifecycle,
        task: &Task,
    ) -> Result<CompleteResult, SdkError> {
        let connection = self.connection().await?;
        let ledger = connection.ledger.as_ref();

        let fee_rate = ledger.fee_rate().await?;
        if fee_rate != task.fee_rate {
            warn!(
                listed_fee_rate = task.fee_rate,
                fee_rate, "Fee rate changed since the task was listed"
            );
        }

        let input = EncryptedInput::new(ledger.contract_address(), ledger.sender())
            .add_u256(task.identifier.into_u256());
        let payload = connection.gateway.encrypt(input).await?;
        let [handle] = payload.handle_array::<1>()?;

        let call = LedgerCall::EntrustWithdraw {
            handle,
            input_proof: payload.input_proof,
        };
        let receipt = lifecycle.submit(ledger, call).await?;

        info!(tx_hash = %receipt.tx_hash, fee_rate, "Task completed");
        Ok(CompleteResult {
            receipt,
            identifier: task.identifier,
            commission: task.commission,
            commission_human: task.commission_human(),
            fee_rate_at_submission: fee_rate,
        })
    }
}

/// Background task monitor.
///
/// Lists tasks every `poll_interval` and publishes each snapshot to
/// subscribers. A failed sweep keeps the previous snapshot.
pub struct TaskWatcher {
    sdk: Arc<PrivateTransferSdk>,
    poll_interval: Duration,
    snapshot: watch::Sender<Vec<Task>>,
}

impl TaskWatcher {
    pub fn new(sdk: Arc<PrivateTransferSdk>) -> Self {
        let (snapshot, _) = watch::channel(Vec::new());
        Self {
            sdk,
            poll_interval: DEFAULT_POLL_INTERVAL,
            snapshot,
        }
    }

    pub fn with_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Receiver of task snapshots, starting from the latest one.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.snapshot.subscribe()
    }

    /// Run the watcher until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(watcher.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            "Task watcher starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Task watcher shutting down");
                return;
            }

            self.poll_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Task watcher shutting down");
                    return;
                }
            }
        }
    }

    /// One sweep: list tasks and publish the snapshot.
    pub async fn poll_step(&self) {
        match self.sdk.list_tasks().await {
            Ok(tasks) => {
                if let Some(best) = most_profitable(&tasks) {
                    info!(
                        count = tasks.len(),
                        best_commission = %best.commission_human(),
                        "Task watcher: tasks available"
                    );
                }
                self.snapshot.send_replace(tasks);
            }
            Err(e) => {
                warn!(
                    error_code = e.error_code(),
                    error = %e,
                    "Task watcher: failed to list tasks"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    use crate::blockchain::{parse_amount, NATIVE_DECIMALS};
    use crate::devnet::Devnet;
    use crate::policy::TransferType;
    use crate::transfer::DepositParams;

    const OWNER: Address = Address::repeat_byte(0x0a);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);
    const TRUSTEE: Address = Address::repeat_byte(0x7e);

    fn eth(amount: &str) -> U256 {
        parse_amount(amount, NATIVE_DECIMALS).unwrap()
    }

    async fn entrusted_deposit(sdk: &PrivateTransferSdk, amount: &str) -> CapabilitySecret {
        sdk.deposit(DepositParams::new(TransferType::EntrustedWithdrawal, amount).recipient(BOB))
            .await
            .unwrap()
            .capability
            .secret
    }

    #[test]
    fn commission_is_floor_of_fee_share() {
        for (amount, fee) in [
            (0u64, 50u64),
            (1, 50),
            (999, 1),
            (1_000, 50),
            (1_999, 50),
            (123_456_789, 7),
            (10_000, 1000),
            (10_000, 0),
        ] {
            let expected = U256::from(amount) * U256::from(fee) / U256::from(1000u64);
            assert_eq!(commission(U256::from(amount), fee), expected, "{amount} @ {fee}");
        }
    }

    #[test]
    fn commission_does_not_overflow() {
        assert_eq!(commission(U256::MAX, 1000), U256::MAX);
        assert!(commission(U256::MAX, 500) < U256::MAX);
    }

    #[test]
    fn reward_equals_commission() {
        let task = Task::new(CapabilityId::new(U256::from(9u64)), eth("1"), 50);
        assert_eq!(task.commission, eth("0.05"));
        assert_eq!(task.total_reward, task.commission);
        assert_eq!(task.commission_human(), "0.05");
        assert_eq!(task.amount_human(), "1");
    }

    #[test]
    fn picks_most_profitable_task() {
        let tasks = vec![
            Task::new(CapabilityId::new(U256::from(1u64)), eth("0.2"), 50),
            Task::new(CapabilityId::new(U256::from(2u64)), eth("3"), 50),
            Task::new(CapabilityId::new(U256::from(3u64)), eth("1"), 50),
        ];
        let best = most_profitable(&tasks).unwrap();
        assert_eq!(best.identifier, CapabilityId::new(U256::from(2u64)));
        assert!(most_profitable(&[]).is_none());
    }

    #[tokio::test]
    async fn lists_only_entrusted_vaults_with_balance() {
        let devnet = Devnet::new(OWNER);
        let sdk = devnet.sdk(ALICE);

        let secret = entrusted_deposit(&sdk, "1").await;
        sdk.deposit(DepositParams::new(TransferType::AnyoneWithPassword, "2"))
            .await
            .unwrap();
        sdk.deposit(DepositParams::new(TransferType::SpecifiedRecipient, "2").recipient(BOB))
            .await
            .unwrap();

        let tasks = sdk.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].identifier, secret.identifier());
        assert_eq!(tasks[0].amount, eth("1"));
        assert_eq!(tasks[0].fee_rate, 50);
        assert_eq!(tasks[0].commission, eth("0.05"));
        assert_eq!(tasks[0].total_reward, tasks[0].commission);
    }

    #[tokio::test]
    async fn trustee_completes_task_by_identifier() {
        let devnet = Devnet::new(OWNER);
        let depositor = devnet.sdk(ALICE);
        let trustee = devnet.sdk(TRUSTEE);
        let secret = entrusted_deposit(&depositor, "1").await;

        let tasks = trustee.list_tasks().await.unwrap();
        let result = trustee
            .complete_task(&tasks[0], tasks[0].identifier)
            .await
            .unwrap();

        assert_eq!(result.identifier, secret.identifier());
        assert_eq!(result.commission, eth("0.05"));
        assert_eq!(result.commission_human, "0.05");
        assert_eq!(result.fee_rate_at_submission, 50);
        assert_eq!(devnet.credited(TRUSTEE).await, eth("0.05"));
        assert_eq!(devnet.credited(BOB).await, eth("0.95"));
        assert!(trustee.list_tasks().await.unwrap().is_empty());

        let view = depositor.get_vault_view(&secret).await.unwrap();
        assert!(view.balance.is_zero());
        assert_eq!(view.withdrawals.len(), 1);
        assert_eq!(view.withdrawals[0].receiver, BOB);
        assert_eq!(view.withdrawals[0].amount, eth("0.95"));
    }

    #[tokio::test]
    async fn completes_with_capability_secret() {
        let devnet = Devnet::new(OWNER);
        let sdk = devnet.sdk(ALICE);
        let secret = entrusted_deposit(&sdk, "0.4").await;

        let tasks = sdk.list_tasks().await.unwrap();
        sdk.complete_task(&tasks[0], &secret).await.unwrap();
        assert_eq!(devnet.credited(BOB).await, eth("0.38"));
    }

    #[tokio::test]
    async fn mismatched_credential_fails_without_network() {
        let devnet = Devnet::new(OWNER);
        let sdk = devnet.sdk(TRUSTEE);
        let task = Task::new(CapabilityId::new(U256::from(42u64)), eth("1"), 50);

        let err = sdk
            .complete_task(&task, CapabilitySecret::random())
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::AuthorizationMismatch));

        let err = sdk
            .complete_task(&task, CapabilityId::new(U256::from(43u64)))
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::AuthorizationMismatch));

        let stats = devnet.stats();
        assert_eq!(stats.connects, 0);
        assert_eq!(stats.network_calls(), 0);
    }

    #[tokio::test]
    async fn ledger_applies_current_fee_rate() {
        let devnet = Devnet::new(OWNER);
        let depositor = devnet.sdk(ALICE);
        let trustee = devnet.sdk(TRUSTEE);
        entrusted_deposit(&depositor, "1").await;

        let tasks = trustee.list_tasks().await.unwrap();
        devnet.sdk(OWNER).change_fee(100).await.unwrap();

        let result = trustee
            .complete_task(&tasks[0], tasks[0].identifier)
            .await
            .unwrap();
        assert_eq!(result.commission, eth("0.05"));
        assert_eq!(result.fee_rate_at_submission, 100);
        assert_eq!(devnet.credited(TRUSTEE).await, eth("0.1"));
        assert_eq!(devnet.credited(BOB).await, eth("0.9"));
    }

    #[tokio::test]
    async fn completing_a_settled_task_reverts() {
        let devnet = Devnet::new(OWNER);
        let sdk = devnet.sdk(TRUSTEE);
        entrusted_deposit(&devnet.sdk(ALICE), "1").await;

        let tasks = sdk.list_tasks().await.unwrap();
        sdk.complete_task(&tasks[0], tasks[0].identifier).await.unwrap();

        let err = sdk
            .complete_task(&tasks[0], tasks[0].identifier)
            .await
            .unwrap_err();
        match err {
            SdkError::ContractCall(reason) => assert_eq!(reason, "vault drained"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn completing_a_non_entrusted_vault_reverts() {
        let devnet = Devnet::new(OWNER);
        let sdk = devnet.sdk(ALICE);
        let secret = sdk
            .deposit(DepositParams::new(TransferType::AnyoneWithPassword, "1"))
            .await
            .unwrap()
            .capability
            .secret;

        let task = Task::new(secret.identifier(), eth("1"), 50);
        let err = sdk.complete_task(&task, &secret).await.unwrap_err();
        match err {
            SdkError::ContractCall(reason) => {
                assert_eq!(reason, "vault is not an entrusted withdrawal")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(devnet.credited(BOB).await, U256::ZERO);
    }

    #[tokio::test]
    async fn watcher_publishes_snapshots() {
        let devnet = Devnet::new(OWNER);
        let sdk = Arc::new(devnet.sdk(TRUSTEE));
        entrusted_deposit(&devnet.sdk(ALICE), "1").await;

        let watcher = TaskWatcher::new(Arc::clone(&sdk)).with_interval(Duration::from_millis(10));
        let mut tasks = watcher.subscribe();
        assert!(tasks.borrow().is_empty());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(watcher.run(shutdown.clone()));

        tasks.changed().await.unwrap();
        assert_eq!(tasks.borrow_and_update().len(), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn failed_sweep_keeps_previous_snapshot() {
        let devnet = Devnet::new(OWNER);
        let sdk = Arc::new(PrivateTransferSdk::new(
            devnet.config(),
            devnet.connector(TRUSTEE).with_failed_connects(1),
        ));
        entrusted_deposit(&devnet.sdk(ALICE), "1").await;

        let watcher = TaskWatcher::new(sdk);
        let tasks = watcher.subscribe();

        watcher.poll_step().await;
        assert!(tasks.borrow().is_empty());
        assert!(!tasks.has_changed().unwrap());

        watcher.poll_step().await;
        assert_eq!(tasks.borrow().len(), 1);
    }
}
