// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction coordinator.
//!
//! Every ledger-mutating operation runs through a [`TxLifecycle`]: submit,
//! observe the pending transaction, await the receipt. Registered callbacks
//! see `on_submitted` at most once and first, then exactly one of
//! `on_confirmed` or `on_error`. Nothing is retried.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::TxHash;
use tracing::{info, warn};

use crate::blockchain::{Ledger, LedgerCall, PendingTx, TxReceipt};
use crate::error::SdkError;

type SubmittedHook = Arc<dyn Fn(TxHash) + Send + Sync>;
type ConfirmedHook = Arc<dyn Fn(&TxReceipt) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&SdkError) + Send + Sync>;

/// Optional notification hooks for mutating operations.
#[derive(Clone, Default)]
pub struct EventCallbacks {
    on_submitted: Option<SubmittedHook>,
    on_confirmed: Option<ConfirmedHook>,
    on_error: Option<ErrorHook>,
}

impl EventCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_submitted(mut self, hook: impl Fn(TxHash) + Send + Sync + 'static) -> Self {
        self.on_submitted = Some(Arc::new(hook));
        self
    }

    pub fn on_confirmed(mut self, hook: impl Fn(&TxReceipt) + Send + Sync + 'static) -> Self {
        self.on_confirmed = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&SdkError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    fn submitted(&self, tx_hash: TxHash) {
        if let Some(hook) = &self.on_submitted {
            hook(tx_hash);
        }
    }

    fn confirmed(&self, receipt: &TxReceipt) {
        if let Some(hook) = &self.on_confirmed {
            hook(receipt);
        }
    }

    fn error(&self, err: &SdkError) {
        if let Some(hook) = &self.on_error {
            hook(err);
        }
    }
}

impl fmt::Debug for EventCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCallbacks")
            .field("on_submitted", &self.on_submitted.is_some())
            .field("on_confirmed", &self.on_confirmed.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Results that carry the receipt of their transaction.
pub trait Confirmed {
    fn receipt(&self) -> &TxReceipt;
}

impl Confirmed for TxReceipt {
    fn receipt(&self) -> &TxReceipt {
        self
    }
}

/// One mutating operation's view of the callbacks.
///
/// Created after local validation succeeds; the operation then routes
/// every outcome through [`TxLifecycle::finish`] so the terminal hook fires
/// exactly once, after any post-confirmation reads.
pub struct TxLifecycle {
    callbacks: EventCallbacks,
    operation: &'static str,
    submitted: Option<TxHash>,
}

impl TxLifecycle {
    pub fn new(callbacks: EventCallbacks, operation: &'static str) -> Self {
        Self {
            callbacks,
            operation,
            submitted: None,
        }
    }

    /// Hash of the submitted transaction, once there is one.
    pub fn submitted(&self) -> Option<TxHash> {
        self.submitted
    }

    /// Submit a call and wait for its receipt.
    pub async fn submit(
        &mut self,
        ledger: &dyn Ledger,
        call: LedgerCall,
    ) -> Result<TxReceipt, SdkError> {
        let pending: PendingTx = ledger.submit(call).await?;
        if self.submitted.is_none() {
            self.submitted = Some(pending.tx_hash);
            self.callbacks.submitted(pending.tx_hash);
        }

        let receipt = ledger.await_receipt(&pending).await?;
        info!(
            operation = self.operation,
            tx_hash = %receipt.tx_hash,
            block_number = receipt.block_number,
            "Transaction confirmed"
        );
        Ok(receipt)
    }

    /// Fire the terminal hook for `outcome` and hand it back.
    pub fn finish<T: Confirmed>(self, outcome: Result<T, SdkError>) -> Result<T, SdkError> {
        match &outcome {
            Ok(result) => self.callbacks.confirmed(result.receipt()),
            Err(err) => {
                warn!(
                    operation = self.operation,
                    submitted = self.submitted.is_some(),
                    error_code = err.error_code(),
                    "Operation failed"
                );
                self.callbacks.error(err);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::blockchain::DEVNET;
    use crate::devnet::Devnet;
    use alloy::primitives::Address;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn callbacks(self: &Arc<Self>) -> EventCallbacks {
            let submitted = Arc::clone(self);
            let confirmed = Arc::clone(self);
            let failed = Arc::clone(self);
            EventCallbacks::new()
                .on_submitted(move |_| submitted.push("submitted"))
                .on_confirmed(move |_| confirmed.push("confirmed"))
                .on_error(move |_| failed.push("error"))
        }

        fn push(&self, event: &str) {
            self.events.lock().unwrap().push(event.to_string());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn confirmed_after_submitted() {
        let owner = Address::repeat_byte(0x01);
        let devnet = Devnet::new(owner);
        let ledger = devnet.ledger(owner);
        let recorder = Arc::new(Recorder::default());

        let mut lifecycle = TxLifecycle::new(recorder.callbacks(), "changeFee");
        let outcome = lifecycle
            .submit(ledger.as_ref(), LedgerCall::ChangeFee { fee: 20 })
            .await;
        let receipt = lifecycle.finish(outcome).unwrap();

        assert!(receipt.success);
        assert_eq!(recorder.events(), vec!["submitted", "confirmed"]);
        assert_eq!(ledger.fee_rate().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn reverted_transaction_reports_error_after_submitted() {
        let owner = Address::repeat_byte(0x01);
        let devnet = Devnet::new(owner);
        let stranger = devnet.ledger(Address::repeat_byte(0x02));
        let recorder = Arc::new(Recorder::default());

        let mut lifecycle = TxLifecycle::new(recorder.callbacks(), "changeFee");
        let outcome = lifecycle
            .submit(stranger.as_ref(), LedgerCall::ChangeFee { fee: 20 })
            .await;
        let err = lifecycle.finish(outcome).unwrap_err();

        assert!(matches!(err, SdkError::ContractCall(_)));
        assert_eq!(recorder.events(), vec!["submitted", "error"]);
    }

    #[tokio::test]
    async fn rejected_submission_reports_error_only() {
        let owner = Address::repeat_byte(0x01);
        let devnet = Devnet::new(owner);
        devnet.reject_next_submission("nonce too low").await;
        let ledger = devnet.ledger(owner);
        let recorder = Arc::new(Recorder::default());

        let mut lifecycle = TxLifecycle::new(recorder.callbacks(), "changeFee");
        let outcome = lifecycle
            .submit(ledger.as_ref(), LedgerCall::ChangeFee { fee: 20 })
            .await;
        assert!(lifecycle.submitted().is_none());
        let err = lifecycle.finish(outcome).unwrap_err();

        assert_eq!(err.to_string(), "Contract call failed: nonce too low");
        assert_eq!(recorder.events(), vec!["error"]);
        assert_eq!(DEVNET.chain_id, devnet.config().chain_id);
    }

    #[test]
    fn debug_lists_registered_hooks() {
        let callbacks = EventCallbacks::new().on_error(|_| {});
        let printed = format!("{callbacks:?}");
        assert!(printed.contains("on_error: true"));
        assert!(printed.contains("on_submitted: false"));
    }
}
