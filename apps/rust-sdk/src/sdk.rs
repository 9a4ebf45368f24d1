// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SDK entry point.
//!
//! [`PrivateTransferSdk`] owns the configuration, the registered callbacks
//! and a lazily established [`Connection`] to the encryption gateway and the
//! ledger. The connection is created once per SDK instance; concurrent
//! callers wait on the same in-flight attempt, and a failed attempt leaves
//! the SDK uninitialized so a later call can try again.

use std::fmt;
use std::sync::{Arc, RwLock};

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use crate::blockchain::{signing, EvmLedger, Ledger, LedgerCall, TxReceipt, MAX_FEE_RATE};
use crate::capability::{self, GeneratedCapability};
use crate::config::SdkConfig;
use crate::coordinator::{EventCallbacks, TxLifecycle};
use crate::error::SdkError;
use crate::gateway::{EncryptionGateway, HttpGateway};

/// Established gateway and ledger handles, shared read-only.
#[derive(Clone)]
pub struct Connection {
    pub ledger: Arc<dyn Ledger>,
    pub gateway: Arc<dyn EncryptionGateway>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("contract", &self.ledger.contract_address())
            .field("sender", &self.ledger.sender())
            .finish_non_exhaustive()
    }
}

/// Establishes a [`Connection`] from configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &SdkConfig) -> Result<Connection, SdkError>;
}

/// Connects to an EVM JSON-RPC ledger and an HTTP gateway.
pub struct EvmConnector {
    signer: PrivateKeySigner,
}

impl EvmConnector {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Use the submitter key from `PT_SIGNER_KEY` or `PT_SIGNER_KEY_PATH`.
    pub fn from_env() -> Result<Self, SdkError> {
        Ok(Self::new(signing::load_submitter_signer_from_env()?))
    }
}

#[async_trait]
impl Connector for EvmConnector {
    async fn connect(&self, config: &SdkConfig) -> Result<Connection, SdkError> {
        let ledger = EvmLedger::connect(&config.rpc_url, config.contract_address, self.signer.clone())
            .map_err(|e| SdkError::Initialization(e.to_string()))?;
        let gateway = HttpGateway::new(&config.gateway_url)
            .map_err(|e| SdkError::Initialization(e.to_string()))?;

        Ok(Connection {
            ledger: Arc::new(ledger),
            gateway: Arc::new(gateway),
        })
    }
}

/// Client for PrivateTransfer vaults.
pub struct PrivateTransferSdk {
    config: SdkConfig,
    connector: Box<dyn Connector>,
    connection: OnceCell<Connection>,
    callbacks: RwLock<EventCallbacks>,
}

impl PrivateTransferSdk {
    pub fn new(config: SdkConfig, connector: impl Connector + 'static) -> Self {
        Self {
            config,
            connector: Box::new(connector),
            connection: OnceCell::new(),
            callbacks: RwLock::new(EventCallbacks::default()),
        }
    }

    /// SDK for a live deployment, submitting with `signer`.
    pub fn with_signer(config: SdkConfig, signer: PrivateKeySigner) -> Self {
        Self::new(config, EvmConnector::new(signer))
    }

    /// SDK configured entirely from the environment.
    pub fn from_env() -> Result<Self, SdkError> {
        Ok(Self::new(SdkConfig::from_env()?, EvmConnector::from_env()?))
    }

    /// Establish the connection if it is not established yet.
    pub async fn initialize(&self) -> Result<(), SdkError> {
        self.connection().await.map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.connection.initialized()
    }

    pub(crate) async fn connection(&self) -> Result<&Connection, SdkError> {
        self.connection
            .get_or_try_init(|| async {
                info!(
                    chain_id = self.config.chain_id,
                    contract = %self.config.contract_address,
                    "Initializing SDK connection"
                );
                self.connector.connect(&self.config).await
            })
            .await
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Replace the registered callbacks.
    pub fn set_callbacks(&self, callbacks: EventCallbacks) {
        if let Ok(mut current) = self.callbacks.write() {
            *current = callbacks;
        }
    }

    /// Remove every registered callback.
    pub fn clear_callbacks(&self) {
        self.set_callbacks(EventCallbacks::default());
    }

    pub(crate) fn lifecycle(&self, operation: &'static str) -> TxLifecycle {
        let callbacks = self
            .callbacks
            .read()
            .map(|current| current.clone())
            .unwrap_or_default();
        TxLifecycle::new(callbacks, operation)
    }

    /// Draw a fresh capability.
    pub fn generate_capability(&self) -> GeneratedCapability {
        capability::generate_capability()
    }

    pub fn contract_address(&self) -> Address {
        self.config.contract_address
    }

    /// Account submitting transactions.
    pub async fn signer_address(&self) -> Result<Address, SdkError> {
        Ok(self.connection().await?.ledger.sender())
    }

    /// Change the global fee rate (contract owner only).
    pub async fn change_fee(&self, fee_rate: u64) -> Result<TxReceipt, SdkError> {
        if fee_rate > MAX_FEE_RATE {
            return Err(SdkError::validation(format!(
                "Fee rate must be at most {MAX_FEE_RATE} parts per thousand"
            )));
        }

        let mut lifecycle = self.lifecycle("changeFee");
        let outcome = self.change_fee_inner(&mut lifecycle, fee_rate).await;
        lifecycle.finish(outcome)
    }

    async fn change_fee_inner(
        &self,
        lifecycle: &mut TxLifecycle,
        fee_rate: u64,
    ) -> Result<TxReceipt, SdkError> {
        let connection = self.connection().await?;
        let receipt = lifecycle
            .submit(connection.ledger.as_ref(), LedgerCall::ChangeFee { fee: fee_rate })
            .await?;
        info!(fee_rate, tx_hash = %receipt.tx_hash, "Fee rate changed");
        Ok(receipt)
    }
}
