// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process deployment for tests and local development.
//!
//! A [`Devnet`] pairs a [`LocalGateway`] with a [`SimulatedChain`] and hands
//! out SDK instances bound to any account. Every SDK created from the same
//! devnet sees the same vaults.
//!
//! ```rust,ignore
//! let devnet = Devnet::new(owner);
//! let alice = devnet.sdk(alice_address);
//! let deposit = alice
//!     .deposit(DepositParams::new(TransferType::AnyoneWithPassword, "0.5"))
//!     .await?;
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{address, Address, U256};
use async_trait::async_trait;
use tracing::debug;

use crate::blockchain::{SimulatedChain, SimulatedLedger, DEVNET};
use crate::config::SdkConfig;
use crate::error::SdkError;
use crate::gateway::LocalGateway;
use crate::sdk::{Connection, Connector, PrivateTransferSdk};

/// Address the devnet contract lives at.
pub const DEVNET_CONTRACT_ADDRESS: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");

/// Fee rate a new devnet starts with, parts-per-1000.
pub const DEVNET_FEE_RATE: u64 = 50;

/// Call counters of a [`Devnet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DevnetStats {
    pub connects: usize,
    pub encryptions: usize,
    pub decryptions: usize,
    pub submissions: usize,
    pub views: usize,
}

impl DevnetStats {
    /// Gateway and ledger calls combined.
    pub fn network_calls(&self) -> usize {
        self.encryptions + self.decryptions + self.submissions + self.views
    }
}

/// A gateway and a ledger sharing one process.
#[derive(Debug, Clone)]
pub struct Devnet {
    chain: Arc<SimulatedChain>,
    gateway: Arc<LocalGateway>,
    connects: Arc<AtomicUsize>,
}

impl Devnet {
    pub fn new(owner: Address) -> Self {
        Self::with_fee_rate(owner, DEVNET_FEE_RATE)
    }

    pub fn with_fee_rate(owner: Address, fee_rate: u64) -> Self {
        let gateway = Arc::new(LocalGateway::new(DEVNET.chain_id));
        let chain = Arc::new(SimulatedChain::new(
            DEVNET_CONTRACT_ADDRESS,
            owner,
            fee_rate,
            Arc::clone(&gateway),
        ));
        Self {
            chain,
            gateway,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configuration pointing at this devnet.
    pub fn config(&self) -> SdkConfig {
        SdkConfig::for_network(&DEVNET, self.chain.contract_address())
    }

    pub fn chain(&self) -> &Arc<SimulatedChain> {
        &self.chain
    }

    pub fn gateway(&self) -> Arc<LocalGateway> {
        Arc::clone(&self.gateway)
    }

    /// Ledger handle submitting as `account`.
    pub fn ledger(&self, account: Address) -> Arc<SimulatedLedger> {
        Arc::new(SimulatedLedger::new(Arc::clone(&self.chain), account))
    }

    pub fn connector(&self, account: Address) -> DevnetConnector {
        DevnetConnector {
            devnet: self.clone(),
            account,
            connect_delay: None,
            failures_left: AtomicUsize::new(0),
        }
    }

    /// SDK submitting as `account`.
    pub fn sdk(&self, account: Address) -> PrivateTransferSdk {
        PrivateTransferSdk::new(self.config(), self.connector(account))
    }

    pub fn stats(&self) -> DevnetStats {
        DevnetStats {
            connects: self.connects.load(Ordering::SeqCst),
            encryptions: self.gateway.encryptions(),
            decryptions: self.gateway.decryptions(),
            submissions: self.chain.submissions(),
            views: self.chain.views(),
        }
    }

    /// Native value paid out to `account` so far.
    pub async fn credited(&self, account: Address) -> U256 {
        self.chain.credited(account).await
    }

    /// Make the next submission fail before it is assigned a hash.
    pub async fn reject_next_submission(&self, reason: impl Into<String>) {
        self.chain.reject_next_submission(reason).await;
    }
}

/// [`Connector`] for a [`Devnet`] account.
#[derive(Debug)]
pub struct DevnetConnector {
    devnet: Devnet,
    account: Address,
    connect_delay: Option<Duration>,
    failures_left: AtomicUsize,
}

impl DevnetConnector {
    /// Sleep before each connection attempt completes.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Fail the next `count` connection attempts.
    pub fn with_failed_connects(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl Connector for DevnetConnector {
    async fn connect(&self, config: &SdkConfig) -> Result<Connection, SdkError> {
        self.devnet.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SdkError::Initialization("devnet unavailable".to_string()));
        }

        if config.chain_id != self.devnet.gateway.chain_id() {
            return Err(SdkError::Initialization(format!(
                "devnet serves chain {}, configured for {}",
                self.devnet.gateway.chain_id(),
                config.chain_id
            )));
        }
        if config.contract_address != self.devnet.chain.contract_address() {
            return Err(SdkError::Initialization(format!(
                "no contract deployed at {}",
                config.contract_address
            )));
        }

        debug!(account = %self.account, "Connected to devnet");
        Ok(Connection {
            ledger: self.devnet.ledger(self.account),
            gateway: self.devnet.gateway(),
        })
    }
}
