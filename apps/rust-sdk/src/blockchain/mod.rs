// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger integration for the PrivateTransfer contract.
//!
//! This module provides:
//! - The [`Ledger`] interface consumed by the SDK
//! - An alloy-based client for the deployed contract (`client`)
//! - An in-process ledger enforcing the same rules (`simulated`)
//! - Submitter key loading and amount formatting

pub mod client;
pub mod contract;
pub mod ledger;
pub mod signing;
pub mod simulated;
pub mod types;

pub use client::EvmLedger;
pub use ledger::{Ledger, LedgerCall, LedgerError, TaskEntry, VaultHandles, WithdrawalHandles};
pub use simulated::{SimulatedChain, SimulatedLedger, MAX_FEE_RATE};
pub use types::*;
