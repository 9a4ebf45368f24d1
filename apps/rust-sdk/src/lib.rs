// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Private Transfer SDK - Password-Capability Vaults
//!
//! Lock native value in a vault whose every field is encrypted by a
//! confidential-compute gateway. Access is granted by a capability: a
//! secp256k1 keypair whose private half is the vault's password. The
//! capability's hash identifies the vault; its signature authorizes
//! decryption of the vault's fields.
//!
//! ## Modules
//!
//! - `sdk` - Entry point, lazy connection, callback registration
//! - `transfer` - Deposit, withdraw and refund
//! - `vault` - Decrypted vault views and the vault bookkeeping rules
//! - `market` - Bounty tasks for entrusted withdrawals
//! - `capability` - Capability generation and decryption authorization
//! - `policy` - Transfer types and access policies
//! - `coordinator` - Transaction lifecycle and callbacks
//! - `gateway` - Encryption Gateway interface and clients
//! - `blockchain` - Ledger interface, EVM client and simulated ledger
//! - `devnet` - In-process gateway and ledger for tests and development
//! - `config` - Environment configuration
//! - `telemetry` - Tracing subscriber setup

pub mod blockchain;
pub mod capability;
pub mod config;
pub mod coordinator;
pub mod devnet;
pub mod error;
pub mod gateway;
pub mod market;
pub mod policy;
pub mod sdk;
pub mod telemetry;
pub mod transfer;
pub mod vault;

pub use capability::{generate_capability, CapabilityId, CapabilitySecret, GeneratedCapability};
pub use config::SdkConfig;
pub use coordinator::EventCallbacks;
pub use devnet::Devnet;
pub use error::{ErrorKind, SdkError};
pub use market::{CompleteResult, Task, TaskCredential, TaskWatcher};
pub use policy::{TransferPolicy, TransferType};
pub use sdk::{Connection, Connector, EvmConnector, PrivateTransferSdk};
pub use transfer::{DepositParams, DepositResult, RefundResult, WithdrawResult};
pub use vault::{VaultView, WithdrawalView};
