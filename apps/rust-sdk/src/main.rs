// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `private-transfer` command-line client.
//!
//! Configuration comes from the environment (see the `config` module). The
//! submitting account is read from `PT_SIGNER_KEY` or `PT_SIGNER_KEY_PATH`.
//!
//! ```bash
//! private-transfer generate
//! private-transfer deposit --type specified-recipient --amount 0.5 --recipient 0x...
//! private-transfer withdraw --password 0x... --amount 0.2
//! private-transfer vault --password 0x...
//! private-transfer tasks --watch
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use private_transfer_sdk::blockchain::{TxReceipt, DEVNET, NATIVE_SYMBOL, SEPOLIA};
use private_transfer_sdk::telemetry::init_tracing;
use private_transfer_sdk::{
    generate_capability, CapabilityId, CapabilitySecret, DepositParams, EventCallbacks,
    PrivateTransferSdk, SdkError, TaskWatcher, TransferType, VaultView,
};

#[derive(Parser)]
#[command(name = "private-transfer")]
#[command(about = "Password-capability vaults on an encrypted ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a capability without depositing
    Generate,
    /// Lock value in a new vault
    Deposit {
        /// Transfer type: specified-recipient, anyone-with-password,
        /// entrusted-withdrawal (or 1, 2, 3)
        #[arg(short, long = "type")]
        transfer_type: TransferType,
        /// Amount in the native unit, e.g. 0.5
        #[arg(short, long)]
        amount: String,
        /// Recipient for specified-recipient and entrusted-withdrawal
        #[arg(short, long)]
        recipient: Option<Address>,
    },
    /// Withdraw from a vault to the submitting account
    Withdraw {
        /// Capability private key (hex)
        #[arg(short, long)]
        password: String,
        /// Amount in the native unit
        #[arg(short, long)]
        amount: String,
    },
    /// Return the remaining balance to the depositor
    Refund {
        /// Capability private key (hex)
        #[arg(short, long)]
        password: String,
    },
    /// Show the decrypted vault
    Vault {
        /// Capability private key (hex)
        #[arg(short, long)]
        password: String,
    },
    /// List open entrusted-withdrawal tasks
    Tasks {
        /// Keep polling until interrupted
        #[arg(short, long)]
        watch: bool,
        /// Seconds between polls when watching
        #[arg(short, long, default_value_t = 30)]
        interval: u64,
    },
    /// Complete an entrusted-withdrawal task
    Complete {
        /// Task identifier (hex or decimal)
        identifier: CapabilityId,
    },
    /// Show or change the fee rate (parts per 1000)
    Fee {
        /// New fee rate (contract owner only)
        #[arg(long)]
        set: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error[{}]: {e}", e.error_code());
            ExitCode::FAILURE
        }
    }
}

/// SDK from the environment, logging submitted transactions.
fn connect() -> Result<PrivateTransferSdk, SdkError> {
    let sdk = PrivateTransferSdk::from_env()?;
    sdk.set_callbacks(
        EventCallbacks::new()
            .on_submitted(|tx_hash| info!(tx_hash = %tx_hash, "Transaction submitted")),
    );
    Ok(sdk)
}

async fn run(command: Commands) -> Result<(), SdkError> {
    match command {
        Commands::Generate => {
            let capability = generate_capability();
            println!("address:     {}", capability.address);
            println!("identifier:  {}", capability.identifier);
            println!("password:    {}", capability.secret.expose_hex());
        }
        Commands::Deposit {
            transfer_type,
            amount,
            recipient,
        } => {
            let mut params = DepositParams::new(transfer_type, amount);
            if let Some(recipient) = recipient {
                params = params.recipient(recipient);
            }
            let sdk = connect()?;
            let result = sdk.deposit(params).await?;
            print_receipt(&sdk, &result.receipt);
            println!("deposited:   {} {NATIVE_SYMBOL}", result.amount_human);
            println!("policy:      {}", result.policy.transfer_type());
            println!("target:      {}", result.target_address);
            println!("identifier:  {}", result.capability.identifier);
            println!("password:    {}", result.capability.secret.expose_hex());
            println!("Store the password now. It cannot be recovered.");
        }
        Commands::Withdraw { password, amount } => {
            let secret = CapabilitySecret::from_hex(&password)?;
            let sdk = connect()?;
            let result = sdk.withdraw(&secret, &amount).await?;
            print_receipt(&sdk, &result.receipt);
            println!("withdrawn:   {} {NATIVE_SYMBOL}", result.amount_human);
        }
        Commands::Refund { password } => {
            let secret = CapabilitySecret::from_hex(&password)?;
            let sdk = connect()?;
            let result = sdk.refund(&secret).await?;
            print_receipt(&sdk, &result.receipt);
            println!("refunded:    {} {NATIVE_SYMBOL}", result.amount_human);
        }
        Commands::Vault { password } => {
            let secret = CapabilitySecret::from_hex(&password)?;
            let sdk = connect()?;
            print_vault(&sdk.get_vault_view(&secret).await?);
        }
        Commands::Tasks { watch, interval } => {
            let sdk = connect()?;
            if watch {
                watch_tasks(sdk, Duration::from_secs(interval.max(1))).await;
            } else {
                let tasks = sdk.list_tasks().await?;
                if tasks.is_empty() {
                    println!("No tasks available");
                }
                for task in &tasks {
                    println!(
                        "{}  amount {} {NATIVE_SYMBOL}  reward {} {NATIVE_SYMBOL}",
                        task.identifier,
                        task.amount_human(),
                        task.total_reward_human()
                    );
                }
            }
        }
        Commands::Complete { identifier } => {
            let sdk = connect()?;
            let tasks = sdk.list_tasks().await?;
            let task = tasks
                .iter()
                .find(|task| task.identifier == identifier)
                .ok_or(SdkError::NotFound)?;
            let result = sdk.complete_task(task, identifier).await?;
            print_receipt(&sdk, &result.receipt);
            println!(
                "commission:  {} {NATIVE_SYMBOL} (estimate at {} / 1000)",
                result.commission_human, task.fee_rate
            );
        }
        Commands::Fee { set } => {
            let sdk = connect()?;
            match set {
                Some(fee_rate) => {
                    let receipt = sdk.change_fee(fee_rate).await?;
                    print_receipt(&sdk, &receipt);
                    println!("fee rate:    {fee_rate} / 1000");
                }
                None => println!("fee rate:    {} / 1000", sdk.fee_rate().await?),
            }
        }
    }

    Ok(())
}

async fn watch_tasks(sdk: PrivateTransferSdk, interval: Duration) {
    let watcher = TaskWatcher::new(Arc::new(sdk)).with_interval(interval);
    let mut tasks = watcher.subscribe();
    let shutdown = CancellationToken::new();
    let poller = tokio::spawn(watcher.run(shutdown.clone()));

    loop {
        tokio::select! {
            changed = tasks.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = tasks.borrow_and_update().clone();
                println!("{} task(s) available", snapshot.len());
                for task in &snapshot {
                    println!("  {}  reward {} {NATIVE_SYMBOL}", task.identifier, task.total_reward_human());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                shutdown.cancel();
                break;
            }
        }
    }

    let _ = poller.await;
}

fn explorer_link(sdk: &PrivateTransferSdk, tx_hash: &TxHash) -> Option<String> {
    [SEPOLIA, DEVNET]
        .iter()
        .find(|network| network.chain_id == sdk.config().chain_id)
        .and_then(|network| network.tx_url(tx_hash))
}

fn print_receipt(sdk: &PrivateTransferSdk, receipt: &TxReceipt) {
    println!("tx:          {}", receipt.tx_hash);
    println!("block:       {}", receipt.block_number);
    if let Some(link) = explorer_link(sdk, &receipt.tx_hash) {
        println!("explorer:    {link}");
    }
}

fn print_vault(view: &VaultView) {
    println!("published:   {}", view.published);
    println!("policy:      {}", view.policy.transfer_type());
    if let Some(recipient) = view.policy.recipient() {
        println!("recipient:   {recipient}");
    }
    println!("balance:     {} {NATIVE_SYMBOL}", view.balance_human);
    println!("depositor:   {}", view.depositor);
    println!("capability:  {}", view.capability_address);
    for (index, record) in view.withdrawals.iter().enumerate() {
        println!(
            "withdrawal {index}: {} {NATIVE_SYMBOL} to {}",
            record.amount_human, record.receiver
        );
    }
}
