// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM ledger client for the deployed PrivateTransfer contract.

use alloy::{
    contract::Error as ContractError,
    eips::BlockId,
    network::{Ethereum, EthereumWallet},
    primitives::{Address, TxHash, U256},
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, PendingTransactionBuilder, Provider, ProviderBuilder, RootProvider,
    },
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use tracing::{info, warn};

use super::contract::IPrivateTransfer;
use super::ledger::{Ledger, LedgerCall, LedgerError, TaskEntry, VaultHandles, WithdrawalHandles};
use super::types::{PendingTx, TxReceipt};
use crate::capability::CapabilityId;
use crate::gateway::Handle;

/// HTTP provider with the recommended fillers and a local wallet.
type WalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

/// Ledger backed by an EVM JSON-RPC endpoint.
pub struct EvmLedger {
    contract: IPrivateTransfer::IPrivateTransferInstance<WalletProvider>,
    sender: Address,
}

impl EvmLedger {
    /// Connect to `rpc_url`, submitting transactions signed by `signer`.
    pub fn connect(
        rpc_url: &str,
        contract_address: Address,
        signer: PrivateKeySigner,
    ) -> Result<Self, LedgerError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| LedgerError::InvalidRpcUrl(e.to_string()))?;

        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url);

        Ok(Self {
            contract: IPrivateTransfer::new(contract_address, provider),
            sender,
        })
    }
}

impl EvmLedger {
    /// Replay a mined transaction with `eth_call` against the state it ran
    /// on, recovering the revert reason the receipt does not carry.
    async fn revert_reason(&self, tx_hash: TxHash, block_number: Option<u64>) -> Option<String> {
        let parent = BlockId::number(block_number?.saturating_sub(1));
        let provider = self.contract.provider();
        let tx = provider.get_transaction_by_hash(tx_hash).await.ok()??;

        match provider.call(tx.into_request()).block(parent).await {
            Ok(_) => None,
            Err(e) => e.as_error_resp().map(|payload| payload.message.to_string()),
        }
    }
}

/// Node error responses reject the call itself; anything else never reached
/// the contract.
fn classify_send_error(err: ContractError) -> LedgerError {
    match err {
        ContractError::TransportError(e) => match e.as_error_resp() {
            Some(payload) => LedgerError::Reverted(payload.message.to_string()),
            None => LedgerError::Rpc(e.to_string()),
        },
        other => LedgerError::Rpc(other.to_string()),
    }
}

#[async_trait]
impl Ledger for EvmLedger {
    fn contract_address(&self) -> Address {
        *self.contract.address()
    }

    fn sender(&self) -> Address {
        self.sender
    }

    async fn submit(&self, call: LedgerCall) -> Result<PendingTx, LedgerError> {
        let name = call.name();
        let sent = match call {
            LedgerCall::Deposit {
                handles,
                input_proof,
                value,
            } => {
                self.contract
                    .deposit(handles[0].0, handles[1].0, handles[2].0, handles[3].0, input_proof)
                    .value(value)
                    .send()
                    .await
            }
            LedgerCall::Withdraw {
                handles,
                input_proof,
            } => {
                self.contract
                    .withdraw(handles[0].0, handles[1].0, input_proof)
                    .send()
                    .await
            }
            LedgerCall::EntrustWithdraw {
                handle,
                input_proof,
            } => self.contract.entrustWithdraw(handle.0, input_proof).send().await,
            LedgerCall::Refund {
                handle,
                input_proof,
            } => self.contract.refund(handle.0, input_proof).send().await,
            LedgerCall::ChangeFee { fee } => {
                self.contract.changeFee(U256::from(fee)).send().await
            }
        };

        let pending = sent.map_err(|e| {
            warn!(call = name, error = %e, "Transaction rejected");
            classify_send_error(e)
        })?;

        let tx_hash = *pending.tx_hash();
        info!(call = name, tx_hash = %tx_hash, "Transaction submitted");
        Ok(PendingTx { tx_hash })
    }

    async fn await_receipt(&self, pending: &PendingTx) -> Result<TxReceipt, LedgerError> {
        let receipt = PendingTransactionBuilder::new(
            self.contract.provider().root().clone(),
            pending.tx_hash,
        )
        .get_receipt()
        .await
        .map_err(|e| LedgerError::Rpc(format!("Failed to get receipt: {e}")))?;

        if !receipt.status() {
            let reason = self
                .revert_reason(pending.tx_hash, receipt.block_number)
                .await
                .unwrap_or_else(|| format!("transaction {} reverted", pending.tx_hash));
            warn!(tx_hash = %pending.tx_hash, reason = %reason, "Transaction reverted");
            return Err(LedgerError::Reverted(reason));
        }

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or(0),
            gas_used: receipt.gas_used as u64,
            success: true,
        })
    }

    async fn get_vault(&self, identifier: CapabilityId) -> Result<VaultHandles, LedgerError> {
        let vault = self
            .contract
            .getVault(identifier.into_u256())
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        Ok(VaultHandles {
            published: vault.isPublished,
            transfer_type: Handle(vault.transferType),
            balance: Handle(vault.balance),
            capability_address: Handle(vault.passwordAddress),
            depositor: Handle(vault.depositor),
            target_address: Handle(vault.allowAddress),
            withdrawals: vault
                .withdrawal
                .into_iter()
                .map(|w| WithdrawalHandles {
                    receiver: Handle(w.receiver),
                    amount: Handle(w.amount),
                })
                .collect(),
        })
    }

    async fn get_tasks(&self) -> Result<Vec<TaskEntry>, LedgerError> {
        let tasks = self
            .contract
            .getPasswords()
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        Ok(tasks
            .into_iter()
            .filter(|task| !task.amount.is_zero())
            .map(|task| TaskEntry {
                identifier: CapabilityId::new(task.password),
                amount: task.amount,
            })
            .collect())
    }

    async fn fee_rate(&self) -> Result<u64, LedgerError> {
        let fee = self
            .contract
            .fee()
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        u64::try_from(fee).map_err(|_| LedgerError::Rpc(format!("fee rate {fee} out of range")))
    }
}
