// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process encryption gateway.
//!
//! Plaintexts never leave the process; handles are keccak digests that
//! reference them. The gateway enforces the same rules as a real one:
//! input proofs are bound to `(contract, sender)`, and a handle can only be
//! decrypted by an account on its access list presenting a valid signed
//! request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{keccak256, Address, Bytes, B256};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{EncryptedInput, EncryptedPayload, EncryptionGateway, GatewayError, Handle, Plaintext};
use crate::capability::SignedDecryptionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Client-side input, accepted as a call argument from this sender only.
    /// Inputs may be resubmitted; the contract rejects replays it cares about.
    Input { sender: Address },
    /// Value computed and stored by the contract.
    Sealed,
}

#[derive(Debug, Clone)]
struct Ciphertext {
    value: Plaintext,
    contract: Address,
    readers: Vec<Address>,
    origin: Origin,
}

#[derive(Debug, Default)]
struct GatewayState {
    ciphertexts: HashMap<Handle, Ciphertext>,
    nonce: u64,
}

impl GatewayState {
    fn mint(&mut self, contract: Address, salt: Address, index: usize) -> Handle {
        self.nonce += 1;
        let mut preimage = Vec::with_capacity(56);
        preimage.extend_from_slice(contract.as_slice());
        preimage.extend_from_slice(salt.as_slice());
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        preimage.extend_from_slice(&(index as u64).to_be_bytes());
        Handle(keccak256(&preimage))
    }
}

/// Gateway running inside the current process.
#[derive(Debug)]
pub struct LocalGateway {
    chain_id: u64,
    state: Mutex<GatewayState>,
    encryptions: AtomicUsize,
    decryptions: AtomicUsize,
}

impl LocalGateway {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(GatewayState::default()),
            encryptions: AtomicUsize::new(0),
            decryptions: AtomicUsize::new(0),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Number of `encrypt` calls served.
    pub fn encryptions(&self) -> usize {
        self.encryptions.load(Ordering::SeqCst)
    }

    /// Number of `decrypt` calls served.
    pub fn decryptions(&self) -> usize {
        self.decryptions.load(Ordering::SeqCst)
    }

    /// Verify an input proof and return the plaintexts behind its handles.
    ///
    /// Used by the ledger when a call carrying encrypted inputs executes.
    pub async fn open_inputs(
        &self,
        contract: Address,
        sender: Address,
        handles: &[Handle],
        input_proof: &Bytes,
    ) -> Result<Vec<Plaintext>, GatewayError> {
        if input_proof.as_ref() != input_proof_for(contract, sender, handles).as_slice() {
            return Err(GatewayError::InvalidInput(
                "input proof does not match contract and sender".to_string(),
            ));
        }

        let state = self.state.lock().await;
        handles
            .iter()
            .map(|handle| {
                let ciphertext = state
                    .ciphertexts
                    .get(handle)
                    .ok_or(GatewayError::UnknownHandle(*handle))?;
                if ciphertext.contract != contract || ciphertext.origin != (Origin::Input { sender }) {
                    return Err(GatewayError::InvalidInput(format!(
                        "handle {handle} is not an input of this sender"
                    )));
                }
                Ok(ciphertext.value)
            })
            .collect()
    }

    /// Store a contract-computed value readable by `readers`.
    pub async fn seal(&self, contract: Address, value: Plaintext, readers: &[Address]) -> Handle {
        let mut state = self.state.lock().await;
        let handle = state.mint(contract, Address::ZERO, 0);
        state.ciphertexts.insert(
            handle,
            Ciphertext {
                value,
                contract,
                readers: readers.to_vec(),
                origin: Origin::Sealed,
            },
        );
        handle
    }
}

/// Proof binding input handles to a contract and sender.
fn input_proof_for(contract: Address, sender: Address, handles: &[Handle]) -> B256 {
    let mut preimage = Vec::with_capacity(40 + handles.len() * 32);
    preimage.extend_from_slice(contract.as_slice());
    preimage.extend_from_slice(sender.as_slice());
    for handle in handles {
        preimage.extend_from_slice(handle.0.as_slice());
    }
    keccak256(&preimage)
}

#[async_trait]
impl EncryptionGateway for LocalGateway {
    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedPayload, GatewayError> {
        self.encryptions.fetch_add(1, Ordering::SeqCst);
        if input.is_empty() {
            return Err(GatewayError::InvalidInput("no values to encrypt".to_string()));
        }

        let mut state = self.state.lock().await;
        let handles: Vec<Handle> = input
            .values()
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let handle = state.mint(input.contract(), input.sender(), index);
                state.ciphertexts.insert(
                    handle,
                    Ciphertext {
                        value: *value,
                        contract: input.contract(),
                        readers: Vec::new(),
                        origin: Origin::Input {
                            sender: input.sender(),
                        },
                    },
                );
                handle
            })
            .collect();

        let proof = input_proof_for(input.contract(), input.sender(), &handles);
        debug!(count = handles.len(), "Encrypted input");
        Ok(EncryptedPayload {
            handles,
            input_proof: Bytes::copy_from_slice(proof.as_slice()),
        })
    }

    async fn decrypt(
        &self,
        request: &SignedDecryptionRequest,
    ) -> Result<HashMap<Handle, Plaintext>, GatewayError> {
        self.decryptions.fetch_add(1, Ordering::SeqCst);

        let now = Utc::now().timestamp().max(0) as u64;
        let reader = request
            .verify(now)
            .map_err(|rejection| GatewayError::Unauthorized(rejection.to_string()))?;
        if request.request.chain_id != self.chain_id {
            return Err(GatewayError::Unauthorized(format!(
                "request is for chain {}, gateway serves {}",
                request.request.chain_id, self.chain_id
            )));
        }

        let state = self.state.lock().await;
        let mut values = HashMap::with_capacity(request.request.handles.len());
        for handle in &request.request.handles {
            let ciphertext = state
                .ciphertexts
                .get(handle)
                .ok_or(GatewayError::UnknownHandle(*handle))?;
            if ciphertext.contract != request.request.contract_address
                || !ciphertext.readers.contains(&reader)
            {
                return Err(GatewayError::Unauthorized(format!(
                    "{reader} may not decrypt {handle}"
                )));
            }
            values.insert(*handle, ciphertext.value);
        }

        debug!(count = values.len(), "Decrypted handles");
        Ok(values)
    }
}
