//! Building batches out of the transfer pool, and collecting validator signatures over them.

use std::{cmp::Ordering, collections::BinaryHeap};

use alloy::{
    primitives::{Address, B256, U256},
    sol_types::SolValue,
};
use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    address,
    capabilities::PowerSource,
    codec::Codec,
    crypto::{self, keccak256},
    error::{PeggyError, Result},
    keys::{
        batch_confirm_key, batch_confirm_prefix, batch_key, claim_prefix, denom_batch_key,
        denom_batch_prefix, trailing_u64,
    },
    pool::{self, OutgoingTransfer, TransferStatus},
    replay::{insert_unique, next_batch_nonce},
    store::KvStore,
    types::AccountId,
};

/// A batch of transfers in a single denomination, submitted to Ethereum as one transaction. Never modified after it
/// is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub nonce: u64,
    pub denom: String,
    pub transfers: Vec<OutgoingTransfer>,
    /// The ledger height the batch was built at.
    pub height: u64,
}

impl Batch {
    pub fn total_fees(&self) -> u128 {
        self.transfers
            .iter()
            .fold(0u128, |total, t| total.saturating_add(t.bridge_fee.amount))
    }

    /// The digest validators sign: Keccak-256 over the ABI encoding of `(uint256 nonce, string denom, uint256[]
    /// amounts, address[] destinations, uint256[] fees)`.
    pub fn checkpoint(&self) -> B256 {
        let amounts: Vec<U256> = self
            .transfers
            .iter()
            .map(|t| U256::from(t.amount.amount))
            .collect();
        let destinations: Vec<Address> = self
            .transfers
            .iter()
            .map(|t| t.dest_address.into_inner())
            .collect();
        let fees: Vec<U256> = self
            .transfers
            .iter()
            .map(|t| U256::from(t.bridge_fee.amount))
            .collect();
        keccak256(
            (
                U256::from(self.nonce),
                self.denom.clone(),
                amounts,
                destinations,
                fees,
            )
                .abi_encode_params(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfirmation {
    pub nonce: u64,
    pub validator: AccountId,
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
}

/// A pending transfer competing for a place in a batch. The highest fee wins; equal fees go to the earlier transfer.
#[derive(Debug)]
struct Candidate {
    fee: u128,
    id: u64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fee
            .cmp(&other.fee)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl From<&OutgoingTransfer> for Candidate {
    fn from(transfer: &OutgoingTransfer) -> Self {
        Candidate {
            fee: transfer.bridge_fee.amount,
            id: transfer.id,
        }
    }
}

/// Options for [build_batch], from [crate::cfg::PeggyConfig].
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub max_batch_size: usize,
    pub single_open_batch_per_denom: bool,
}

/// Moves up to `max_batch_size` of the best-paying pending transfers in `denom` into a new batch with the next nonce.
pub fn build_batch<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    denom: &str,
    requester: &AccountId,
    policy: BatchPolicy,
    height: u64,
) -> Result<Batch> {
    if policy.max_batch_size == 0 {
        return Err(PeggyError::InvalidParams("max_batch_size must be greater than zero"));
    }
    if policy.single_open_batch_per_denom {
        if let Some(nonce) = open_batches(store, denom).first() {
            return Err(PeggyError::BatchAlreadyOpen {
                denom: denom.to_owned(),
                nonce: *nonce,
            });
        }
    }

    let mut ready = BinaryHeap::new();
    for transfer in pool::list_pending(codec, store, denom) {
        ready.push(Candidate::from(&transfer?));
    }
    if ready.is_empty() {
        return Err(PeggyError::EmptyBatch(denom.to_owned()));
    }

    let nonce = next_batch_nonce(codec, store)?;
    let mut transfers = Vec::with_capacity(policy.max_batch_size.min(ready.len()));
    while transfers.len() < policy.max_batch_size {
        let Some(Candidate { id, .. }) = ready.pop() else {
            break;
        };
        let transfer = pool::remove(codec, store, denom, id)?;
        pool::set_status(codec, store, id, TransferStatus::Batched { nonce })?;
        transfers.push(transfer);
    }

    let batch = Batch {
        nonce,
        denom: denom.to_owned(),
        transfers,
        height,
    };
    codec.put(store, batch_key(nonce), &batch)?;
    store.set(denom_batch_key(denom, nonce), Vec::new());
    info!(
        nonce,
        denom,
        %requester,
        transfers = batch.transfers.len(),
        left_in_pool = ready.len(),
        total_fees = batch.total_fees(),
        "batch built"
    );
    Ok(batch)
}

pub fn get_batch<S: KvStore + ?Sized>(codec: &Codec, store: &S, nonce: u64) -> Result<Batch> {
    codec
        .get(store, &batch_key(nonce))?
        .ok_or_else(|| PeggyError::NotFound(format!("batch {nonce}")))
}

/// Nonces of the unobserved batches in `denom`, ascending.
pub fn open_batches<S: KvStore + ?Sized>(store: &S, denom: &str) -> Vec<u64> {
    store
        .prefix_iter(&denom_batch_prefix(denom))
        .filter_map(|(key, _)| trailing_u64(&key))
        .collect()
}

/// Records a validator's signature over a batch. If `verify` is set, the signature must recover to the validator's
/// currently bound address.
pub fn confirm<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    nonce: u64,
    validator: &AccountId,
    signature: &[u8],
    verify: bool,
) -> Result<()> {
    let batch = get_batch(codec, store, nonce)?;
    let key = batch_confirm_key(nonce, validator);
    if store.has(&key) {
        return Err(duplicate(nonce, validator));
    }
    if verify {
        let address = address::resolve(codec, store, validator)?
            .ok_or_else(|| PeggyError::UnboundValidator(validator.clone()))?;
        crypto::verify_signer(&batch.checkpoint(), signature, address)
            .map_err(|e| PeggyError::confirmation(validator, e))?;
    }

    let confirmation = BatchConfirmation {
        nonce,
        validator: validator.clone(),
        signature: signature.to_vec(),
    };
    insert_unique(store, key, codec.encode(&confirmation)?, || {
        duplicate(nonce, validator)
    })?;
    debug!(nonce, %validator, "batch confirmation stored");
    Ok(())
}

fn duplicate(nonce: u64, validator: &AccountId) -> PeggyError {
    PeggyError::DuplicateConfirmation {
        key: format!("batch {nonce}"),
        validator: validator.clone(),
    }
}

pub fn confirmations<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &S,
    nonce: u64,
) -> Result<Vec<BatchConfirmation>> {
    store
        .prefix_iter(&batch_confirm_prefix(nonce))
        .map(|(_, value)| codec.decode(&value))
        .collect()
}

/// The current power of the validators that signed the batch, and the current total bonded power.
pub fn confirmed_power<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &S,
    power: &dyn PowerSource,
    nonce: u64,
) -> Result<(u64, u64)> {
    get_batch(codec, store, nonce)?;
    let confirmed = confirmations(codec, store, nonce)?
        .iter()
        .map(|c| power.last_power(&c.validator))
        .fold(0u64, u64::saturating_add);
    Ok((confirmed, power.total_power()))
}

/// Deletes a batch together with its confirmations and claims. The transfers it carried are left to the caller.
pub(crate) fn discard<S: KvStore + ?Sized>(store: &mut S, batch: &Batch) {
    let keys: Vec<_> = store
        .prefix_iter(&batch_confirm_prefix(batch.nonce))
        .chain(store.prefix_iter(&claim_prefix(batch.nonce)))
        .map(|(key, _)| key)
        .collect();
    for key in &keys {
        store.delete(key);
    }
    store.delete(&batch_key(batch.nonce));
    store.delete(&denom_batch_key(&batch.denom, batch.nonce));
    trace!(nonce = batch.nonce, deleted = keys.len() + 2, "batch discarded");
}
