//! Oracle attestations that a batch was executed on Ethereum.
//!
//! Each validator claims a batch at most once. When the claimers hold at least two thirds of the bonded power, the batch
//! is finalized: it moves to the observed-batch log, its transfers are marked observed, and any older batch in the same
//! denomination that is still open is broken up so its transfers can be batched again. The Ethereum contract only
//! accepts increasing nonces, so those older batches can never execute.

use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    batch::{self, Batch},
    capabilities::PowerSource,
    codec::Codec,
    error::{PeggyError, Result},
    keys::{claim_key, claim_prefix, observed_batch_key},
    pool::{self, TransferStatus},
    replay::insert_unique,
    store::KvStore,
    types::AccountId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub nonce: u64,
    pub validator: AccountId,
    pub height: u64,
}

/// An entry in the audit log of finalized batches. Written once and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedBatch {
    pub batch: Batch,
    pub claimed_power: u64,
    pub total_power: u64,
    /// The ledger height the batch was finalized at.
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim was stored; the batch is not yet finalized.
    Recorded { claimed: u64, total: u64 },
    /// This claim finalized the batch.
    Finalized {
        claimed: u64,
        total: u64,
        /// Older batches in the same denomination that were broken up.
        superseded: Vec<u64>,
        /// Transfers returned to the pool from those batches.
        requeued: usize,
    },
    /// The batch had already been finalized. Nothing was stored.
    AlreadyFinalized,
}

pub fn supermajority(claimed: u64, total: u64) -> bool {
    total > 0 && u128::from(claimed) * 3 >= u128::from(total) * 2
}

pub fn claim_observed<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    power: &dyn PowerSource,
    nonce: u64,
    validator: &AccountId,
    height: u64,
) -> Result<ClaimOutcome> {
    if store.has(&observed_batch_key(nonce)) {
        trace!(nonce, %validator, "claim for finalized batch ignored");
        return Ok(ClaimOutcome::AlreadyFinalized);
    }
    let batch = batch::get_batch(codec, store, nonce)?;

    let claim = Claim {
        nonce,
        validator: validator.clone(),
        height,
    };
    insert_unique(store, claim_key(nonce, validator), codec.encode(&claim)?, || {
        PeggyError::DuplicateClaim {
            nonce,
            validator: validator.clone(),
        }
    })?;

    let claimed = claims(codec, store, nonce)?
        .iter()
        .map(|c| power.last_power(&c.validator))
        .fold(0u64, u64::saturating_add);
    let total = power.total_power();
    let supermajority_reached = supermajority(claimed, total);
    trace!(
        nonce,
        %validator,
        claimed,
        total,
        supermajority_reached,
        "storing claim"
    );
    if !supermajority_reached {
        return Ok(ClaimOutcome::Recorded { claimed, total });
    }

    let (superseded, requeued) = finalize(codec, store, batch, claimed, total, height)?;
    Ok(ClaimOutcome::Finalized {
        claimed,
        total,
        superseded,
        requeued,
    })
}

fn finalize<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    batch: Batch,
    claimed_power: u64,
    total_power: u64,
    height: u64,
) -> Result<(Vec<u64>, usize)> {
    let nonce = batch.nonce;
    for transfer in &batch.transfers {
        pool::set_status(codec, store, transfer.id, TransferStatus::Observed { nonce })?;
    }
    batch::discard(store, &batch);

    let superseded: Vec<u64> = batch::open_batches(store, &batch.denom)
        .into_iter()
        .take_while(|n| *n < nonce)
        .collect();
    let mut requeued = 0;
    for old in &superseded {
        let old = batch::get_batch(codec, store, *old)?;
        for transfer in &old.transfers {
            pool::requeue(codec, store, transfer)?;
        }
        requeued += old.transfers.len();
        batch::discard(store, &old);
    }

    info!(
        nonce,
        denom = %batch.denom,
        transfers = batch.transfers.len(),
        claimed_power,
        total_power,
        ?superseded,
        requeued,
        "batch observed on ethereum"
    );
    let observed = ObservedBatch {
        batch,
        claimed_power,
        total_power,
        height,
    };
    codec.put(store, observed_batch_key(nonce), &observed)?;
    Ok((superseded, requeued))
}

/// Claims for a batch that has not been finalized, ordered by validator bytes.
pub fn claims<S: KvStore + ?Sized>(codec: &Codec, store: &S, nonce: u64) -> Result<Vec<Claim>> {
    store
        .prefix_iter(&claim_prefix(nonce))
        .map(|(_, value)| codec.decode(&value))
        .collect()
}

pub fn observed_batch<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &S,
    nonce: u64,
) -> Result<Option<ObservedBatch>> {
    codec.get(store, &observed_batch_key(nonce))
}
