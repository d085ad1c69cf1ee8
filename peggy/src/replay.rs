//! Replay protection shared by every stateful transition.
//!
//! Transfer ids and batch nonces come from persisted counters that only ever move forward. Confirmations and claims
//! are written with [insert_unique], which never overwrites.

use crate::{
    codec::Codec,
    error::{PeggyError, Result},
    keys::{LAST_BATCH_NONCE, LAST_TRANSFER_ID, sequence_key},
    store::KvStore,
};

fn current<S: KvStore + ?Sized>(codec: &Codec, store: &S, name: &[u8]) -> Result<u64> {
    Ok(codec.get(store, &sequence_key(name))?.unwrap_or(0))
}

fn advance<S: KvStore + ?Sized>(codec: &Codec, store: &mut S, name: &[u8]) -> Result<u64> {
    let next = current(codec, store, name)?
        .checked_add(1)
        .ok_or(PeggyError::Overflow("sequence"))?;
    codec.put(store, sequence_key(name), &next)?;
    Ok(next)
}

/// Allocates the next transfer id. The first id is 1.
pub fn next_transfer_id<S: KvStore + ?Sized>(codec: &Codec, store: &mut S) -> Result<u64> {
    advance(codec, store, LAST_TRANSFER_ID)
}

/// Allocates the next batch nonce. The first nonce is 1.
pub fn next_batch_nonce<S: KvStore + ?Sized>(codec: &Codec, store: &mut S) -> Result<u64> {
    advance(codec, store, LAST_BATCH_NONCE)
}

/// The most recently allocated batch nonce, or 0 if no batch was ever built.
pub fn last_batch_nonce<S: KvStore + ?Sized>(codec: &Codec, store: &S) -> Result<u64> {
    current(codec, store, LAST_BATCH_NONCE)
}

/// Writes `value` at `key` unless something is already there, in which case `duplicate` is returned and the store is
/// unchanged.
pub fn insert_unique<S: KvStore + ?Sized>(
    store: &mut S,
    key: Vec<u8>,
    value: Vec<u8>,
    duplicate: impl FnOnce() -> PeggyError,
) -> Result<()> {
    if store.has(&key) {
        return Err(duplicate());
    }
    store.set(key, value);
    Ok(())
}
