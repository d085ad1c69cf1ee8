//! The persisted key scheme.
//!
//! Every key starts with a one-byte prefix naming the table. Integers are big-endian so byte order matches numeric
//! order, denominations are length-prefixed so one denomination can never be a prefix of another, and validator
//! account bytes always come last.

use crate::types::AccountId;

/// Key: validator; value: Ethereum address.
pub const ETH_ADDRESS_PREFIX: u8 = 0x01;
/// Key: height; value: valset snapshot.
pub const VALSET_PREFIX: u8 = 0x02;
/// Key: (height, validator); value: valset confirmation.
pub const VALSET_CONFIRM_PREFIX: u8 = 0x03;
/// Key: (denom, transfer id); value: pending outgoing transfer.
pub const OUTGOING_POOL_PREFIX: u8 = 0x04;
/// Key: nonce; value: open batch.
pub const BATCH_PREFIX: u8 = 0x05;
/// Key: (nonce, validator); value: batch confirmation.
pub const BATCH_CONFIRM_PREFIX: u8 = 0x06;
/// Key: (nonce, validator); value: attestation claim.
pub const CLAIM_PREFIX: u8 = 0x07;
/// Key: nonce; value: observed batch. Written once, never modified.
pub const OBSERVED_BATCH_PREFIX: u8 = 0x08;
/// Key: transfer id; value: transfer status.
pub const TRANSFER_STATUS_PREFIX: u8 = 0x09;
/// Key: (denom, nonce); value: nothing. Index of open batches per denomination.
pub const DENOM_BATCH_PREFIX: u8 = 0x0a;
/// Single keys holding sequence counters.
pub const SEQUENCE_PREFIX: u8 = 0x0b;

pub const LAST_TRANSFER_ID: &[u8] = b"last_transfer_id";
pub const LAST_BATCH_NONCE: &[u8] = b"last_batch_nonce";

fn with_prefix(prefix: u8, capacity: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(capacity + 1);
    key.push(prefix);
    key
}

fn push_denom(key: &mut Vec<u8>, denom: &str) {
    // Denominations are at most 128 bytes, see `types::validate_denom`.
    key.push(denom.len() as u8);
    key.extend_from_slice(denom.as_bytes());
}

pub fn eth_address_key(validator: &AccountId) -> Vec<u8> {
    let mut key = with_prefix(ETH_ADDRESS_PREFIX, validator.as_bytes().len());
    key.extend_from_slice(validator.as_bytes());
    key
}

pub fn valset_key(height: u64) -> Vec<u8> {
    let mut key = with_prefix(VALSET_PREFIX, 8);
    key.extend_from_slice(&height.to_be_bytes());
    key
}

pub fn valset_confirm_prefix(height: u64) -> Vec<u8> {
    let mut key = with_prefix(VALSET_CONFIRM_PREFIX, 8);
    key.extend_from_slice(&height.to_be_bytes());
    key
}

pub fn valset_confirm_key(height: u64, validator: &AccountId) -> Vec<u8> {
    let mut key = valset_confirm_prefix(height);
    key.extend_from_slice(validator.as_bytes());
    key
}

pub fn outgoing_pool_prefix(denom: &str) -> Vec<u8> {
    let mut key = with_prefix(OUTGOING_POOL_PREFIX, denom.len() + 1);
    push_denom(&mut key, denom);
    key
}

pub fn outgoing_pool_key(denom: &str, id: u64) -> Vec<u8> {
    let mut key = outgoing_pool_prefix(denom);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

pub fn batch_key(nonce: u64) -> Vec<u8> {
    let mut key = with_prefix(BATCH_PREFIX, 8);
    key.extend_from_slice(&nonce.to_be_bytes());
    key
}

pub fn batch_confirm_prefix(nonce: u64) -> Vec<u8> {
    let mut key = with_prefix(BATCH_CONFIRM_PREFIX, 8);
    key.extend_from_slice(&nonce.to_be_bytes());
    key
}

pub fn batch_confirm_key(nonce: u64, validator: &AccountId) -> Vec<u8> {
    let mut key = batch_confirm_prefix(nonce);
    key.extend_from_slice(validator.as_bytes());
    key
}

pub fn claim_prefix(nonce: u64) -> Vec<u8> {
    let mut key = with_prefix(CLAIM_PREFIX, 8);
    key.extend_from_slice(&nonce.to_be_bytes());
    key
}

pub fn claim_key(nonce: u64, validator: &AccountId) -> Vec<u8> {
    let mut key = claim_prefix(nonce);
    key.extend_from_slice(validator.as_bytes());
    key
}

pub fn observed_batch_key(nonce: u64) -> Vec<u8> {
    let mut key = with_prefix(OBSERVED_BATCH_PREFIX, 8);
    key.extend_from_slice(&nonce.to_be_bytes());
    key
}

pub fn transfer_status_key(id: u64) -> Vec<u8> {
    let mut key = with_prefix(TRANSFER_STATUS_PREFIX, 8);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

pub fn denom_batch_prefix(denom: &str) -> Vec<u8> {
    let mut key = with_prefix(DENOM_BATCH_PREFIX, denom.len() + 1);
    push_denom(&mut key, denom);
    key
}

pub fn denom_batch_key(denom: &str, nonce: u64) -> Vec<u8> {
    let mut key = denom_batch_prefix(denom);
    key.extend_from_slice(&nonce.to_be_bytes());
    key
}

/// Reads the trailing big-endian `u64` of a key built by one of the functions above.
pub fn trailing_u64(key: &[u8]) -> Option<u64> {
    let start = key.len().checked_sub(8)?;
    Some(u64::from_be_bytes(key[start..].try_into().ok()?))
}

pub fn sequence_key(name: &[u8]) -> Vec<u8> {
    let mut key = with_prefix(SEQUENCE_PREFIX, name.len());
    key.extend_from_slice(name);
    key
}
