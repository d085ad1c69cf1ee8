//! The pool of outgoing transfers waiting to be batched.
//!
//! Transfers are stored per denomination in id order. The pool does not order by fee; that happens when a batch is
//! built. Funds are taken from the sender when a transfer enters the pool and are never returned, even if the
//! transfer is later requeued.

use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    capabilities::BalanceSource,
    codec::Codec,
    error::{PeggyError, Result},
    keys::{outgoing_pool_key, outgoing_pool_prefix, transfer_status_key},
    replay::next_transfer_id,
    store::KvStore,
    types::{AccountId, Coin, EthAddress},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingTransfer {
    pub id: u64,
    pub sender: AccountId,
    pub dest_address: EthAddress,
    pub amount: Coin,
    pub bridge_fee: Coin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Batched { nonce: u64 },
    Observed { nonce: u64 },
}

/// Adds a transfer to the pool, taking `amount + fee` from the sender. Returns the transfer's id.
pub fn submit<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    bank: &mut dyn BalanceSource,
    sender: &AccountId,
    dest_address: EthAddress,
    amount: Coin,
    bridge_fee: Coin,
) -> Result<u64> {
    let total = amount.checked_add(&bridge_fee)?;
    let id = next_transfer_id(codec, store)?;
    let transfer = OutgoingTransfer {
        id,
        sender: sender.clone(),
        dest_address,
        amount,
        bridge_fee,
    };
    codec.put(store, outgoing_pool_key(&transfer.amount.denom, id), &transfer)?;
    set_status(codec, store, id, TransferStatus::Pending)?;
    // Last, so a failed debit leaves nothing else to undo.
    bank.debit(sender, &total)?;
    info!(
        id,
        %sender,
        dest = %transfer.dest_address,
        amount = %transfer.amount,
        fee = %transfer.bridge_fee,
        "transfer added to pool"
    );
    Ok(id)
}

/// Pending transfers in `denom`, in id order. The iterator reads lazily; call again to restart.
pub fn list_pending<'a, S: KvStore + ?Sized>(
    codec: &'a Codec,
    store: &'a S,
    denom: &str,
) -> impl Iterator<Item = Result<OutgoingTransfer>> + use<'a, S> {
    store
        .prefix_iter(&outgoing_pool_prefix(denom))
        .map(|(_, value)| codec.decode(&value))
}

/// Takes a transfer out of the pool. Its status is left for the caller to update.
pub fn remove<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    denom: &str,
    id: u64,
) -> Result<OutgoingTransfer> {
    let key = outgoing_pool_key(denom, id);
    let transfer = codec
        .get(store, &key)?
        .ok_or_else(|| PeggyError::NotFound(format!("pending transfer {id}")))?;
    store.delete(&key);
    Ok(transfer)
}

/// Puts a transfer from a superseded batch back into the pool under its original id.
pub fn requeue<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    transfer: &OutgoingTransfer,
) -> Result<()> {
    codec.put(
        store,
        outgoing_pool_key(&transfer.amount.denom, transfer.id),
        transfer,
    )?;
    set_status(codec, store, transfer.id, TransferStatus::Pending)?;
    debug!(id = transfer.id, "transfer requeued");
    Ok(())
}

pub fn transfer_status<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &S,
    id: u64,
) -> Result<Option<TransferStatus>> {
    codec.get(store, &transfer_status_key(id))
}

pub(crate) fn set_status<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    id: u64,
    status: TransferStatus,
) -> Result<()> {
    codec.put(store, transfer_status_key(id), &status)
}
