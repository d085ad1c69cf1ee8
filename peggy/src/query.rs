//! Read-only access to the bridge state, for relayers and clients.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    address, attestation,
    attestation::{Claim, ObservedBatch},
    batch::{self, Batch, BatchConfirmation},
    capabilities::PowerSource,
    codec::Codec,
    error::{PeggyError, Result},
    pool::{self, OutgoingTransfer, TransferStatus},
    replay,
    store::KvStore,
    types::{AccountId, EthAddress},
    valset::{self, Valset, ValsetConfirmation},
};

/// A query, as sent by a client in JSON, e.g. `{"batch":{"nonce":3}}` or `"last_batch_nonce"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    EthAddress { validator: AccountId },
    Valset { height: u64 },
    ValsetConfirmations { height: u64 },
    ValsetConfirmedPower { height: u64 },
    PendingTransfers { denom: String },
    Batch { nonce: u64 },
    OpenBatches { denom: String },
    BatchConfirmations { nonce: u64 },
    BatchConfirmedPower { nonce: u64 },
    Claims { nonce: u64 },
    ObservedBatch { nonce: u64 },
    TransferStatus { id: u64 },
    LastBatchNonce,
}

pub struct Querier<'a, S: KvStore + ?Sized> {
    codec: &'a Codec,
    store: &'a S,
    power: &'a dyn PowerSource,
}

impl<'a, S: KvStore + ?Sized> Querier<'a, S> {
    pub fn new(codec: &'a Codec, store: &'a S, power: &'a dyn PowerSource) -> Self {
        Querier {
            codec,
            store,
            power,
        }
    }

    pub fn eth_address(&self, validator: &AccountId) -> Result<Option<EthAddress>> {
        address::resolve(self.codec, self.store, validator)
    }

    pub fn valset(&self, height: u64) -> Result<Valset> {
        valset::get_snapshot(self.codec, self.store, height)
    }

    pub fn valset_confirmations(&self, height: u64) -> Result<Vec<ValsetConfirmation>> {
        valset::confirmations(self.codec, self.store, height)
    }

    pub fn valset_confirmed_power(&self, height: u64) -> Result<(u64, u64)> {
        valset::confirmed_power(self.codec, self.store, height)
    }

    pub fn pending_transfers(&self, denom: &str) -> Result<Vec<OutgoingTransfer>> {
        pool::list_pending(self.codec, self.store, denom).collect()
    }

    pub fn batch(&self, nonce: u64) -> Result<Batch> {
        batch::get_batch(self.codec, self.store, nonce)
    }

    pub fn open_batches(&self, denom: &str) -> Vec<u64> {
        batch::open_batches(self.store, denom)
    }

    pub fn batch_confirmations(&self, nonce: u64) -> Result<Vec<BatchConfirmation>> {
        batch::confirmations(self.codec, self.store, nonce)
    }

    pub fn batch_confirmed_power(&self, nonce: u64) -> Result<(u64, u64)> {
        batch::confirmed_power(self.codec, self.store, self.power, nonce)
    }

    pub fn claims(&self, nonce: u64) -> Result<Vec<Claim>> {
        attestation::claims(self.codec, self.store, nonce)
    }

    pub fn observed_batch(&self, nonce: u64) -> Result<Option<ObservedBatch>> {
        attestation::observed_batch(self.codec, self.store, nonce)
    }

    pub fn transfer_status(&self, id: u64) -> Result<Option<TransferStatus>> {
        pool::transfer_status(self.codec, self.store, id)
    }

    pub fn last_batch_nonce(&self) -> Result<u64> {
        replay::last_batch_nonce(self.codec, self.store)
    }

    /// Answers a query with JSON.
    pub fn query(&self, query: &Query) -> Result<Value> {
        let power =
            |(confirmed, total): (u64, u64)| json!({ "confirmed": confirmed, "total": total });
        match query {
            Query::EthAddress { validator } => to_json(self.eth_address(validator)?),
            Query::Valset { height } => to_json(self.valset(*height)?),
            Query::ValsetConfirmations { height } => to_json(self.valset_confirmations(*height)?),
            Query::ValsetConfirmedPower { height } => {
                Ok(power(self.valset_confirmed_power(*height)?))
            }
            Query::PendingTransfers { denom } => to_json(self.pending_transfers(denom)?),
            Query::Batch { nonce } => to_json(self.batch(*nonce)?),
            Query::OpenBatches { denom } => to_json(self.open_batches(denom)),
            Query::BatchConfirmations { nonce } => to_json(self.batch_confirmations(*nonce)?),
            Query::BatchConfirmedPower { nonce } => Ok(power(self.batch_confirmed_power(*nonce)?)),
            Query::Claims { nonce } => to_json(self.claims(*nonce)?),
            Query::ObservedBatch { nonce } => to_json(self.observed_batch(*nonce)?),
            Query::TransferStatus { id } => to_json(self.transfer_status(*id)?),
            Query::LastBatchNonce => to_json(self.last_batch_nonce()?),
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| PeggyError::Codec(e.to_string()))
}
