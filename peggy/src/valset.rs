//! Validator set snapshots and the confirmations validators submit for them.
//!
//! A snapshot lists every bonded validator with its Ethereum address and power, ordered by descending power with ties
//! broken by ascending validator bytes. Validators sign the snapshot's [Valset::checkpoint] so relayers can update the
//! validator set held by the Ethereum contract. Collecting enough signatures is the relayer's concern; this module only
//! reports how much power has confirmed.

use alloy::{
    primitives::{Address, B256, U256},
    sol_types::SolValue,
};
use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    address,
    capabilities::PowerSource,
    cfg::UnboundValidatorPolicy,
    codec::Codec,
    crypto::{self, keccak256},
    error::{PeggyError, Result},
    keys::{VALSET_PREFIX, trailing_u64, valset_confirm_key, valset_confirm_prefix, valset_key},
    replay::insert_unique,
    store::KvStore,
    types::{AccountId, EthAddress},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValsetMember {
    pub validator: AccountId,
    /// `None` if the validator had not bound an address when the snapshot was taken.
    pub eth_address: Option<EthAddress>,
    pub power: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valset {
    pub height: u64,
    pub members: Vec<ValsetMember>,
}

impl Valset {
    pub fn total_power(&self) -> u64 {
        self.members
            .iter()
            .fold(0u64, |total, m| total.saturating_add(m.power))
    }

    pub fn member(&self, validator: &AccountId) -> Option<&ValsetMember> {
        self.members.iter().find(|m| m.validator == *validator)
    }

    /// The digest validators sign: Keccak-256 over the ABI encoding of `(uint256 height, address[] addresses,
    /// uint256[] powers)`. Unbound members are encoded as the zero address.
    pub fn checkpoint(&self) -> B256 {
        let addresses: Vec<Address> = self
            .members
            .iter()
            .map(|m| m.eth_address.unwrap_or(EthAddress::ZERO).into_inner())
            .collect();
        let powers: Vec<U256> = self.members.iter().map(|m| U256::from(m.power)).collect();
        keccak256((U256::from(self.height), addresses, powers).abi_encode_params())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValsetConfirmation {
    pub height: u64,
    pub validator: AccountId,
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
}

/// Takes a snapshot of the current bonded validators and stores it under `height`, replacing any snapshot already
/// there.
pub fn request_snapshot<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    power: &dyn PowerSource,
    policy: UnboundValidatorPolicy,
    height: u64,
) -> Result<Valset> {
    let mut members = Vec::new();
    for (validator, power) in power.bonded_validators() {
        let eth_address = address::resolve(codec, store, &validator)?;
        if eth_address.is_none() && policy == UnboundValidatorPolicy::Exclude {
            trace!(%validator, "leaving unbound validator out of snapshot");
            continue;
        }
        members.push(ValsetMember {
            validator,
            eth_address,
            power,
        });
    }
    members.sort_by(|a, b| {
        b.power
            .cmp(&a.power)
            .then_with(|| a.validator.cmp(&b.validator))
    });

    let valset = Valset { height, members };
    codec.put(store, valset_key(height), &valset)?;
    info!(
        height,
        members = valset.members.len(),
        total_power = valset.total_power(),
        "valset snapshot taken"
    );
    Ok(valset)
}

pub fn get_snapshot<S: KvStore + ?Sized>(codec: &Codec, store: &S, height: u64) -> Result<Valset> {
    codec
        .get(store, &valset_key(height))?
        .ok_or_else(|| PeggyError::NotFound(format!("valset at height {height}")))
}

/// Records a validator's confirmation of the snapshot at `height`. The validator must have had a bound address in that
/// snapshot. If `verify` is set, the signature must recover to that address.
pub fn submit_confirmation<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    height: u64,
    validator: &AccountId,
    signature: &[u8],
    verify: bool,
) -> Result<()> {
    let valset = get_snapshot(codec, store, height)?;
    let key = valset_confirm_key(height, validator);
    if store.has(&key) {
        return Err(duplicate(height, validator));
    }
    let address = valset
        .member(validator)
        .and_then(|m| m.eth_address)
        .ok_or_else(|| PeggyError::UnboundValidator(validator.clone()))?;
    if verify {
        crypto::verify_signer(&valset.checkpoint(), signature, address)
            .map_err(|e| PeggyError::confirmation(validator, e))?;
    }

    let confirmation = ValsetConfirmation {
        height,
        validator: validator.clone(),
        signature: signature.to_vec(),
    };
    insert_unique(store, key, codec.encode(&confirmation)?, || {
        duplicate(height, validator)
    })?;
    debug!(height, %validator, "valset confirmation stored");
    Ok(())
}

fn duplicate(height: u64, validator: &AccountId) -> PeggyError {
    PeggyError::DuplicateConfirmation {
        key: format!("valset {height}"),
        validator: validator.clone(),
    }
}

/// All confirmations of the snapshot at `height`, ordered by validator bytes.
pub fn confirmations<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &S,
    height: u64,
) -> Result<Vec<ValsetConfirmation>> {
    store
        .prefix_iter(&valset_confirm_prefix(height))
        .map(|(_, value)| codec.decode(&value))
        .collect()
}

/// The power of the validators that confirmed the snapshot at `height`, and the snapshot's total power. Powers are
/// those recorded in the snapshot. Only members with an address in the snapshot count as confirmed.
pub fn confirmed_power<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &S,
    height: u64,
) -> Result<(u64, u64)> {
    let valset = get_snapshot(codec, store, height)?;
    let confirmed = confirmations(codec, store, height)?
        .iter()
        .filter_map(|c| valset.member(&c.validator))
        .filter(|m| m.eth_address.is_some())
        .map(|m| m.power)
        .fold(0u64, u64::saturating_add);
    let total = valset.total_power();
    trace!(height, confirmed, total, "valset confirmed power");
    Ok((confirmed, total))
}

/// The heights of every stored snapshot, ascending.
pub fn snapshot_heights<S: KvStore + ?Sized>(store: &S) -> Vec<u64> {
    store
        .prefix_iter(&[VALSET_PREFIX])
        .filter_map(|(key, _)| trailing_u64(&key))
        .collect()
}
