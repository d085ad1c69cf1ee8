//! Validator to Ethereum address bindings.

use tracing::*;

use crate::{
    codec::Codec,
    error::Result,
    keys::eth_address_key,
    message::MsgSetEthAddress,
    store::KvStore,
    types::{AccountId, EthAddress},
};

/// Binds the message's address to its validator once the signature proves control of the address. An existing
/// binding is overwritten. Nothing is written if verification fails.
pub fn bind<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &mut S,
    msg: &MsgSetEthAddress,
) -> Result<EthAddress> {
    let address = msg.verify()?;
    let previous = resolve(codec, store, &msg.validator)?;
    codec.put(store, eth_address_key(&msg.validator), &address)?;
    debug!(validator = %msg.validator, %address, ?previous, "bound eth address");
    Ok(address)
}

pub fn resolve<S: KvStore + ?Sized>(
    codec: &Codec,
    store: &S,
    validator: &AccountId,
) -> Result<Option<EthAddress>> {
    codec.get(store, &eth_address_key(validator))
}
