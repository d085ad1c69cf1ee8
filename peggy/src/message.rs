//! The messages validators, relayers and users send to the bridge.
//!
//! The set of messages is closed and versioned, so they are modelled as one enum, [Msg], with a handler per variant in
//! [crate::handler]. Each message carries its own stateless checks in [Msg::validate_basic].

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    crypto::{self, binding_digest, decode_signature_hex},
    error::{PeggyError, Result},
    types::{AccountId, Coin, EthAddress, validate_denom},
};

pub const ROUTER_KEY: &str = "peggy";

/// Sent by a validator to set the Ethereum address that represents them on the Ethereum side of the bridge. The
/// signature is the Ethereum key's signature over the Keccak-256 of the validator's account bytes, proving control of
/// the address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetEthAddress {
    pub address: String,
    pub validator: AccountId,
    /// Hex encoded, optionally `0x`-prefixed.
    pub signature: String,
}

/// Asks for a snapshot of the validator set at the height this message is included in. Anyone may send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgValsetRequest {
    pub requester: AccountId,
}

/// A validator's signature over the valset snapshot taken at `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgValsetConfirm {
    pub height: u64,
    pub validator: AccountId,
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
}

/// Moves `amount` to `dest_address` on Ethereum, paying `bridge_fee` to whoever relays it. Both are taken from the
/// sender immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSendToEth {
    pub sender: AccountId,
    pub dest_address: String,
    pub amount: Coin,
    pub bridge_fee: Coin,
}

/// Asks for a batch of pending transfers in `denom` to be formed. Anyone may send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRequestBatch {
    pub requester: AccountId,
    pub denom: String,
}

/// A validator's signature over the batch with `nonce`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConfirmBatch {
    pub nonce: u64,
    pub validator: AccountId,
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
}

/// A validator's oracle attestation that the batch with `nonce` was executed on Ethereum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBatchInChain {
    pub nonce: u64,
    pub validator: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    BindAddress(MsgSetEthAddress),
    RequestSnapshot(MsgValsetRequest),
    ConfirmSnapshot(MsgValsetConfirm),
    SubmitTransfer(MsgSendToEth),
    RequestBatch(MsgRequestBatch),
    ConfirmBatch(MsgConfirmBatch),
    ClaimObserved(MsgBatchInChain),
}

fn require_signer(account: &AccountId, role: &'static str) -> Result<()> {
    if account.is_empty() {
        return Err(PeggyError::EmptySigner(role));
    }
    Ok(())
}

impl MsgSetEthAddress {
    /// Checks the address format and that the signature proves control of it. Returns the parsed address.
    pub fn verify(&self) -> Result<EthAddress> {
        let address = EthAddress::parse(&self.address)?;
        let signature = decode_signature_hex(&self.signature)
            .map_err(|e| PeggyError::MalformedSignature(e.to_string()))?;
        crypto::verify_signer(&binding_digest(&self.validator), &signature, address)
            .map_err(|e| PeggyError::address_proof(&self.address, e))?;
        Ok(address)
    }
}

impl Msg {
    pub fn route(&self) -> &'static str {
        ROUTER_KEY
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Msg::BindAddress(_) => "set_eth_address",
            Msg::RequestSnapshot(_) => "valset_request",
            Msg::ConfirmSnapshot(_) => "valset_confirm",
            Msg::SubmitTransfer(_) => "send_to_eth",
            Msg::RequestBatch(_) => "request_batch",
            Msg::ConfirmBatch(_) => "confirm_batch",
            Msg::ClaimObserved(_) => "batch_in_chain",
        }
    }

    /// The name this message is registered under in the [crate::codec::Codec].
    pub fn type_url(&self) -> &'static str {
        match self {
            Msg::BindAddress(_) => "peggy/MsgSetEthAddress",
            Msg::RequestSnapshot(_) => "peggy/MsgValsetRequest",
            Msg::ConfirmSnapshot(_) => "peggy/MsgValsetConfirm",
            Msg::SubmitTransfer(_) => "peggy/MsgSendToEth",
            Msg::RequestBatch(_) => "peggy/MsgRequestBatch",
            Msg::ConfirmBatch(_) => "peggy/MsgConfirmBatch",
            Msg::ClaimObserved(_) => "peggy/MsgBatchInChain",
        }
    }

    /// Stateless checks. A message failing these is rejected before any state is read.
    pub fn validate_basic(&self) -> Result<()> {
        match self {
            Msg::BindAddress(msg) => {
                require_signer(&msg.validator, "validator")?;
                msg.verify()?;
            }
            Msg::RequestSnapshot(_) => {}
            Msg::ConfirmSnapshot(msg) => require_signer(&msg.validator, "validator")?,
            Msg::SubmitTransfer(msg) => {
                require_signer(&msg.sender, "sender")?;
                // fee and send must be of the same denom
                if msg.amount.denom != msg.bridge_fee.denom {
                    return Err(PeggyError::DenomMismatch {
                        amount: msg.amount.to_string(),
                        fee: msg.bridge_fee.to_string(),
                    });
                }
                validate_denom(&msg.amount.denom)?;
                EthAddress::parse(&msg.dest_address)?;
            }
            Msg::RequestBatch(msg) => validate_denom(&msg.denom)?,
            Msg::ConfirmBatch(msg) => require_signer(&msg.validator, "validator")?,
            Msg::ClaimObserved(msg) => {
                if msg.nonce == 0 {
                    return Err(PeggyError::InvalidNonce);
                }
                require_signer(&msg.validator, "validator")?;
            }
        }
        Ok(())
    }

    /// The accounts whose signatures authorize this message.
    pub fn signers(&self) -> Vec<&AccountId> {
        let signer = match self {
            Msg::BindAddress(msg) => &msg.validator,
            Msg::RequestSnapshot(msg) => &msg.requester,
            Msg::ConfirmSnapshot(msg) => &msg.validator,
            Msg::SubmitTransfer(msg) => &msg.sender,
            Msg::RequestBatch(msg) => &msg.requester,
            Msg::ConfirmBatch(msg) => &msg.validator,
            Msg::ClaimObserved(msg) => &msg.validator,
        };
        vec![signer]
    }

    /// The bytes a signer signs: the message as JSON, tagged with its type, with object keys sorted.
    pub fn sign_bytes(&self) -> Result<Vec<u8>> {
        let value = match self {
            Msg::BindAddress(msg) => serde_json::to_value(msg),
            Msg::RequestSnapshot(msg) => serde_json::to_value(msg),
            Msg::ConfirmSnapshot(msg) => serde_json::to_value(msg),
            Msg::SubmitTransfer(msg) => serde_json::to_value(msg),
            Msg::RequestBatch(msg) => serde_json::to_value(msg),
            Msg::ConfirmBatch(msg) => serde_json::to_value(msg),
            Msg::ClaimObserved(msg) => serde_json::to_value(msg),
        }
        .map_err(|e| PeggyError::Codec(e.to_string()))?;
        // `serde_json::Value` objects are backed by a `BTreeMap`, so keys come out sorted.
        serde_json::to_vec(&json!({ "type": self.type_url(), "value": value }))
            .map_err(|e| PeggyError::Codec(e.to_string()))
    }
}
