//! The explicit serialization table for messages and state.
//!
//! A [Codec] is built once when the process starts and shared (behind an `Arc`) with every component that encodes or
//! decodes. There is no global registry: the table below is the whole wire contract. An encoded message is
//! `[version, tag, payload]`, where the payload is the bincode encoding of the message body registered under `tag`.

use std::collections::BTreeMap;

use bincode::config::{Configuration, standard};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{PeggyError, Result},
    message::Msg,
    store::KvStore,
};

/// Bumped whenever an encoding changes incompatibly.
pub const CODEC_VERSION: u8 = 1;

/// Registered message types. Tags are never reused.
const MESSAGE_TYPES: [(u8, &str); 7] = [
    (1, "peggy/MsgSetEthAddress"),
    (2, "peggy/MsgValsetRequest"),
    (3, "peggy/MsgValsetConfirm"),
    (4, "peggy/MsgSendToEth"),
    (5, "peggy/MsgRequestBatch"),
    (6, "peggy/MsgConfirmBatch"),
    (7, "peggy/MsgBatchInChain"),
];

fn config() -> Configuration {
    standard()
}

#[derive(Debug, Clone)]
pub struct Codec {
    version: u8,
    tags: BTreeMap<&'static str, u8>,
    names: BTreeMap<u8, &'static str>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    pub fn new() -> Self {
        Codec {
            version: CODEC_VERSION,
            tags: MESSAGE_TYPES.iter().map(|(tag, name)| (*name, *tag)).collect(),
            names: MESSAGE_TYPES.iter().copied().collect(),
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn registered(&self) -> impl Iterator<Item = (u8, &'static str)> + '_ {
        self.names.iter().map(|(tag, name)| (*tag, *name))
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(value, config())?)
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let (value, read) = bincode::serde::decode_from_slice(bytes, config())?;
        if read != bytes.len() {
            return Err(PeggyError::Codec(format!(
                "{} trailing bytes",
                bytes.len() - read
            )));
        }
        Ok(value)
    }

    pub fn encode_msg(&self, msg: &Msg) -> Result<Vec<u8>> {
        let tag = self
            .tags
            .get(msg.type_url())
            .copied()
            .ok_or_else(|| PeggyError::Codec(format!("unregistered type {}", msg.type_url())))?;
        let payload = match msg {
            Msg::BindAddress(m) => self.encode(m),
            Msg::RequestSnapshot(m) => self.encode(m),
            Msg::ConfirmSnapshot(m) => self.encode(m),
            Msg::SubmitTransfer(m) => self.encode(m),
            Msg::RequestBatch(m) => self.encode(m),
            Msg::ConfirmBatch(m) => self.encode(m),
            Msg::ClaimObserved(m) => self.encode(m),
        }?;
        let mut bytes = Vec::with_capacity(payload.len() + 2);
        bytes.push(self.version);
        bytes.push(tag);
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    pub fn decode_msg(&self, bytes: &[u8]) -> Result<Msg> {
        let [version, tag, payload @ ..] = bytes else {
            return Err(PeggyError::Codec("message too short".to_owned()));
        };
        if *version != self.version {
            return Err(PeggyError::Codec(format!(
                "unsupported codec version {version}, expected {}",
                self.version
            )));
        }
        let name = self
            .names
            .get(tag)
            .ok_or_else(|| PeggyError::Codec(format!("unknown message tag {tag}")))?;
        let msg = match *name {
            "peggy/MsgSetEthAddress" => Msg::BindAddress(self.decode(payload)?),
            "peggy/MsgValsetRequest" => Msg::RequestSnapshot(self.decode(payload)?),
            "peggy/MsgValsetConfirm" => Msg::ConfirmSnapshot(self.decode(payload)?),
            "peggy/MsgSendToEth" => Msg::SubmitTransfer(self.decode(payload)?),
            "peggy/MsgRequestBatch" => Msg::RequestBatch(self.decode(payload)?),
            "peggy/MsgConfirmBatch" => Msg::ConfirmBatch(self.decode(payload)?),
            "peggy/MsgBatchInChain" => Msg::ClaimObserved(self.decode(payload)?),
            other => return Err(PeggyError::Codec(format!("no decoder for {other}"))),
        };
        Ok(msg)
    }

    /// Reads and decodes a value.
    pub fn get<T: DeserializeOwned, S: KvStore + ?Sized>(
        &self,
        store: &S,
        key: &[u8],
    ) -> Result<Option<T>> {
        store.get(key).map(|b| self.decode(&b)).transpose()
    }

    /// Encodes and writes a value, overwriting any existing one.
    pub fn put<T: Serialize, S: KvStore + ?Sized>(
        &self,
        store: &mut S,
        key: Vec<u8>,
        value: &T,
    ) -> Result<()> {
        store.set(key, self.encode(value)?);
        Ok(())
    }
}
