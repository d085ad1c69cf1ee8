//! Applying messages to the bridge state.
//!
//! [Peggy] owns the bridge's store and is handed the staking and bank capabilities when it is built. Every message is
//! validated, then applied against a [CacheStore]; the cache is committed only if the whole transition succeeded.

use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use tracing::*;

use crate::{
    address, attestation,
    attestation::ClaimOutcome,
    batch::{self, BatchPolicy},
    capabilities::{BalanceSource, PowerSource},
    cfg::PeggyConfig,
    codec::Codec,
    error::Result,
    message::{Msg, ROUTER_KEY},
    pool,
    query::Querier,
    store::{CacheStore, KvStore},
    types::{Ctx, EthAddress},
    valset,
};

/// Something that happened while applying a message, for clients and indexers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    fn new(kind: &str) -> Self {
        Event {
            kind: kind.to_owned(),
            attributes: vec![("module".to_owned(), ROUTER_KEY.to_owned())],
        }
    }

    fn attr(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push((key.to_owned(), value.to_string()));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Response {
    pub events: Vec<Event>,
}

impl Response {
    fn with(event: Event) -> Self {
        Response {
            events: vec![event],
        }
    }

    /// The value of `key` on the first event of type `kind`.
    pub fn attribute(&self, kind: &str, key: &str) -> Option<&str> {
        self.events
            .iter()
            .filter(|e| e.kind == kind)
            .find_map(|e| e.attribute(key))
    }
}

pub struct Peggy<S, P, B> {
    codec: Arc<Codec>,
    config: PeggyConfig,
    store: S,
    power: P,
    bank: B,
}

impl<S: KvStore, P: PowerSource, B: BalanceSource> Peggy<S, P, B> {
    pub fn new(codec: Arc<Codec>, config: PeggyConfig, store: S, power: P, bank: B) -> Self {
        Peggy {
            codec,
            config,
            store,
            power,
            bank,
        }
    }

    pub fn codec(&self) -> &Arc<Codec> {
        &self.codec
    }

    pub fn config(&self) -> &PeggyConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    /// The staking module may change powers between messages.
    pub fn power_mut(&mut self) -> &mut P {
        &mut self.power
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn querier(&self) -> Querier<'_, S> {
        Querier::new(&self.codec, &self.store, &self.power)
    }

    /// Decodes a message with the codec and applies it.
    pub fn deliver_bytes(&mut self, ctx: Ctx, bytes: &[u8]) -> Result<Response> {
        let msg = self.codec.decode_msg(bytes)?;
        self.deliver(ctx, &msg)
    }

    /// Applies a message. On error the state is exactly as it was before the call.
    pub fn deliver(&mut self, ctx: Ctx, msg: &Msg) -> Result<Response> {
        let _span = debug_span!("deliver", height = ctx.height, msg = msg.type_name()).entered();
        if let Err(error) = msg.validate_basic() {
            debug!(%error, code = error.code(), "message failed validation");
            return Err(error);
        }

        let mut cache = CacheStore::new(&mut self.store);
        let result = apply(
            &self.codec,
            &self.config,
            &mut cache,
            &self.power,
            &mut self.bank,
            ctx,
            msg,
        );
        match result {
            Ok(response) => {
                trace!(writes = cache.pending_writes(), "committing");
                cache.commit();
                Ok(response)
            }
            Err(error) => {
                debug!(%error, code = error.code(), "message rejected");
                Err(error)
            }
        }
    }
}

fn apply<S: KvStore + ?Sized>(
    codec: &Codec,
    config: &PeggyConfig,
    store: &mut S,
    power: &dyn PowerSource,
    bank: &mut dyn BalanceSource,
    ctx: Ctx,
    msg: &Msg,
) -> Result<Response> {
    let kind = msg.type_name();
    let response = match msg {
        Msg::BindAddress(msg) => {
            let address = address::bind(codec, store, msg)?;
            Response::with(
                Event::new(kind)
                    .attr("validator", &msg.validator)
                    .attr("address", address),
            )
        }
        Msg::RequestSnapshot(msg) => {
            let valset = valset::request_snapshot(
                codec,
                store,
                power,
                config.unbound_validators,
                ctx.height,
            )?;
            Response::with(
                Event::new(kind)
                    .attr("requester", &msg.requester)
                    .attr("height", valset.height)
                    .attr("members", valset.members.len())
                    .attr("checkpoint", valset.checkpoint()),
            )
        }
        Msg::ConfirmSnapshot(msg) => {
            valset::submit_confirmation(
                codec,
                store,
                msg.height,
                &msg.validator,
                &msg.signature,
                config.verify_confirmation_signatures,
            )?;
            Response::with(
                Event::new(kind)
                    .attr("height", msg.height)
                    .attr("validator", &msg.validator),
            )
        }
        Msg::SubmitTransfer(msg) => {
            let dest = EthAddress::parse(&msg.dest_address)?;
            let id = pool::submit(
                codec,
                store,
                bank,
                &msg.sender,
                dest,
                msg.amount.clone(),
                msg.bridge_fee.clone(),
            )?;
            Response::with(
                Event::new(kind)
                    .attr("id", id)
                    .attr("sender", &msg.sender)
                    .attr("dest_address", dest)
                    .attr("amount", &msg.amount)
                    .attr("bridge_fee", &msg.bridge_fee),
            )
        }
        Msg::RequestBatch(msg) => {
            let policy = BatchPolicy {
                max_batch_size: config.max_batch_size,
                single_open_batch_per_denom: config.single_open_batch_per_denom,
            };
            let batch = batch::build_batch(
                codec,
                store,
                &msg.denom,
                &msg.requester,
                policy,
                ctx.height,
            )?;
            Response::with(
                Event::new(kind)
                    .attr("nonce", batch.nonce)
                    .attr("denom", &batch.denom)
                    .attr("transfers", batch.transfers.len())
                    .attr("checkpoint", batch.checkpoint()),
            )
        }
        Msg::ConfirmBatch(msg) => {
            batch::confirm(
                codec,
                store,
                msg.nonce,
                &msg.validator,
                &msg.signature,
                config.verify_confirmation_signatures,
            )?;
            Response::with(
                Event::new(kind)
                    .attr("nonce", msg.nonce)
                    .attr("validator", &msg.validator),
            )
        }
        Msg::ClaimObserved(msg) => {
            let outcome = attestation::claim_observed(
                codec,
                store,
                power,
                msg.nonce,
                &msg.validator,
                ctx.height,
            )?;
            let event = Event::new(kind)
                .attr("nonce", msg.nonce)
                .attr("validator", &msg.validator);
            match outcome {
                ClaimOutcome::Recorded { claimed, total } => Response::with(
                    event
                        .attr("outcome", "recorded")
                        .attr("claimed_power", claimed)
                        .attr("total_power", total),
                ),
                ClaimOutcome::Finalized {
                    claimed,
                    total,
                    superseded,
                    requeued,
                } => Response {
                    events: vec![
                        event
                            .attr("outcome", "finalized")
                            .attr("claimed_power", claimed)
                            .attr("total_power", total),
                        Event::new("observed_batch")
                            .attr("nonce", msg.nonce)
                            .attr("superseded", superseded.iter().join(","))
                            .attr("requeued", requeued),
                    ],
                },
                ClaimOutcome::AlreadyFinalized => {
                    Response::with(event.attr("outcome", "already_finalized"))
                }
            }
        }
    };
    Ok(response)
}
