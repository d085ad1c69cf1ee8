use peggy::{
    codec::Codec,
    error::PeggyError,
    message::{Msg, MsgBatchInChain},
    store::KvStore,
    types::Ctx,
};
use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;

use crate::{Bridge, attribute, seeds, user};

#[test]
fn finalizes_once_whatever_the_claim_order() {
    for seed in seeds() {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let powers = [5, 10, 15, 20, 25, 30];
        let total: u64 = powers.iter().sum();
        let mut bridge = Bridge::new(&powers);
        let sender = user(&mut bridge);
        bridge.send(&sender, 100, 1).unwrap();
        let nonce = bridge.request_batch("utoken").unwrap();

        let mut order: Vec<usize> = (0..powers.len()).collect();
        order.shuffle(&mut rng);

        let mut claimed = 0;
        let mut finalized_at = None;
        for (step, i) in order.into_iter().enumerate() {
            let response = bridge.claim(nonce, i).unwrap();
            let outcome = response.attribute("batch_in_chain", "outcome").unwrap();
            match finalized_at {
                None => {
                    claimed += powers[i];
                    assert_eq!(attribute(&response, "batch_in_chain", "claimed_power"), claimed);
                    assert_eq!(attribute(&response, "batch_in_chain", "total_power"), total);
                    if claimed * 3 >= total * 2 {
                        assert_eq!(outcome, "finalized", "seed {seed}");
                        finalized_at = Some(step);
                    } else {
                        assert_eq!(outcome, "recorded", "seed {seed}");
                        assert!(bridge.querier().observed_batch(nonce).unwrap().is_none());
                    }
                }
                Some(_) => {
                    assert_eq!(outcome, "already_finalized", "seed {seed}");
                }
            }
        }
        assert!(finalized_at.is_some(), "seed {seed}");

        let observed = bridge.querier().observed_batch(nonce).unwrap().unwrap();
        assert_eq!(observed.claimed_power, claimed);
        assert_eq!(observed.total_power, total);
        // Claims for an observed batch are not kept.
        assert!(bridge.querier().claims(nonce).unwrap().is_empty());
    }
}

#[test]
fn duplicate_claims_are_rejected_without_effect() {
    let mut bridge = Bridge::new(&[10, 10, 10]);
    let sender = user(&mut bridge);
    bridge.send(&sender, 100, 1).unwrap();
    let nonce = bridge.request_batch("utoken").unwrap();
    bridge.claim(nonce, 0).unwrap();

    let store = bridge.app.store().clone();
    let result = bridge.claim(nonce, 0);
    assert!(matches!(
        result,
        Err(PeggyError::DuplicateClaim { nonce: n, .. }) if n == nonce
    ));
    assert_eq!(bridge.app.store(), &store);
    assert_eq!(bridge.querier().claims(nonce).unwrap().len(), 1);
}

#[test]
fn claims_for_unknown_batches_fail() {
    let mut bridge = Bridge::new(&[10]);
    assert!(matches!(bridge.claim(7, 0), Err(PeggyError::NotFound(_))));
    assert!(matches!(bridge.claim(0, 0), Err(PeggyError::InvalidNonce)));
    assert!(bridge.app.store().prefix_iter(&[]).next().is_none());
}

#[test]
fn no_bonded_power_never_finalizes() {
    let mut bridge = Bridge::new(&[10, 10]);
    let sender = user(&mut bridge);
    bridge.send(&sender, 100, 1).unwrap();
    let nonce = bridge.request_batch("utoken").unwrap();
    for i in 0..2 {
        let account = bridge.account(i);
        bridge.app.power_mut().set_power(account, 0);
    }

    for i in 0..2 {
        let response = bridge.claim(nonce, i).unwrap();
        assert_eq!(response.attribute("batch_in_chain", "outcome"), Some("recorded"));
        assert_eq!(attribute(&response, "batch_in_chain", "total_power"), 0);
    }
    assert!(bridge.querier().observed_batch(nonce).unwrap().is_none());
}

#[test]
fn earlier_claims_count_at_their_current_power() {
    let mut bridge = Bridge::new(&[10, 10, 10]);
    let sender = user(&mut bridge);
    bridge.send(&sender, 100, 1).unwrap();
    let nonce = bridge.request_batch("utoken").unwrap();
    bridge.claim(nonce, 0).unwrap();

    // Validator 0 gains power after claiming. Its claim is weighed at the new power.
    let account = bridge.account(0);
    bridge.app.power_mut().set_power(account, 40);
    let response = bridge.claim(nonce, 1).unwrap();
    assert_eq!(response.attribute("batch_in_chain", "outcome"), Some("finalized"));
    assert_eq!(attribute(&response, "batch_in_chain", "claimed_power"), 50);
    assert_eq!(attribute(&response, "batch_in_chain", "total_power"), 60);
}

#[test]
fn encoded_messages_are_delivered() {
    let mut bridge = Bridge::new(&[10, 10, 10]);
    let sender = user(&mut bridge);
    bridge.send(&sender, 100, 1).unwrap();
    let nonce = bridge.request_batch("utoken").unwrap();

    let codec = Codec::new();
    let bytes = codec
        .encode_msg(&Msg::ClaimObserved(MsgBatchInChain {
            nonce,
            validator: bridge.account(0),
        }))
        .unwrap();
    let response = bridge.app.deliver_bytes(Ctx::at(100), &bytes).unwrap();
    assert_eq!(response.attribute("batch_in_chain", "outcome"), Some("recorded"));
    let claims = bridge.querier().claims(nonce).unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].height, 100);

    let mut corrupt = bytes.clone();
    corrupt[0] = corrupt[0].wrapping_add(1);
    assert!(matches!(
        bridge.app.deliver_bytes(Ctx::at(101), &corrupt),
        Err(PeggyError::Codec(_))
    ));
}
