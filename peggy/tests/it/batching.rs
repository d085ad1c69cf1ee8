use std::collections::BTreeMap;

use peggy::{
    cfg::PeggyConfig,
    error::PeggyError,
    pool::TransferStatus,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{Bridge, seeds, user};

#[test]
fn batches_take_the_highest_fees_first() {
    for seed in seeds() {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cap = rng.gen_range(1..8);
        let mut bridge = Bridge::with_config(
            &[10],
            PeggyConfig {
                max_batch_size: cap,
                ..Default::default()
            },
        );
        let sender = user(&mut bridge);

        let count = rng.gen_range(cap..cap + 10);
        let mut fees = BTreeMap::new();
        for _ in 0..count {
            // A small range so that ties are common.
            let fee = rng.gen_range(0..5);
            let id = bridge.send(&sender, 1, fee).unwrap();
            fees.insert(id, fee);
        }

        let nonce = bridge.request_batch("utoken").unwrap();
        let batch = bridge.querier().batch(nonce).unwrap();
        assert_eq!(batch.transfers.len(), cap, "seed {seed}");

        for pair in batch.transfers.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.bridge_fee.amount > b.bridge_fee.amount
                    || (a.bridge_fee.amount == b.bridge_fee.amount && a.id < b.id),
                "seed {seed}: {} then {}",
                a.id,
                b.id
            );
        }

        let lowest = batch.transfers.last().unwrap();
        for left in bridge.querier().pending_transfers("utoken").unwrap() {
            assert!(left.bridge_fee.amount <= lowest.bridge_fee.amount, "seed {seed}");
            if left.bridge_fee.amount == lowest.bridge_fee.amount {
                assert!(left.id > lowest.id, "seed {seed}");
            }
            assert_eq!(
                bridge.querier().transfer_status(left.id).unwrap(),
                Some(TransferStatus::Pending)
            );
        }
        for transfer in &batch.transfers {
            assert_eq!(fees[&transfer.id], transfer.bridge_fee.amount);
            assert_eq!(
                bridge.querier().transfer_status(transfer.id).unwrap(),
                Some(TransferStatus::Batched { nonce })
            );
        }
    }
}

#[test]
fn empty_pool_builds_nothing() {
    let mut bridge = Bridge::new(&[10]);
    let sender = user(&mut bridge);
    bridge.send_in(&sender, "stake", 10, 1).unwrap();

    let result = bridge.request_batch("utoken");
    assert!(matches!(result, Err(PeggyError::EmptyBatch(_))));
    assert_eq!(bridge.querier().last_batch_nonce().unwrap(), 0);
}

#[test]
fn zero_batch_size_is_refused() {
    let mut bridge = Bridge::with_config(
        &[10],
        PeggyConfig {
            max_batch_size: 0,
            ..Default::default()
        },
    );
    let sender = user(&mut bridge);
    let id = bridge.send(&sender, 10, 1).unwrap();

    let result = bridge.request_batch("utoken");
    assert!(matches!(result, Err(PeggyError::InvalidParams(_))));
    assert_eq!(bridge.querier().last_batch_nonce().unwrap(), 0);
    assert!(bridge.querier().open_batches("utoken").is_empty());
    assert_eq!(
        bridge.querier().transfer_status(id).unwrap(),
        Some(TransferStatus::Pending)
    );
}

#[test]
fn nonces_are_shared_across_denominations() {
    let mut bridge = Bridge::new(&[10]);
    let sender = user(&mut bridge);
    bridge.send(&sender, 10, 1).unwrap();
    bridge.send_in(&sender, "stake", 10, 1).unwrap();

    assert_eq!(bridge.request_batch("utoken").unwrap(), 1);
    assert_eq!(bridge.request_batch("stake").unwrap(), 2);
    assert_eq!(bridge.querier().open_batches("utoken"), vec![1]);
    assert_eq!(bridge.querier().open_batches("stake"), vec![2]);
}

#[test]
fn one_open_batch_per_denomination() {
    let mut bridge = Bridge::with_config(
        &[10, 10, 10],
        PeggyConfig {
            single_open_batch_per_denom: true,
            ..Default::default()
        },
    );
    let sender = user(&mut bridge);
    bridge.send(&sender, 10, 1).unwrap();
    let first = bridge.request_batch("utoken").unwrap();

    bridge.send(&sender, 10, 2).unwrap();
    let result = bridge.request_batch("utoken");
    assert!(matches!(
        result,
        Err(PeggyError::BatchAlreadyOpen { nonce, .. }) if nonce == first
    ));

    // Other denominations are unaffected.
    bridge.send_in(&sender, "stake", 10, 1).unwrap();
    bridge.request_batch("stake").unwrap();

    bridge.claim(first, 0).unwrap();
    bridge.claim(first, 1).unwrap();
    assert!(bridge.querier().observed_batch(first).unwrap().is_some());
    let second = bridge.request_batch("utoken").unwrap();
    assert_eq!(bridge.querier().batch(second).unwrap().transfers.len(), 1);
}

#[test]
fn observing_a_batch_requeues_older_ones() {
    let mut bridge = Bridge::new(&[10, 10, 10]);
    let sender = user(&mut bridge);

    let old_transfer = bridge.send(&sender, 10, 1).unwrap();
    let old = bridge.request_batch("utoken").unwrap();
    bridge.send_in(&sender, "stake", 10, 1).unwrap();
    let other_denom = bridge.request_batch("stake").unwrap();
    let new_transfer = bridge.send(&sender, 10, 2).unwrap();
    let new = bridge.request_batch("utoken").unwrap();
    let balance = bridge.balance(&sender, "utoken");

    bridge.claim(new, 0).unwrap();
    let response = bridge.claim(new, 1).unwrap();
    assert_eq!(
        response.attribute("observed_batch", "superseded"),
        Some(old.to_string().as_str())
    );
    assert_eq!(response.attribute("observed_batch", "requeued"), Some("1"));

    // The old batch is gone and its transfer is pending again under the same id.
    assert!(matches!(bridge.querier().batch(old), Err(PeggyError::NotFound(_))));
    let pending = bridge.querier().pending_transfers("utoken").unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, old_transfer);
    assert_eq!(
        bridge.querier().transfer_status(old_transfer).unwrap(),
        Some(TransferStatus::Pending)
    );
    assert_eq!(
        bridge.querier().transfer_status(new_transfer).unwrap(),
        Some(TransferStatus::Observed { nonce: new })
    );

    // Nothing is refunded, and the other denomination's batch is untouched.
    assert_eq!(bridge.balance(&sender, "utoken"), balance);
    assert_eq!(bridge.querier().open_batches("stake"), vec![other_denom]);
    assert!(bridge.querier().open_batches("utoken").is_empty());
}

#[test]
fn batch_confirmations_are_weighed_by_current_power() {
    let mut bridge = Bridge::new(&[10, 20, 30]);
    for i in 0..3 {
        bridge.bind(i).unwrap();
    }
    let sender = user(&mut bridge);
    bridge.send(&sender, 10, 1).unwrap();
    let nonce = bridge.request_batch("utoken").unwrap();

    bridge.confirm_batch(nonce, 0).unwrap();
    bridge.confirm_batch(nonce, 2).unwrap();
    assert_eq!(bridge.querier().batch_confirmed_power(nonce).unwrap(), (40, 60));

    let account = bridge.account(2);
    bridge.app.power_mut().set_power(account, 0);
    assert_eq!(bridge.querier().batch_confirmed_power(nonce).unwrap(), (10, 30));

    let again = bridge.confirm_batch(nonce, 0);
    assert!(matches!(again, Err(PeggyError::DuplicateConfirmation { .. })));
    assert_eq!(bridge.querier().batch_confirmations(nonce).unwrap().len(), 2);
}

#[test]
fn verified_batch_confirmations_need_a_bound_address() {
    let mut bridge = Bridge::with_config(
        &[10, 10],
        PeggyConfig {
            verify_confirmation_signatures: true,
            ..Default::default()
        },
    );
    bridge.bind(0).unwrap();
    let sender = user(&mut bridge);
    bridge.send(&sender, 10, 1).unwrap();
    let nonce = bridge.request_batch("utoken").unwrap();

    bridge.confirm_batch(nonce, 0).unwrap();
    let result = bridge.confirm_batch(nonce, 1);
    assert!(matches!(result, Err(PeggyError::UnboundValidator(_))));
}
