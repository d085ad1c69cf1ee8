use peggy::{
    attestation::supermajority,
    cfg::{PeggyConfig, UnboundValidatorPolicy},
    crypto::sign_digest,
    error::PeggyError,
};

use crate::Bridge;

/// A and B bound with 10 each, C unbound with 20.
fn mixed_bridge(policy: UnboundValidatorPolicy) -> Bridge {
    let mut bridge = Bridge::with_config(
        &[10, 10, 20],
        PeggyConfig {
            unbound_validators: policy,
            ..Default::default()
        },
    );
    bridge.bind(0).unwrap();
    bridge.bind(1).unwrap();
    bridge
}

#[test]
fn unbound_validators_count_towards_the_total() {
    let mut bridge = mixed_bridge(UnboundValidatorPolicy::IncludeEmpty);
    let height = bridge.request_valset();

    let valset = bridge.querier().valset(height).unwrap();
    assert_eq!(valset.members.len(), 3);
    // Highest power first.
    assert_eq!(valset.members[0].validator, bridge.account(2));
    assert_eq!(valset.members[0].eth_address, None);
    assert_eq!(valset.total_power(), 40);

    bridge.confirm_valset(height, 0, vec![0; 65]).unwrap();
    bridge.confirm_valset(height, 1, vec![0; 65]).unwrap();
    let (confirmed, total) = bridge.querier().valset_confirmed_power(height).unwrap();
    assert_eq!((confirmed, total), (20, 40));
    assert!(!supermajority(confirmed, total));
}

#[test]
fn unbound_validators_cannot_confirm() {
    let mut bridge = mixed_bridge(UnboundValidatorPolicy::IncludeEmpty);
    let height = bridge.request_valset();
    bridge.confirm_valset(height, 0, vec![0; 65]).unwrap();

    let store = bridge.app.store().clone();
    let result = bridge.confirm_valset(height, 2, vec![0; 65]);
    assert_eq!(result, Err(PeggyError::UnboundValidator(bridge.account(2))));
    assert_eq!(bridge.app.store(), &store);

    // Binding afterwards does not help: the snapshot has no address for it.
    bridge.bind(2).unwrap();
    let result = bridge.confirm_valset(height, 2, vec![0; 65]);
    assert!(matches!(result, Err(PeggyError::UnboundValidator(_))));

    let (confirmed, total) = bridge.querier().valset_confirmed_power(height).unwrap();
    assert_eq!((confirmed, total), (10, 40));
    assert!(!supermajority(confirmed, total));
}

#[test]
fn excluded_validators_do_not() {
    let mut bridge = mixed_bridge(UnboundValidatorPolicy::Exclude);
    let height = bridge.request_valset();

    let valset = bridge.querier().valset(height).unwrap();
    assert_eq!(valset.members.len(), 2);
    assert!(valset.members.iter().all(|m| m.eth_address.is_some()));
    // Equal power is ordered by account.
    assert_eq!(valset.members[0].validator, bridge.account(0));

    bridge.confirm_valset(height, 0, vec![0; 65]).unwrap();
    bridge.confirm_valset(height, 1, vec![0; 65]).unwrap();
    let (confirmed, total) = bridge.querier().valset_confirmed_power(height).unwrap();
    assert_eq!((confirmed, total), (20, 20));
    assert!(supermajority(confirmed, total));
}

#[test]
fn snapshots_are_deterministic() {
    let build = || {
        let mut bridge = mixed_bridge(UnboundValidatorPolicy::IncludeEmpty);
        let height = bridge.request_valset();
        let valset = bridge.querier().valset(height).unwrap();
        (valset.checkpoint(), bridge.app.store().clone())
    };
    let (a, store_a) = build();
    let (b, store_b) = build();
    assert_eq!(a, b);
    assert_eq!(store_a, store_b);
}

#[test]
fn power_changes_only_show_in_later_snapshots() {
    let mut bridge = mixed_bridge(UnboundValidatorPolicy::IncludeEmpty);
    let first = bridge.request_valset();
    let account = bridge.account(0);
    bridge.app.power_mut().set_power(account.clone(), 50);
    let second = bridge.request_valset();

    let old = bridge.querier().valset(first).unwrap();
    let new = bridge.querier().valset(second).unwrap();
    assert_eq!(old.member(&account).unwrap().power, 10);
    assert_eq!(new.member(&account).unwrap().power, 50);
    assert_eq!(new.members[0].validator, account);
    assert_ne!(old.checkpoint(), new.checkpoint());
}

#[test]
fn each_validator_confirms_once() {
    let mut bridge = mixed_bridge(UnboundValidatorPolicy::IncludeEmpty);
    let height = bridge.request_valset();
    bridge.confirm_valset(height, 0, vec![0; 65]).unwrap();

    let store = bridge.app.store().clone();
    let again = bridge.confirm_valset(height, 0, vec![1; 65]);
    assert!(matches!(again, Err(PeggyError::DuplicateConfirmation { .. })));
    assert_eq!(bridge.app.store(), &store);

    let confirmations = bridge.querier().valset_confirmations(height).unwrap();
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].signature, vec![0; 65]);
}

#[test]
fn verified_confirmations() {
    let mut bridge = Bridge::with_config(
        &[10, 10, 20],
        PeggyConfig {
            verify_confirmation_signatures: true,
            ..Default::default()
        },
    );
    bridge.bind(0).unwrap();
    bridge.bind(1).unwrap();
    let height = bridge.request_valset();
    let checkpoint = bridge.querier().valset(height).unwrap().checkpoint();

    let good = sign_digest(&bridge.validator(0).key, &checkpoint).unwrap();
    bridge.confirm_valset(height, 0, good.to_vec()).unwrap();

    // Validator 1 submits validator 0's signature.
    let result = bridge.confirm_valset(height, 1, good.to_vec());
    assert!(matches!(result, Err(PeggyError::InvalidSignature { .. })));

    // Validator 2 never bound an address.
    let own = sign_digest(&bridge.validator(2).key, &checkpoint).unwrap();
    let result = bridge.confirm_valset(height, 2, own.to_vec());
    assert!(matches!(result, Err(PeggyError::UnboundValidator(_))));

    assert_eq!(bridge.querier().valset_confirmations(height).unwrap().len(), 1);
}
