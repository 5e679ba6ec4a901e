//! Integration test: one zone's failure never touches another zone.
//!
//! Two zones share the epoch budget by TVL. A zone whose holdings payout
//! cannot be made keeps its claims and budget for the next epoch, and a
//! zone whose validators report no voting power fails only its own
//! validator selection callback.

use prost::Message as _;

use qs_integration_tests::{Harness, ALICE, BOB, OSMOSIS, PERFORMANCE};
use qs_keeper::callbacks::Callback;
use qs_keeper::KeeperError;
use qs_protocoldata::claims::{claims_for_chain, set_claim, ClaimNamespace};
use qs_rewards::RewardsError;
use qs_store::MemStore;
use qs_types::keepers::InterchainStakingKeeper;
use qs_types::proto::{DelegationDelegatorReward, DelegationTotalRewardsResponse, ProtoDecCoin};
use qs_types::{Claim, ClaimType, DelegatorIntent, Dec, Validator, ValidatorIntent};

const HUB: &str = "cosmoshub-4";
const THETA: &str = "theta-testnet-001";

/// Hub stakes 600 and Theta 400, so budgets split 60/40.
fn harness() -> Harness<MemStore> {
    let mut h = Harness::new().expect("harness");
    h.add_zone(HUB, 0, "uqatom", 600, 1_000_000).expect("hub");
    h.add_zone(THETA, 1, "uqtheta", 400, 1_000_000).expect("theta");
    h.fund(10_000).expect("fund");
    h.set_epoch_block(OSMOSIS, 900).expect("epoch block");
    h
}

fn live(h: &Harness<MemStore>, zone: &str) -> Vec<Claim> {
    claims_for_chain(h.keeper.store(), ClaimNamespace::Live, zone).expect("live")
}

fn intent(h: &mut Harness<MemStore>, zone: &str, delegator: &str, valoper: &str) {
    h.chain.ics.set_delegator_intent(
        zone,
        DelegatorIntent {
            delegator: delegator.into(),
            intents: vec![ValidatorIntent {
                valoper_address: valoper.into(),
                weight: Dec::ONE,
            }],
        },
        true,
    );
}

fn rewards(valopers: &[&str]) -> Vec<u8> {
    let coin = |whole: usize| ProtoDecCoin {
        denom: "uatom".into(),
        amount: format!("{whole}000000000000000000"),
    };
    DelegationTotalRewardsResponse {
        rewards: valopers
            .iter()
            .map(|v| DelegationDelegatorReward {
                validator_address: (*v).into(),
                reward: vec![coin(10)],
            })
            .collect(),
        total: vec![coin(10 * valopers.len())],
    }
    .encode_to_vec()
}

#[test]
fn test_failed_zone_keeps_claims_and_budget() {
    let mut h = harness();
    h.claim(ALICE, HUB, OSMOSIS, 100).expect("hub claim");
    set_claim(
        h.keeper.store_mut(),
        ClaimNamespace::Live,
        &Claim {
            user_address: "not-an-address".into(),
            chain_id: THETA.into(),
            module: ClaimType::LiquidToken,
            source_chain_id: OSMOSIS.into(),
            amount: 100,
        },
    )
    .expect("bad claim");

    let outcome = h.end_epoch(5).expect("epoch");
    assert_eq!(outcome.failed_zones, vec![THETA.to_string()]);
    assert_eq!(outcome.holdings_paid.get(HUB), Some(&1980));
    assert!(!outcome.holdings_paid.contains_key(THETA));
    assert_eq!(outcome.lockup_paid, 3300);

    assert_eq!(h.balance(ALICE), 1980);
    assert!(live(&h, HUB).is_empty());
    assert_eq!(live(&h, THETA).len(), 1);

    let hub = h.chain.ics.get_zone(HUB).expect("hub");
    let theta = h.chain.ics.get_zone(THETA).expect("theta");
    assert_eq!(hub.holdings_allocation, 0);
    assert_eq!(theta.holdings_allocation, 1320);
    assert_eq!(hub.validator_selection_allocation, 2040);
    assert_eq!(theta.validator_selection_allocation, 1360);
}

#[test]
fn test_zero_voting_power_fails_only_that_zone() {
    let mut h = harness();
    h.chain.ics.add_validator(HUB, Validator::new("cosmosvaloper1a", 100));
    h.chain.ics.add_validator(HUB, Validator::new("cosmosvaloper1b", 100));
    h.chain.ics.add_validator(THETA, Validator::new("cosmosvaloper1theta", 0));
    intent(&mut h, HUB, ALICE, "cosmosvaloper1a");
    intent(&mut h, THETA, BOB, "cosmosvaloper1theta");

    h.end_epoch(5).expect("epoch");
    let module = h.chain.module_address(qs_types::MODULE_NAME);
    let before = h.balance(&module);

    let err = h
        .callback(Callback::ValidatorSelectionRewards, THETA, &rewards(&["cosmosvaloper1theta"]))
        .expect_err("zero power");
    assert!(matches!(err, KeeperError::Rewards(RewardsError::ZeroVotingPower(_))));
    assert_eq!(h.balance(&module), before);
    assert_eq!(
        h.chain.ics.get_zone(THETA).expect("theta").validator_selection_allocation,
        1360
    );

    h.callback(Callback::ValidatorSelectionRewards, HUB, &rewards(&["cosmosvaloper1a", "cosmosvaloper1b"]))
        .expect("hub rewards");
    assert!(h.balance(ALICE) > 0);
    assert_eq!(h.balance(BOB), 0);
    assert_eq!(
        h.chain.ics.get_zone(HUB).expect("hub").validator_selection_allocation,
        0
    );

    let txs: Vec<_> = h.chain.ics.txs.iter().filter(|tx| tx.chain_id == HUB).collect();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].account, PERFORMANCE);
    assert!(h.chain.ics.txs.iter().all(|tx| tx.chain_id != THETA));
}

#[test]
fn test_zone_without_value_gets_no_budget() {
    let mut h = harness();
    let mut theta = h.chain.ics.get_zone(THETA).expect("theta");
    theta.base_denom = "utheta".into();
    h.chain.ics.set_zone(theta);

    h.end_epoch(5).expect("epoch");
    let hub = h.chain.ics.get_zone(HUB).expect("hub");
    let theta = h.chain.ics.get_zone(THETA).expect("theta");
    assert_eq!(hub.validator_selection_allocation, 3400);
    assert_eq!(theta.validator_selection_allocation, 0);
    assert_eq!(theta.tvl, Dec::ZERO);
}
