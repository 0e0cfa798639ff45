// Policy boundary tests for the eligibility engine

use fidmfers_backend::services::balance::AggregateBalance;
use fidmfers_backend::services::eligibility::{
    EligibilityEngine, EligibilityResult, IneligibilityReason,
};
use fidmfers_backend::services::identity::IdentityProfile;

fn engine() -> EligibilityEngine {
    EligibilityEngine::with_policy(200_000, "0.99")
}

fn profile(has_badge: bool, addresses: Vec<String>) -> IdentityProfile {
    IdentityProfile {
        fid: 42,
        username: Some("tester".to_string()),
        display_name: None,
        pfp_url: None,
        bio: None,
        follower_count: 1_000,
        score: 0.9,
        has_badge,
        verified_addresses: addresses,
        custody_address: None,
    }
}

fn wallet() -> Vec<String> {
    vec!["0x1111111111111111111111111111111111111111".to_string()]
}

fn tokens(whole: u128, decimals: u8) -> AggregateBalance {
    AggregateBalance {
        raw: whole * 10u128.pow(decimals as u32),
        decimals,
    }
}

#[test]
fn badge_and_balance_grants_flat_price() {
    let result = engine().evaluate(&profile(true, wallet()), Some(&tokens(200_000, 18)));
    match result {
        EligibilityResult::Eligible { price } => assert_eq!(price, "0.99"),
        other => panic!("expected eligible, got {:?}", other),
    }
}

#[test]
fn threshold_is_inclusive() {
    // Exactly 200,000 tokens passes
    assert!(engine()
        .evaluate(&profile(true, wallet()), Some(&tokens(200_000, 18)))
        .is_eligible());

    // One base unit below fails
    let just_short = AggregateBalance {
        raw: 200_000u128 * 10u128.pow(18) - 1,
        decimals: 18,
    };
    assert!(!engine()
        .evaluate(&profile(true, wallet()), Some(&just_short))
        .is_eligible());
}

#[test]
fn threshold_respects_token_decimals() {
    assert!(engine()
        .evaluate(&profile(true, wallet()), Some(&tokens(200_000, 6)))
        .is_eligible());
    assert!(!engine()
        .evaluate(&profile(true, wallet()), Some(&tokens(199_999, 6)))
        .is_eligible());
}

#[test]
fn every_failed_condition_is_reported() {
    let result = engine().evaluate(&profile(false, wallet()), Some(&tokens(1, 18)));
    match result {
        EligibilityResult::Ineligible { reasons } => {
            assert!(reasons.contains(&IneligibilityReason::MissingBadge));
            assert!(reasons.contains(&IneligibilityReason::InsufficientBalance));
            assert_eq!(reasons.len(), 2);
        },
        other => panic!("expected ineligible, got {:?}", other),
    }
}

#[test]
fn missing_wallet_is_a_distinct_reason() {
    let result = engine().evaluate(&profile(true, vec![]), None);
    match result {
        EligibilityResult::Ineligible { reasons } => {
            assert_eq!(reasons, vec![IneligibilityReason::NoWalletFound]);
        },
        other => panic!("expected ineligible, got {:?}", other),
    }
}

#[test]
fn badge_alone_is_not_enough() {
    let result = engine().evaluate(&profile(true, wallet()), Some(&tokens(0, 18)));
    assert!(!result.is_eligible());
}
