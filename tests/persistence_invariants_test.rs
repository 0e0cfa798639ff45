// Database-backed invariant tests. These need a real Postgres with the
// schema applied; they skip (pass) when DATABASE_URL is not set.

use std::time::Duration;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use fidmfers_backend::db::{create_diesel_pool, DieselDatabaseConfig, DieselPool};
use fidmfers_backend::models::{
    Generation, GenerationStatus, NewGeneration, NewPayment, Payment, PaymentPurpose,
    PaymentStatus, SharePlatform, SocialShare, User, Vote, GENERATION_QUOTA,
    MAX_VOTES_PER_USER, TOP_900_CAP,
};
use fidmfers_backend::models::user::UserProfileUpdate;
use fidmfers_backend::schema::generations;
use serial_test::serial;
use uuid::Uuid;

async fn test_pool() -> Option<DieselPool> {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;

    let config = DieselDatabaseConfig {
        url,
        max_connections: 4,
        min_connections: 1,
        connection_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(60),
        max_lifetime: Duration::from_secs(600),
        test_on_checkout: true,
    };

    create_diesel_pool(config).await.ok()
}

fn unique_fid() -> i64 {
    // High range keeps test rows away from real FIDs
    1_000_000_000 + (Uuid::new_v4().as_u128() % 1_000_000_000) as i64
}

fn unique_tx_hash() -> String {
    format!("0x{}", hex::encode(Uuid::new_v4().as_bytes().repeat(2)))
}

async fn seed_user(
    conn: &mut diesel_async::AsyncPgConnection,
) -> User {
    User::upsert_by_fid(
        conn,
        unique_fid(),
        UserProfileUpdate {
            username: Some("invariant-tester".to_string()),
            display_name: None,
            pfp_url: None,
            bio: None,
            custody_address: None,
            primary_address: None,
            verified_addresses: Some(vec![]),
        },
    )
    .await
    .expect("user upsert")
}

async fn seed_confirmed_payment(
    conn: &mut diesel_async::AsyncPgConnection,
    user: &User,
) -> Payment {
    Payment::create(
        conn,
        NewPayment {
            user_id: user.id,
            amount: "0.99".to_string(),
            token_symbol: "USDC".to_string(),
            tx_hash: unique_tx_hash(),
            status: PaymentStatus::Confirmed.as_str().to_string(),
            purpose: PaymentPurpose::Generation.as_str().to_string(),
            generation_id: None,
        },
    )
    .await
    .expect("payment insert")
}

async fn seed_generation(
    conn: &mut diesel_async::AsyncPgConnection,
    user: &User,
    status: GenerationStatus,
) -> Generation {
    let generation = Generation::create(
        conn,
        NewGeneration {
            user_id: user.id,
            fid: user.fid,
            prompt: "test".to_string(),
            status: status.as_str().to_string(),
            image_url: "https://img.example/x.png".to_string(),
            user_pfp_url: None,
            user_bio: None,
            user_followers: Some(10),
            user_verified: true,
        },
    )
    .await
    .expect("generation insert");
    assert_eq!(generation.status, status.as_str());
    generation
}

#[tokio::test]
#[serial]
async fn credit_consumption_stops_at_the_quota() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = pool.get().await.expect("conn");

    let user = seed_user(&mut conn).await;
    let payment = seed_confirmed_payment(&mut conn, &user).await;

    for _ in 0..GENERATION_QUOTA {
        assert!(Payment::try_consume_credit(&mut conn, payment.id)
            .await
            .expect("consume"));
    }

    // The quota predicate is in the UPDATE itself
    assert!(!Payment::try_consume_credit(&mut conn, payment.id)
        .await
        .expect("consume"));

    let credits = Payment::available_credit_ids(&mut conn, user.id)
        .await
        .expect("credits");
    assert!(credits.is_empty());
}

#[tokio::test]
#[serial]
async fn mint_transitions_are_single_shot() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = pool.get().await.expect("conn");

    let user = seed_user(&mut conn).await;
    let generation = seed_generation(&mut conn, &user, GenerationStatus::Completed).await;

    // The token id is the owner's FID
    assert!(
        Generation::begin_mint(&mut conn, generation.id, user.fid, "ipfs://img", "ipfs://meta")
            .await
            .expect("begin")
    );
    // Second prepare loses: the row is no longer COMPLETED with a free token id
    assert!(
        !Generation::begin_mint(&mut conn, generation.id, user.fid, "ipfs://i2", "ipfs://m2")
            .await
            .expect("begin")
    );

    let hash = unique_tx_hash();
    let minted = Generation::finalize_mint(&mut conn, generation.id, &hash)
        .await
        .expect("finalize")
        .expect("row was PENDING");
    assert_eq!(minted.status, GenerationStatus::Minted.as_str());
    assert_eq!(minted.token_id, Some(user.fid));
    assert!(minted.in_gallery);
    assert_eq!(minted.tx_hash.as_deref(), Some(hash.as_str()));

    // Replay finds nothing in PENDING
    assert!(Generation::finalize_mint(&mut conn, generation.id, &hash)
        .await
        .expect("finalize")
        .is_none());
}

#[tokio::test]
#[serial]
async fn token_id_is_the_fid_and_each_fid_claims_once() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = pool.get().await.expect("conn");

    let user = seed_user(&mut conn).await;
    let first = seed_generation(&mut conn, &user, GenerationStatus::Completed).await;
    let second = seed_generation(&mut conn, &user, GenerationStatus::Completed).await;

    assert!(!Generation::fid_token_exists(&mut conn, user.fid)
        .await
        .expect("claim check"));

    assert!(
        Generation::begin_mint(&mut conn, first.id, user.fid, "ipfs://img", "ipfs://meta")
            .await
            .expect("begin")
    );

    // The minted token carries the FID, not a running counter
    let claimed = Generation::find_by_id(&mut conn, first.id).await.expect("row");
    assert_eq!(claimed.token_id, Some(user.fid));

    // The claim blocks every other generation the same user made
    assert!(Generation::fid_token_exists(&mut conn, user.fid)
        .await
        .expect("claim check"));
    let other = Generation::find_by_id(&mut conn, second.id).await.expect("row");
    assert!(other.token_id.is_none());
}

#[tokio::test]
#[serial]
async fn vote_cap_and_uniqueness_hold() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = pool.get().await.expect("conn");

    let voter = seed_user(&mut conn).await;
    let owner = seed_user(&mut conn).await;

    let mut targets = Vec::new();
    for _ in 0..(MAX_VOTES_PER_USER + 1) {
        targets.push(seed_generation(&mut conn, &owner, GenerationStatus::Completed).await);
    }

    for target in targets.iter().take(MAX_VOTES_PER_USER as usize) {
        Vote::cast(&mut conn, voter.id, target.id).await.expect("vote");
    }

    // Duplicate pair
    let duplicate = Vote::cast(&mut conn, voter.id, targets[0].id).await;
    assert!(matches!(
        duplicate,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _
        ))
    ));

    // Over the cap
    let over_cap = Vote::cast(&mut conn, voter.id, targets[MAX_VOTES_PER_USER as usize].id).await;
    assert!(matches!(
        over_cap,
        Err(diesel::result::Error::RollbackTransaction)
    ));

    // Retraction frees a slot and decrements the counter
    assert!(Vote::retract(&mut conn, voter.id, targets[0].id)
        .await
        .expect("retract"));
    let refreshed = Generation::find_by_id(&mut conn, targets[0].id)
        .await
        .expect("row");
    assert_eq!(refreshed.vote_count, 0);
}

#[tokio::test]
#[serial]
async fn first_share_awards_a_point_replay_does_not() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = pool.get().await.expect("conn");

    let user = seed_user(&mut conn).await;
    let generation = seed_generation(&mut conn, &user, GenerationStatus::Completed).await;

    assert!(
        SocialShare::record(&mut conn, user.id, generation.id, SharePlatform::Farcaster)
            .await
            .expect("share")
    );
    assert!(
        !SocialShare::record(&mut conn, user.id, generation.id, SharePlatform::Farcaster)
            .await
            .expect("share replay")
    );
    // A different platform is a new triple
    assert!(
        SocialShare::record(&mut conn, user.id, generation.id, SharePlatform::X)
            .await
            .expect("share on X")
    );

    let refreshed = Generation::find_by_id(&mut conn, generation.id)
        .await
        .expect("row");
    assert_eq!(refreshed.vote_count, 2);
    assert!(refreshed.in_gallery);
}

#[tokio::test]
#[serial]
async fn referral_is_set_once_and_self_referral_never_counts() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = pool.get().await.expect("conn");

    let referrer = seed_user(&mut conn).await;
    let referee = seed_user(&mut conn).await;

    assert!(
        User::attach_referrer(&mut conn, referee.id, &referrer.referral_code)
            .await
            .expect("attach")
    );
    // Second attach is a no-op
    assert!(
        !User::attach_referrer(&mut conn, referee.id, &referrer.referral_code)
            .await
            .expect("attach replay")
    );

    User::increment_referral_count(&mut conn, referrer.id)
        .await
        .expect("count");
    let refreshed = User::find_by_id(&mut conn, referrer.id).await.expect("row");
    assert_eq!(refreshed.referral_count, 1);
}

#[tokio::test]
#[serial]
async fn concurrent_credit_consumption_never_overspends() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = pool.get().await.expect("conn");

    let user = seed_user(&mut conn).await;
    let payment = seed_confirmed_payment(&mut conn, &user).await;
    drop(conn);

    // More contenders than credits, each on its own connection
    let mut handles = Vec::new();
    for _ in 0..(GENERATION_QUOTA + 3) {
        let pool = pool.clone();
        let payment_id = payment.id;
        handles.push(tokio::spawn(async move {
            let mut conn = pool.get().await.expect("conn");
            Payment::try_consume_credit(&mut conn, payment_id)
                .await
                .expect("consume")
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.expect("task") {
            granted += 1;
        }
    }
    assert_eq!(granted, GENERATION_QUOTA);
}

#[tokio::test]
#[serial]
async fn concurrent_votes_respect_the_cap() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = pool.get().await.expect("conn");

    let voter = seed_user(&mut conn).await;
    let owner = seed_user(&mut conn).await;

    let mut targets = Vec::new();
    for _ in 0..(MAX_VOTES_PER_USER + 2) {
        targets.push(seed_generation(&mut conn, &owner, GenerationStatus::Completed).await);
    }
    drop(conn);

    // All casts race on distinct targets; only the cap can stop them
    let mut handles = Vec::new();
    for target in &targets {
        let pool = pool.clone();
        let voter_id = voter.id;
        let target_id = target.id;
        handles.push(tokio::spawn(async move {
            let mut conn = pool.get().await.expect("conn");
            Vote::cast(&mut conn, voter_id, target_id).await
        }));
    }

    let mut successes = 0i64;
    for handle in handles {
        if handle.await.expect("task").is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, MAX_VOTES_PER_USER);

    let mut conn = pool.get().await.expect("conn");
    let recorded = Vote::count_for_user(&mut conn, voter.id).await.expect("count");
    assert_eq!(recorded, MAX_VOTES_PER_USER);
}

#[tokio::test]
#[serial]
async fn concurrent_selection_stops_at_the_cap() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = pool.get().await.expect("conn");

    let owner = seed_user(&mut conn).await;

    // Fill to one below the cap, on top of whatever is already selected
    let current = Generation::count_top_900(&mut conn).await.expect("count");
    let needed = (TOP_900_CAP - 1 - current).max(0);
    let fillers: Vec<NewGeneration> = (0..needed)
        .map(|_| NewGeneration {
            user_id: owner.id,
            fid: owner.fid,
            prompt: "filler".to_string(),
            status: GenerationStatus::Completed.as_str().to_string(),
            image_url: "https://img.example/x.png".to_string(),
            user_pfp_url: None,
            user_bio: None,
            user_followers: Some(10),
            user_verified: true,
        })
        .collect();
    let filler_ids: Vec<Uuid> = diesel::insert_into(generations::table)
        .values(&fillers)
        .returning(generations::id)
        .get_results(&mut conn)
        .await
        .expect("filler insert");
    diesel::update(generations::table.filter(generations::id.eq_any(&filler_ids)))
        .set(generations::selected_for_900.eq(true))
        .execute(&mut conn)
        .await
        .expect("filler select");

    let left = seed_generation(&mut conn, &owner, GenerationStatus::Completed).await;
    let right = seed_generation(&mut conn, &owner, GenerationStatus::Completed).await;
    drop(conn);

    // One slot, two racing selects
    let select = |generation_id: Uuid| {
        let pool = pool.clone();
        tokio::spawn(async move {
            let mut conn = pool.get().await.expect("conn");
            Generation::set_top_900(&mut conn, generation_id, true).await
        })
    };
    let left_handle = select(left.id);
    let right_handle = select(right.id);
    let outcomes = [
        left_handle.await.expect("task"),
        right_handle.await.expect("task"),
    ];

    let successes = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(successes, 1);

    let mut conn = pool.get().await.expect("conn");
    let selected = Generation::count_top_900(&mut conn).await.expect("count");
    assert_eq!(selected, TOP_900_CAP);

    // Deselect everything this test touched so reruns start clean
    let mut cleanup_ids = filler_ids;
    cleanup_ids.push(left.id);
    cleanup_ids.push(right.id);
    diesel::update(generations::table.filter(generations::id.eq_any(&cleanup_ids)))
        .set(generations::selected_for_900.eq(false))
        .execute(&mut conn)
        .await
        .expect("cleanup");
}
