// User database model
// Keyed by Farcaster FID; rows are upserted from directory snapshots

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::users;

/// Length of generated referral codes
const REFERRAL_CODE_LEN: usize = 8;

/// User database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub fid: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub bio: Option<String>,
    pub custody_address: Option<String>,
    pub primary_address: Option<String>,
    pub verified_addresses: Vec<String>,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub referral_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub fid: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub bio: Option<String>,
    pub custody_address: Option<String>,
    pub primary_address: Option<String>,
    pub verified_addresses: Vec<String>,
    pub referral_code: String,
}

/// Profile fields refreshed on every authenticated request
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub bio: Option<String>,
    pub custody_address: Option<String>,
    pub primary_address: Option<String>,
    pub verified_addresses: Option<Vec<String>>,
}

impl User {
    /// Find user by internal ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        users.filter(id.eq(user_id)).first::<User>(conn).await
    }

    /// Find user by FID
    pub async fn find_by_fid(
        conn: &mut AsyncPgConnection,
        user_fid: i64,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        users.filter(fid.eq(user_fid)).first::<User>(conn).await
    }

    /// Find user by referral code
    pub async fn find_by_referral_code(
        conn: &mut AsyncPgConnection,
        code: &str,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        users
            .filter(referral_code.eq(code))
            .first::<User>(conn)
            .await
    }

    /// Upsert a user keyed by FID from a fresh profile snapshot.
    /// The referral code is generated at creation and never changed.
    pub async fn upsert_by_fid(
        conn: &mut AsyncPgConnection,
        user_fid: i64,
        profile: UserProfileUpdate,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        let new_user = NewUser {
            fid: user_fid,
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
            pfp_url: profile.pfp_url.clone(),
            bio: profile.bio.clone(),
            custody_address: profile.custody_address.clone(),
            primary_address: profile.primary_address.clone(),
            verified_addresses: profile.verified_addresses.clone().unwrap_or_default(),
            referral_code: generate_referral_code(),
        };

        diesel::insert_into(users)
            .values(&new_user)
            .on_conflict(fid)
            .do_update()
            .set((&profile, updated_at.eq(diesel::dsl::now)))
            .get_result::<User>(conn)
            .await
    }

    /// Record the referrer for a user. Set-once: returns false if the user
    /// already has a referrer (the update matches zero rows).
    pub async fn attach_referrer(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        code: &str,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        let updated = diesel::update(users.filter(id.eq(user_id)).filter(referred_by.is_null()))
            .set(referred_by.eq(code))
            .execute(conn)
            .await?;

        Ok(updated == 1)
    }

    /// Monotonic referral counter bump for the referrer
    pub async fn increment_referral_count(
        conn: &mut AsyncPgConnection,
        referrer_id: Uuid,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(referrer_id)))
            .set(referral_count.eq(referral_count + 1))
            .execute(conn)
            .await?;

        Ok(())
    }
}

/// Generate a short alphanumeric referral code
pub fn generate_referral_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_CODE_LEN)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referral_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(code, code.to_uppercase());
    }

    #[test]
    fn test_referral_codes_are_not_constant() {
        let codes: std::collections::HashSet<String> =
            (0..32).map(|_| generate_referral_code()).collect();
        assert!(codes.len() > 1);
    }
}
