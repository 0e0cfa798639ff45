// Social share database model
// At most one share per (user, generation, platform); only the first
// share awards a gallery point.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::social_shares;

/// Platforms a generation can be shared to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SharePlatform {
    Farcaster,
    X,
}

impl SharePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharePlatform::Farcaster => "FARCASTER",
            SharePlatform::X => "X",
        }
    }
}

impl FromStr for SharePlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FARCASTER" => Ok(SharePlatform::Farcaster),
            "X" => Ok(SharePlatform::X),
            _ => Err(format!("Invalid share platform: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = social_shares)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SocialShare {
    pub id: Uuid,
    pub user_id: Uuid,
    pub generation_id: Uuid,
    pub platform: String,
    pub points_awarded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = social_shares)]
pub struct NewSocialShare {
    pub user_id: Uuid,
    pub generation_id: Uuid,
    pub platform: String,
    pub points_awarded: bool,
}

impl SocialShare {
    /// Record a share. Returns true when this was the first share for the
    /// triple (and a point was awarded); false on replay. Insert and point
    /// award happen in one transaction.
    pub async fn record(
        conn: &mut AsyncPgConnection,
        sharer: Uuid,
        target: Uuid,
        share_platform: SharePlatform,
    ) -> Result<bool, diesel::result::Error> {
        conn.build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                Box::pin(async move {
                    use crate::schema::social_shares::dsl::*;

                    let inserted = diesel::insert_into(social_shares)
                        .values(&NewSocialShare {
                            user_id: sharer,
                            generation_id: target,
                            platform: share_platform.as_str().to_string(),
                            points_awarded: true,
                        })
                        .on_conflict((user_id, generation_id, platform))
                        .do_nothing()
                        .execute(conn)
                        .await?;

                    if inserted == 0 {
                        return Ok(false);
                    }

                    super::generation::Generation::award_share_point(conn, target).await?;

                    Ok(true)
                })
            })
            .await
    }
}
