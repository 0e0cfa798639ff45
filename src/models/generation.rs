// Generation database model
// Carries the per-image state machine:
//   PROCESSING -> COMPLETED | FAILED        (generation step)
//   COMPLETED  -> PENDING   -> MINTED       (mint step)
// Transitions are conditional UPDATEs so concurrent callers cannot
// double-advance a row; the top-900 curation cap is enforced inside a
// single transaction.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::generations;

/// Global cap on admin-curated generations
pub const TOP_900_CAP: i64 = 900;

/// Generation status enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GenerationStatus {
    /// Awaiting on-chain mint confirmation
    Pending,
    /// Image synthesis in flight
    Processing,
    /// Image produced, mintable
    Completed,
    /// Image synthesis failed (terminal for the generation step)
    Failed,
    /// Minted on-chain (terminal)
    Minted,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "PENDING",
            GenerationStatus::Processing => "PROCESSING",
            GenerationStatus::Completed => "COMPLETED",
            GenerationStatus::Failed => "FAILED",
            GenerationStatus::Minted => "MINTED",
        }
    }

    /// Whether the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Pending)
                | (Pending, Minted)
                // admin regenerate re-runs the synthesis step
                | (Completed, Processing)
                | (Failed, Processing)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Minted)
    }
}

impl FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(GenerationStatus::Pending),
            "PROCESSING" => Ok(GenerationStatus::Processing),
            "COMPLETED" => Ok(GenerationStatus::Completed),
            "FAILED" => Ok(GenerationStatus::Failed),
            "MINTED" => Ok(GenerationStatus::Minted),
            _ => Err(format!("Invalid generation status: {}", s)),
        }
    }
}

/// Generation database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = generations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Generation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fid: i64,
    pub prompt: String,
    pub status: String,
    pub image_url: String,
    pub ipfs_image_uri: Option<String>,
    pub ipfs_metadata_uri: Option<String>,
    pub user_pfp_url: Option<String>,
    pub user_bio: Option<String>,
    pub user_followers: Option<i32>,
    pub user_verified: bool,
    pub vote_count: i32,
    pub selected_for_900: bool,
    pub in_gallery: bool,
    pub token_id: Option<i64>,
    pub tx_hash: Option<String>,
    pub minted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New generation for insertion (always starts PROCESSING)
#[derive(Debug, Insertable)]
#[diesel(table_name = generations)]
pub struct NewGeneration {
    pub user_id: Uuid,
    pub fid: i64,
    pub prompt: String,
    pub status: String,
    pub image_url: String,
    pub user_pfp_url: Option<String>,
    pub user_bio: Option<String>,
    pub user_followers: Option<i32>,
    pub user_verified: bool,
}

/// Identity snapshot refresh used by the admin regenerate flow
#[derive(Debug, AsChangeset)]
#[diesel(table_name = generations)]
pub struct SnapshotUpdate {
    pub user_pfp_url: Option<String>,
    pub user_bio: Option<String>,
    pub user_followers: Option<i32>,
    pub user_verified: Option<bool>,
}

/// Row shape for the public gallery listing
#[derive(Debug, Serialize, Queryable)]
pub struct GalleryEntry {
    pub id: Uuid,
    pub image_url: String,
    pub vote_count: i32,
    pub selected_for_900: bool,
    pub created_at: DateTime<Utc>,
    pub fid: i64,
    pub username: Option<String>,
    pub pfp_url: Option<String>,
}

impl Generation {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_generation: NewGeneration,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(generations::table)
            .values(&new_generation)
            .get_result::<Generation>(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        generations
            .filter(id.eq(generation_id))
            .first::<Generation>(conn)
            .await
    }

    pub fn status_enum(&self) -> GenerationStatus {
        GenerationStatus::from_str(&self.status).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid generation status '{}' for {}, treating as FAILED: {}",
                self.status,
                self.id,
                e
            );
            GenerationStatus::Failed
        })
    }

    /// PROCESSING -> COMPLETED with the produced image URI
    pub async fn mark_completed(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
        image: &str,
        ipfs_image: Option<&str>,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        diesel::update(generations.filter(id.eq(generation_id)))
            .set((
                status.eq(GenerationStatus::Completed.as_str()),
                image_url.eq(image),
                ipfs_image_uri.eq(ipfs_image),
                updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<Generation>(conn)
            .await
    }

    /// PROCESSING -> FAILED (terminal for the generation step)
    pub async fn mark_failed(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        diesel::update(generations.filter(id.eq(generation_id)))
            .set((
                status.eq(GenerationStatus::Failed.as_str()),
                updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Reset to PROCESSING with a refreshed identity snapshot (admin regenerate)
    pub async fn mark_reprocessing(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
        snapshot: SnapshotUpdate,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        diesel::update(generations.filter(id.eq(generation_id)))
            .set((
                snapshot,
                status.eq(GenerationStatus::Processing.as_str()),
                updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<Generation>(conn)
            .await
    }

    /// COMPLETED -> PENDING, binding the token id and IPFS URIs.
    /// Conditional on status and an unset token id; returns false if the
    /// row was already claimed by a concurrent prepare.
    pub async fn begin_mint(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
        minted_token_id: i64,
        ipfs_image: &str,
        ipfs_metadata: &str,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        let updated = diesel::update(
            generations
                .filter(id.eq(generation_id))
                .filter(status.eq(GenerationStatus::Completed.as_str()))
                .filter(token_id.is_null()),
        )
        .set((
            status.eq(GenerationStatus::Pending.as_str()),
            token_id.eq(minted_token_id),
            ipfs_image_uri.eq(ipfs_image),
            ipfs_metadata_uri.eq(ipfs_metadata),
            updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await?;

        Ok(updated == 1)
    }

    /// PENDING -> MINTED after on-chain confirmation; forces in_gallery.
    /// Returns None if the row was not in PENDING (replay, or never prepared).
    pub async fn finalize_mint(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
        hash: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        diesel::update(
            generations
                .filter(id.eq(generation_id))
                .filter(status.eq(GenerationStatus::Pending.as_str())),
        )
        .set((
            status.eq(GenerationStatus::Minted.as_str()),
            tx_hash.eq(hash),
            minted_at.eq(diesel::dsl::now),
            in_gallery.eq(true),
            updated_at.eq(diesel::dsl::now),
        ))
        .get_result::<Generation>(conn)
        .await
        .optional()
    }

    pub async fn increment_vote_count(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        diesel::update(generations.filter(id.eq(generation_id)))
            .set(vote_count.eq(vote_count + 1))
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Vote counts never go negative
    pub async fn decrement_vote_count(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        diesel::update(
            generations
                .filter(id.eq(generation_id))
                .filter(vote_count.gt(0)),
        )
        .set(vote_count.eq(vote_count - 1))
        .execute(conn)
        .await?;

        Ok(())
    }

    /// First-time social share bumps the vote count and surfaces the row
    pub async fn award_share_point(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        diesel::update(generations.filter(id.eq(generation_id)))
            .set((vote_count.eq(vote_count + 1), in_gallery.eq(true)))
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Toggle the top-900 curation flag. Selection is a count-then-set
    /// inside a serializable transaction: under READ COMMITTED two
    /// concurrent selects at cap-minus-one both count 899 and both land.
    /// Hitting the cap rolls back; losing the serialization race retries.
    pub async fn set_top_900(
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
        selected: bool,
    ) -> Result<(), diesel::result::Error> {
        let mut attempts = 0u8;
        loop {
            let result = conn
                .build_transaction()
                .serializable()
                .run::<_, diesel::result::Error, _>(|conn| {
                    Box::pin(async move {
                        use crate::schema::generations::dsl::*;

                        if selected {
                            let current: i64 = generations
                                .filter(selected_for_900.eq(true))
                                .count()
                                .get_result(conn)
                                .await?;

                            if current >= TOP_900_CAP {
                                return Err(diesel::result::Error::RollbackTransaction);
                            }
                        }

                        diesel::update(generations.filter(id.eq(generation_id)))
                            .set(selected_for_900.eq(selected))
                            .execute(conn)
                            .await?;

                        Ok(())
                    })
                })
                .await;

            match result {
                Err(diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::SerializationFailure,
                    _,
                )) if attempts < super::SERIALIZATION_RETRIES => {
                    attempts += 1;
                },
                other => return other,
            }
        }
    }

    /// Whether any generation already carries a token for this FID.
    /// Token ids are the FID itself, so one claimed row blocks every
    /// other generation the same user made.
    pub async fn fid_token_exists(
        conn: &mut AsyncPgConnection,
        owner_fid: i64,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::generations::dsl::*;
        use diesel::dsl::{exists, select};

        select(exists(
            generations
                .filter(fid.eq(owner_fid))
                .filter(token_id.is_not_null()),
        ))
        .get_result(conn)
        .await
    }

    pub async fn count_top_900(
        conn: &mut AsyncPgConnection,
    ) -> Result<i64, diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        generations
            .filter(selected_for_900.eq(true))
            .count()
            .get_result(conn)
            .await
    }

    /// Public gallery page: visible, completed-or-minted rows joined with
    /// their owner's public profile, best-voted first
    pub async fn gallery_page(
        conn: &mut AsyncPgConnection,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<GalleryEntry>, i64), diesel::result::Error> {
        use crate::schema::generations::dsl as g;
        use crate::schema::users::dsl as u;

        let offset = (page - 1).max(0) * limit;

        let entries = g::generations
            .inner_join(u::users)
            .filter(g::in_gallery.eq(true))
            .filter(g::status.eq_any(vec![
                GenerationStatus::Completed.as_str(),
                GenerationStatus::Minted.as_str(),
            ]))
            .order((g::vote_count.desc(), g::created_at.desc()))
            .offset(offset)
            .limit(limit)
            .select((
                g::id,
                g::image_url,
                g::vote_count,
                g::selected_for_900,
                g::created_at,
                u::fid,
                u::username,
                u::pfp_url,
            ))
            .load::<GalleryEntry>(conn)
            .await?;

        let total: i64 = g::generations
            .filter(g::in_gallery.eq(true))
            .filter(g::status.eq_any(vec![
                GenerationStatus::Completed.as_str(),
                GenerationStatus::Minted.as_str(),
            ]))
            .count()
            .get_result(conn)
            .await?;

        Ok((entries, total))
    }

    /// Admin listing: everything, newest first
    pub async fn admin_page(
        conn: &mut AsyncPgConnection,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Self>, i64), diesel::result::Error> {
        use crate::schema::generations::dsl::*;

        let offset = (page - 1).max(0) * limit;

        let rows = generations
            .order(created_at.desc())
            .offset(offset)
            .limit(limit)
            .load::<Generation>(conn)
            .await?;

        let total: i64 = generations.count().get_result(conn).await?;

        Ok((rows, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            GenerationStatus::Pending,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
            GenerationStatus::Minted,
        ] {
            assert_eq!(GenerationStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(GenerationStatus::from_str("minted").is_err());
    }

    #[test]
    fn test_generation_step_transitions() {
        use GenerationStatus::*;
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Minted));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn test_mint_step_transitions() {
        use GenerationStatus::*;
        assert!(Completed.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Minted));
        assert!(!Completed.can_transition_to(Minted));
        assert!(!Minted.can_transition_to(Pending));
        assert!(Minted.is_terminal());
    }

    #[test]
    fn test_regenerate_transitions() {
        use GenerationStatus::*;
        assert!(Completed.can_transition_to(Processing));
        assert!(Failed.can_transition_to(Processing));
        assert!(!Minted.can_transition_to(Processing));
    }
}
