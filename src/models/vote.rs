// Vote database model
// One vote per (user, generation) pair, at most MAX_VOTES_PER_USER total.
// The cap is re-validated inside a SERIALIZABLE insert transaction: under
// READ COMMITTED two concurrent casts each see only their own row and
// both commit past the cap.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::votes;

/// Cumulative vote cap per user (across all generations)
pub const MAX_VOTES_PER_USER: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = votes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Vote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub generation_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = votes)]
pub struct NewVote {
    pub user_id: Uuid,
    pub generation_id: Uuid,
}

impl Vote {
    pub async fn count_for_user(
        conn: &mut AsyncPgConnection,
        voter: Uuid,
    ) -> Result<i64, diesel::result::Error> {
        use crate::schema::votes::dsl::*;

        votes.filter(user_id.eq(voter)).count().get_result(conn).await
    }

    /// Cast a vote and bump the generation's counter in one serializable
    /// transaction; a cast that loses to a concurrent writer is retried
    /// with the winner's row visible. Returns the user's vote count after
    /// the insert. Errors:
    /// - UniqueViolation: duplicate (user, generation) pair
    /// - RollbackTransaction: the per-user cap would be exceeded
    pub async fn cast(
        conn: &mut AsyncPgConnection,
        voter: Uuid,
        target: Uuid,
    ) -> Result<i64, diesel::result::Error> {
        let mut attempts = 0u8;
        loop {
            let result = conn
                .build_transaction()
                .serializable()
                .run::<_, diesel::result::Error, _>(|conn| {
                    Box::pin(async move {
                        use crate::schema::votes::dsl::*;

                        diesel::insert_into(votes)
                            .values(&NewVote {
                                user_id: voter,
                                generation_id: target,
                            })
                            .execute(conn)
                            .await?;

                        // Re-check the cap with the new row visible
                        let total: i64 = votes
                            .filter(user_id.eq(voter))
                            .count()
                            .get_result(conn)
                            .await?;

                        if total > MAX_VOTES_PER_USER {
                            return Err(diesel::result::Error::RollbackTransaction);
                        }

                        super::generation::Generation::increment_vote_count(conn, target).await?;

                        Ok(total)
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

    /// Remove a vote and decrement the generation's counter in one
    /// transaction. Returns false if no vote existed.
    pub async fn retract(
        conn: &mut AsyncPgConnection,
        voter: Uuid,
        target: Uuid,
    ) -> Result<bool, diesel::result::Error> {
        conn.build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                Box::pin(async move {
                    use crate::schema::votes::dsl::*;

                    let deleted = diesel::delete(
                        votes
                            .filter(user_id.eq(voter))
                            .filter(generation_id.eq(target)),
                    )
                    .execute(conn)
                    .await?;

                    if deleted == 0 {
                        return Ok(false);
                    }

                    super::generation::Generation::decrement_vote_count(conn, target).await?;

                    Ok(true)
                })
            })
            .await
    }
}
