// Payment database model
// A confirmed payment grants a fixed number of generation credits;
// credit consumption is a single conditional UPDATE so two concurrent
// generation requests can never overspend the same payment.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::payments;

/// Generations granted per confirmed payment
pub const GENERATION_QUOTA: i32 = 2;

/// Payment status enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Confirmed => "CONFIRMED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "CONFIRMED" => Ok(PaymentStatus::Confirmed),
            "FAILED" => Ok(PaymentStatus::Failed),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// What the payment was for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentPurpose {
    Generation,
    Mint,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Generation => "GENERATION",
            PaymentPurpose::Mint => "MINT",
        }
    }
}

impl FromStr for PaymentPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENERATION" => Ok(PaymentPurpose::Generation),
            "MINT" => Ok(PaymentPurpose::Mint),
            _ => Err(format!("Invalid payment purpose: {}", s)),
        }
    }
}

/// Payment database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: String,
    pub token_symbol: String,
    pub tx_hash: String,
    pub status: String,
    pub purpose: String,
    pub generations_used: i32,
    pub generation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New payment for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub amount: String,
    pub token_symbol: String,
    pub tx_hash: String,
    pub status: String,
    pub purpose: String,
    pub generation_id: Option<Uuid>,
}

impl Payment {
    /// Record a payment. The unique constraint on tx_hash enforces
    /// at-most-once recording per transaction.
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_payment: NewPayment,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(payments::table)
            .values(&new_payment)
            .get_result::<Payment>(conn)
            .await
    }

    pub async fn find_by_tx_hash(
        conn: &mut AsyncPgConnection,
        hash: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::payments::dsl::*;

        payments
            .filter(tx_hash.eq(hash))
            .first::<Payment>(conn)
            .await
            .optional()
    }

    pub async fn mark_status(
        conn: &mut AsyncPgConnection,
        payment_id: Uuid,
        new_status: PaymentStatus,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::payments::dsl::*;

        diesel::update(payments.filter(id.eq(payment_id)))
            .set((
                status.eq(new_status.as_str()),
                updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<Payment>(conn)
            .await
    }

    /// IDs of the user's confirmed payments with spare credits, newest first
    pub async fn available_credit_ids(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> Result<Vec<Uuid>, diesel::result::Error> {
        use crate::schema::payments::dsl::*;

        payments
            .filter(user_id.eq(owner))
            .filter(status.eq(PaymentStatus::Confirmed.as_str()))
            .filter(generations_used.lt(GENERATION_QUOTA))
            .order(created_at.desc())
            .select(id)
            .load::<Uuid>(conn)
            .await
    }

    /// Atomically consume one generation credit from a payment.
    /// The quota check is part of the UPDATE predicate; a plain
    /// read-then-write would race under concurrent requests.
    pub async fn try_consume_credit(
        conn: &mut AsyncPgConnection,
        payment_id: Uuid,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::payments::dsl::*;

        let updated = diesel::update(
            payments
                .filter(id.eq(payment_id))
                .filter(status.eq(PaymentStatus::Confirmed.as_str()))
                .filter(generations_used.lt(GENERATION_QUOTA)),
        )
        .set((
            generations_used.eq(generations_used + 1),
            updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await?;

        Ok(updated == 1)
    }

    /// Remaining credits across the user's confirmed payments
    pub async fn credits_remaining(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> Result<i64, diesel::result::Error> {
        use crate::schema::payments::dsl::*;
        use diesel::dsl::sum;

        let used: Option<i64> = payments
            .filter(user_id.eq(owner))
            .filter(status.eq(PaymentStatus::Confirmed.as_str()))
            .filter(generations_used.lt(GENERATION_QUOTA))
            .select(sum(generations_used))
            .first(conn)
            .await?;

        let open: i64 = payments
            .filter(user_id.eq(owner))
            .filter(status.eq(PaymentStatus::Confirmed.as_str()))
            .filter(generations_used.lt(GENERATION_QUOTA))
            .count()
            .get_result(conn)
            .await?;

        Ok(open * GENERATION_QUOTA as i64 - used.unwrap_or(0))
    }
}
