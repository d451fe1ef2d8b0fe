//! Visits and drop-in passes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{DropInPass, Visit, VisitFeeKind, VisitSettlement, Visitor};
use sqlx::PgPool;

use super::PgStore;
use crate::error::BoxError;
use crate::services::checkin::VisitStore;

#[derive(sqlx::FromRow)]
struct PassRow {
    id: i64,
    stripe_customer_id: Option<String>,
    payment_intent_id: Option<String>,
    authorized_amount: i64,
    created_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl From<PassRow> for DropInPass {
    fn from(row: PassRow) -> Self {
        DropInPass {
            id: row.id,
            stripe_customer_id: row.stripe_customer_id,
            payment_intent_id: row.payment_intent_id,
            authorized_amount: row.authorized_amount,
            created_at: row.created_at,
            used_at: row.used_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VisitRow {
    id: i64,
    visitor_kind: String,
    visitor_ref: i64,
    seat_id: i64,
    checked_in_at: DateTime<Utc>,
    checked_out_at: Option<DateTime<Utc>>,
    payment_intent_id: Option<String>,
    authorized_amount: i64,
    fee_kind: String,
    fee_amount: i64,
    captured_amount: i64,
}

impl TryFrom<VisitRow> for Visit {
    type Error = BoxError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        let visitor = Visitor::from_db(&row.visitor_kind, row.visitor_ref)
            .ok_or_else(|| format!("unknown visitor kind on visit {}", row.id))?;
        Ok(Visit {
            id: row.id,
            visitor,
            seat_id: row.seat_id,
            checked_in_at: row.checked_in_at,
            checked_out_at: row.checked_out_at,
            payment_intent_id: row.payment_intent_id,
            authorized_amount: row.authorized_amount,
            fee_kind: VisitFeeKind::from_db(&row.fee_kind),
            fee_amount: row.fee_amount,
            captured_amount: row.captured_amount,
        })
    }
}

pub async fn find_pass(pool: &PgPool, pass_id: i64) -> Result<Option<DropInPass>, sqlx::Error> {
    let row: Option<PassRow> = sqlx::query_as(
        "SELECT id, stripe_customer_id, payment_intent_id, authorized_amount, created_at, used_at
         FROM drop_in_passes WHERE id = $1",
    )
    .bind(pass_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(DropInPass::from))
}

pub async fn insert_pass(pool: &PgPool, pass: &DropInPass) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO drop_in_passes (id, stripe_customer_id, payment_intent_id, authorized_amount, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(pass.id)
    .bind(&pass.stripe_customer_id)
    .bind(&pass.payment_intent_id)
    .bind(pass.authorized_amount)
    .bind(pass.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn claim_pass(pool: &PgPool, pass_id: i64, at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE drop_in_passes SET used_at = $2 WHERE id = $1 AND used_at IS NULL")
            .bind(pass_id)
            .bind(at)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn unclaim_pass(pool: &PgPool, pass_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE drop_in_passes SET used_at = NULL WHERE id = $1")
        .bind(pass_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn open_visit(pool: &PgPool, visitor: &Visitor) -> Result<Option<Visit>, BoxError> {
    let row: Option<VisitRow> = sqlx::query_as(
        "SELECT id, visitor_kind, visitor_ref, seat_id, checked_in_at, checked_out_at,
                payment_intent_id, authorized_amount, fee_kind, fee_amount, captured_amount
         FROM visits
         WHERE visitor_kind = $1 AND visitor_ref = $2 AND checked_out_at IS NULL",
    )
    .bind(visitor.kind_db())
    .bind(visitor.ref_id())
    .fetch_optional(pool)
    .await?;
    row.map(Visit::try_from).transpose()
}

pub async fn insert_visit(pool: &PgPool, visit: &Visit) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO visits (id, visitor_kind, visitor_ref, seat_id, checked_in_at,
                             payment_intent_id, authorized_amount)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(visit.id)
    .bind(visit.visitor.kind_db())
    .bind(visit.visitor.ref_id())
    .bind(visit.seat_id)
    .bind(visit.checked_in_at)
    .bind(&visit.payment_intent_id)
    .bind(visit.authorized_amount)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn close_visit(
    pool: &PgPool,
    visit_id: i64,
    settlement: &VisitSettlement,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE visits SET checked_out_at = $2, fee_kind = $3, fee_amount = $4, captured_amount = $5
         WHERE id = $1 AND checked_out_at IS NULL",
    )
    .bind(visit_id)
    .bind(settlement.checked_out_at)
    .bind(settlement.fee_kind.as_db())
    .bind(settlement.fee_amount)
    .bind(settlement.captured_amount)
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl VisitStore for PgStore {
    async fn find_pass(&self, pass_id: i64) -> Result<Option<DropInPass>, BoxError> {
        Ok(find_pass(&self.pool, pass_id).await?)
    }

    async fn insert_pass(&self, pass: &DropInPass) -> Result<(), BoxError> {
        Ok(insert_pass(&self.pool, pass).await?)
    }

    async fn claim_pass(&self, pass_id: i64, at: DateTime<Utc>) -> Result<bool, BoxError> {
        Ok(claim_pass(&self.pool, pass_id, at).await?)
    }

    async fn unclaim_pass(&self, pass_id: i64) -> Result<(), BoxError> {
        Ok(unclaim_pass(&self.pool, pass_id).await?)
    }

    async fn open_visit(&self, visitor: &Visitor) -> Result<Option<Visit>, BoxError> {
        open_visit(&self.pool, visitor).await
    }

    async fn insert_visit(&self, visit: &Visit) -> Result<(), BoxError> {
        Ok(insert_visit(&self.pool, visit).await?)
    }

    async fn close_visit(
        &self,
        visit_id: i64,
        settlement: &VisitSettlement,
    ) -> Result<(), BoxError> {
        Ok(close_visit(&self.pool, visit_id, settlement).await?)
    }
}
