//! Plans, user plans and their subscription lifecycle

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::billing::{
    Amount, BillingPeriod, Campaign, CancellationPolicy, GroupPricing, OvertimeRate, TimeWindow,
};
use shared::models::{BillingCycle, Plan, UserPlan, UserPlanStatus};
use sqlx::PgPool;
use sqlx::types::Json;

use super::{PgStore, audit, webhook_events};
use crate::error::BoxError;
use crate::services::cancellation::PlanStore;

#[derive(sqlx::FromRow)]
struct PlanRow {
    id: i64,
    name: String,
    monthly_price: i64,
    billing_cycle: String,
    allowed_window: Option<Json<TimeWindow>>,
    cancellation: Json<CancellationPolicy>,
    overtime: Option<Json<OvertimeRate>>,
    group_pricing: Option<Json<GroupPricing>>,
    stripe_price_id: Option<String>,
}

impl TryFrom<PlanRow> for Plan {
    type Error = BoxError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let billing_cycle = BillingCycle::from_db(&row.billing_cycle)
            .ok_or_else(|| format!("unknown billing cycle: {}", row.billing_cycle))?;
        Ok(Plan {
            id: row.id,
            name: row.name,
            monthly_price: row.monthly_price,
            billing_cycle,
            allowed_window: row.allowed_window.map(|j| j.0),
            cancellation: row.cancellation.0,
            overtime: row.overtime.map(|j| j.0),
            group: row.group_pricing.map(|j| j.0),
            stripe_price_id: row.stripe_price_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserPlanRow {
    id: i64,
    member_id: i64,
    plan_id: i64,
    status: String,
    contract_start: NaiveDate,
    current_period_start: NaiveDate,
    current_period_end: NaiveDate,
    cancel_scheduled_on: Option<NaiveDate>,
    group_owner_id: Option<i64>,
    slot_number: Option<i32>,
    add_on_ids: Vec<i64>,
    stripe_subscription_id: Option<String>,
    stripe_customer_id: Option<String>,
    campaign: Option<Json<Campaign>>,
}

impl TryFrom<UserPlanRow> for UserPlan {
    type Error = BoxError;

    fn try_from(row: UserPlanRow) -> Result<Self, Self::Error> {
        let status = UserPlanStatus::from_db(&row.status)
            .ok_or_else(|| format!("unknown user plan status: {}", row.status))?;
        let slot_number = row
            .slot_number
            .map(u32::try_from)
            .transpose()
            .map_err(|_| format!("negative slot number on user plan {}", row.id))?;
        Ok(UserPlan {
            id: row.id,
            member_id: row.member_id,
            plan_id: row.plan_id,
            status,
            contract_start: row.contract_start,
            current_period: BillingPeriod {
                start: row.current_period_start,
                end: row.current_period_end,
            },
            cancel_scheduled_on: row.cancel_scheduled_on,
            group_owner_id: row.group_owner_id,
            slot_number,
            add_on_ids: row.add_on_ids,
            stripe_subscription_id: row.stripe_subscription_id,
            stripe_customer_id: row.stripe_customer_id,
            campaign: row.campaign.map(|j| j.0),
        })
    }
}

const USER_PLAN_SELECT: &str = "SELECT up.id, up.member_id, up.plan_id, up.status,
        up.contract_start, up.current_period_start, up.current_period_end,
        up.cancel_scheduled_on, up.group_owner_id, up.slot_number,
        ARRAY(SELECT a.add_on_id FROM user_plan_add_ons a
              WHERE a.user_plan_id = up.id ORDER BY a.add_on_id) AS add_on_ids,
        up.stripe_subscription_id, up.stripe_customer_id, up.campaign
    FROM user_plans up";

fn convert_all(rows: Vec<UserPlanRow>) -> Result<Vec<UserPlan>, BoxError> {
    rows.into_iter().map(UserPlan::try_from).collect()
}

pub async fn find_plan(pool: &PgPool, plan_id: i64) -> Result<Option<Plan>, BoxError> {
    let row: Option<PlanRow> = sqlx::query_as(
        "SELECT id, name, monthly_price, billing_cycle, allowed_window, cancellation,
                overtime, group_pricing, stripe_price_id
         FROM plans WHERE id = $1",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;
    row.map(Plan::try_from).transpose()
}

pub async fn find_user_plan(pool: &PgPool, id: i64) -> Result<Option<UserPlan>, BoxError> {
    let row: Option<UserPlanRow> = sqlx::query_as(&format!("{USER_PLAN_SELECT} WHERE up.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(UserPlan::try_from).transpose()
}

pub async fn latest_live_for_member(
    pool: &PgPool,
    member_id: i64,
) -> Result<Option<UserPlan>, BoxError> {
    let row: Option<UserPlanRow> = sqlx::query_as(&format!(
        "{USER_PLAN_SELECT}
         WHERE up.member_id = $1 AND up.status <> 'canceled'
         ORDER BY up.contract_start DESC, up.id DESC LIMIT 1"
    ))
    .bind(member_id)
    .fetch_optional(pool)
    .await?;
    row.map(UserPlan::try_from).transpose()
}

pub async fn due_cancellations(pool: &PgPool, today: NaiveDate) -> Result<Vec<UserPlan>, BoxError> {
    let rows: Vec<UserPlanRow> = sqlx::query_as(&format!(
        "{USER_PLAN_SELECT}
         WHERE up.status = 'cancel_scheduled' AND up.cancel_scheduled_on <= $1
         ORDER BY up.cancel_scheduled_on, up.id"
    ))
    .bind(today)
    .fetch_all(pool)
    .await?;
    convert_all(rows)
}

pub async fn group_members(pool: &PgPool, owner_id: i64) -> Result<Vec<UserPlan>, BoxError> {
    let rows: Vec<UserPlanRow> = sqlx::query_as(&format!(
        "{USER_PLAN_SELECT}
         WHERE up.group_owner_id = $1 AND up.status <> 'canceled'
         ORDER BY up.slot_number"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    convert_all(rows)
}

pub async fn set_cancel_scheduled(
    pool: &PgPool,
    user_plan_id: i64,
    on: NaiveDate,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE user_plans SET status = 'cancel_scheduled', cancel_scheduled_on = $2
         WHERE id = $1 AND status IN ('active', 'cancel_scheduled')",
    )
    .bind(user_plan_id)
    .bind(on)
    .execute(&mut *tx)
    .await?;
    audit::log(
        &mut *tx,
        &format!("user_plan:{user_plan_id}"),
        "cancellation_scheduled",
        Some(&serde_json::json!({ "cancel_on": on })),
    )
    .await?;
    tx.commit().await
}

/// Returns false if the plan was already canceled
pub async fn mark_canceled(
    pool: &PgPool,
    user_plan_id: i64,
    fee: Amount,
    at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        "UPDATE user_plans SET status = 'canceled', cancellation_fee = $2, canceled_at = $3
         WHERE id = $1 AND status <> 'canceled'",
    )
    .bind(user_plan_id)
    .bind(fee)
    .bind(at)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }
    audit::log(
        &mut *tx,
        &format!("user_plan:{user_plan_id}"),
        "canceled",
        Some(&serde_json::json!({ "fee": fee })),
    )
    .await?;
    tx.commit().await?;
    Ok(true)
}

pub async fn live_by_subscription(
    pool: &PgPool,
    subscription_id: &str,
) -> Result<Vec<UserPlan>, BoxError> {
    let rows: Vec<UserPlanRow> = sqlx::query_as(&format!(
        "{USER_PLAN_SELECT}
         WHERE up.stripe_subscription_id = $1 AND up.status <> 'canceled'
         ORDER BY up.id"
    ))
    .bind(subscription_id)
    .fetch_all(pool)
    .await?;
    convert_all(rows)
}

/// Only active plans fall to `past_due`; a scheduled cancellation is kept.
pub async fn mark_past_due(pool: &PgPool, subscription_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE user_plans SET status = 'past_due'
         WHERE stripe_subscription_id = $1 AND status = 'active'",
    )
    .bind(subscription_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn advance_period_by_subscription(
    pool: &PgPool,
    subscription_id: &str,
    period: BillingPeriod,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE user_plans SET current_period_start = $2, current_period_end = $3,
            status = CASE WHEN status = 'past_due' THEN 'active' ELSE status END
         WHERE stripe_subscription_id = $1 AND status <> 'canceled'
           AND current_period_start <= $2",
    )
    .bind(subscription_id)
    .bind(period.start)
    .bind(period.end)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl PlanStore for PgStore {
    async fn find_plan(&self, plan_id: i64) -> Result<Option<Plan>, BoxError> {
        find_plan(&self.pool, plan_id).await
    }

    async fn find_user_plan(&self, user_plan_id: i64) -> Result<Option<UserPlan>, BoxError> {
        find_user_plan(&self.pool, user_plan_id).await
    }

    async fn current_user_plan(
        &self,
        member_id: i64,
    ) -> Result<Option<(UserPlan, Plan)>, BoxError> {
        let Some(user_plan) = latest_live_for_member(&self.pool, member_id).await? else {
            return Ok(None);
        };
        let plan = find_plan(&self.pool, user_plan.plan_id)
            .await?
            .ok_or_else(|| format!("user plan {} references missing plan", user_plan.id))?;
        Ok(Some((user_plan, plan)))
    }

    async fn due_cancellations(&self, today: NaiveDate) -> Result<Vec<UserPlan>, BoxError> {
        due_cancellations(&self.pool, today).await
    }

    async fn group_members(&self, owner_id: i64) -> Result<Vec<UserPlan>, BoxError> {
        group_members(&self.pool, owner_id).await
    }

    async fn set_cancel_scheduled(
        &self,
        user_plan_id: i64,
        on: NaiveDate,
    ) -> Result<(), BoxError> {
        Ok(set_cancel_scheduled(&self.pool, user_plan_id, on).await?)
    }

    async fn mark_canceled(
        &self,
        user_plan_id: i64,
        fee: Amount,
        at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        Ok(mark_canceled(&self.pool, user_plan_id, fee, at).await?)
    }

    async fn record_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<bool, BoxError> {
        Ok(webhook_events::record(&self.pool, event_id, event_type).await?)
    }

    async fn forget_webhook_event(&self, event_id: &str) -> Result<(), BoxError> {
        Ok(webhook_events::forget(&self.pool, event_id).await?)
    }

    async fn live_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<UserPlan>, BoxError> {
        live_by_subscription(&self.pool, subscription_id).await
    }

    async fn mark_past_due(&self, subscription_id: &str) -> Result<u64, BoxError> {
        Ok(mark_past_due(&self.pool, subscription_id).await?)
    }

    async fn advance_period_by_subscription(
        &self,
        subscription_id: &str,
        period: BillingPeriod,
    ) -> Result<u64, BoxError> {
        Ok(advance_period_by_subscription(&self.pool, subscription_id, period).await?)
    }
}
