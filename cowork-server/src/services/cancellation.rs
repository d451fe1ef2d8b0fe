//! Scheduled plan cancellations
//!
//! `schedule_cancellation` records the date; `run_due_cancellations` is the
//! job that executes every cancellation that has come due. The job is safe to
//! re-run: Stripe calls carry idempotency keys and an already-missing
//! subscription counts as canceled.
//!
//! The fee is charged before the subscription is canceled, so a row whose
//! charge fails still has a live subscription and stays due for the next run.
//! Only the job moves a `cancel_scheduled` row to `canceled`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use shared::billing::{Amount, BillingPeriod, CancellationFee, calculate_cancellation_fee};
use shared::error::{AppError, ErrorCode};
use shared::models::{Plan, UserPlan, UserPlanStatus};

use super::occupancy::{OccupancyStore, release_plan_lockers};
use crate::error::{BoxError, ServiceResult};
use crate::stripe::{OffSessionCharge, PaymentGateway};

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn find_plan(&self, plan_id: i64) -> Result<Option<Plan>, BoxError>;
    async fn find_user_plan(&self, user_plan_id: i64) -> Result<Option<UserPlan>, BoxError>;
    /// The member's most recent user plan that is not canceled, with its plan
    async fn current_user_plan(&self, member_id: i64)
    -> Result<Option<(UserPlan, Plan)>, BoxError>;

    /// `CancelScheduled` plans due on or before `today`, by date then id
    async fn due_cancellations(&self, today: NaiveDate) -> Result<Vec<UserPlan>, BoxError>;
    /// Live secondary slots of a group owner
    async fn group_members(&self, owner_id: i64) -> Result<Vec<UserPlan>, BoxError>;
    async fn set_cancel_scheduled(&self, user_plan_id: i64, on: NaiveDate)
    -> Result<(), BoxError>;
    /// Returns false when the plan was already canceled
    async fn mark_canceled(
        &self,
        user_plan_id: i64,
        fee: Amount,
        at: DateTime<Utc>,
    ) -> Result<bool, BoxError>;

    /// Insert-first webhook dedup. Returns false for an event seen before.
    async fn record_webhook_event(&self, event_id: &str, event_type: &str)
    -> Result<bool, BoxError>;
    /// Drop a recorded event so a redelivery is processed again
    async fn forget_webhook_event(&self, event_id: &str) -> Result<(), BoxError>;
    /// Plans on the subscription that are not canceled yet
    async fn live_by_subscription(&self, subscription_id: &str)
    -> Result<Vec<UserPlan>, BoxError>;
    /// Active plans on the subscription fall to `past_due`
    async fn mark_past_due(&self, subscription_id: &str) -> Result<u64, BoxError>;
    /// Move to the next billing period and reactivate a past-due plan
    async fn advance_period_by_subscription(
        &self,
        subscription_id: &str,
        period: BillingPeriod,
    ) -> Result<u64, BoxError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CancellationRunSummary {
    pub examined: usize,
    pub canceled: usize,
    pub failed: usize,
    /// Secondary group slots closed because their owner was canceled
    pub group_members_canceled: usize,
    pub fees_charged: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationPreview {
    pub user_plan_id: i64,
    pub cancel_on: NaiveDate,
    pub fee: CancellationFee,
}

struct RowOutcome {
    fee_charged: Amount,
    members_canceled: Vec<i64>,
}

/// What a deleted Stripe subscription did to the plans billed through it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionEndSummary {
    pub canceled: usize,
    pub group_members_canceled: usize,
    /// `cancel_scheduled` rows left for the job to finish
    pub left_for_job: usize,
}

/// Schedule `user_plan_id` to end on `on` and preview the fee.
///
/// An earlier date replaces a pending one; a later date is rejected.
pub async fn schedule_cancellation(
    plans: &dyn PlanStore,
    user_plan_id: i64,
    on: NaiveDate,
    today: NaiveDate,
) -> ServiceResult<CancellationPreview> {
    let user_plan = plans
        .find_user_plan(user_plan_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserPlanNotFound))?;

    match user_plan.status {
        UserPlanStatus::Canceled => return Err(AppError::new(ErrorCode::PlanAlreadyCanceled).into()),
        status if !status.can_transition_to(UserPlanStatus::CancelScheduled) => {
            return Err(AppError::with_message(
                ErrorCode::NoActivePlan,
                format!("Plan in status {} cannot be cancelled", status.as_db()),
            )
            .into());
        }
        _ => {}
    }

    if on < today || on < user_plan.contract_start {
        return Err(AppError::new(ErrorCode::CancellationDateInvalid)
            .with_detail("cancel_on", on.to_string())
            .into());
    }
    if let Some(pending) = user_plan.cancel_scheduled_on
        && user_plan.status == UserPlanStatus::CancelScheduled
        && on > pending
    {
        return Err(AppError::new(ErrorCode::CancellationAlreadyScheduled)
            .with_detail("cancel_on", pending.to_string())
            .into());
    }

    let plan = plans
        .find_plan(user_plan.plan_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::PlanNotFound))?;
    let fee = calculate_cancellation_fee(
        &plan.cancellation,
        user_plan.contract_start,
        on,
        user_plan.base_price(&plan),
    )?;

    plans.set_cancel_scheduled(user_plan_id, on).await?;
    tracing::info!(user_plan_id, cancel_on = %on, fee = fee.amount, "Cancellation scheduled");

    Ok(CancellationPreview {
        user_plan_id,
        cancel_on: on,
        fee,
    })
}

/// Execute every cancellation due on `today`.
///
/// Rows run one after another. A failing row is logged and counted and the
/// loop moves on; only failing to list the due rows aborts the run.
pub async fn run_due_cancellations(
    plans: &dyn PlanStore,
    seats: &dyn OccupancyStore,
    payments: &dyn PaymentGateway,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> ServiceResult<CancellationRunSummary> {
    let due = plans.due_cancellations(today).await?;
    let mut summary = CancellationRunSummary {
        examined: due.len(),
        ..Default::default()
    };
    let mut closed_by_owner: HashSet<i64> = HashSet::new();

    for user_plan in &due {
        if closed_by_owner.contains(&user_plan.id) {
            continue;
        }
        match cancel_user_plan(plans, seats, payments, user_plan, now).await {
            Ok(outcome) => {
                summary.canceled += 1;
                summary.fees_charged += outcome.fee_charged;
                summary.group_members_canceled += outcome.members_canceled.len();
                closed_by_owner.extend(outcome.members_canceled);
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(
                    user_plan_id = user_plan.id,
                    member_id = user_plan.member_id,
                    error = %e,
                    "Scheduled cancellation failed"
                );
            }
        }
    }

    tracing::info!(
        examined = summary.examined,
        canceled = summary.canceled,
        failed = summary.failed,
        group_members_canceled = summary.group_members_canceled,
        fees_charged = summary.fees_charged,
        "Cancellation run finished"
    );
    Ok(summary)
}

async fn cancel_user_plan(
    plans: &dyn PlanStore,
    seats: &dyn OccupancyStore,
    payments: &dyn PaymentGateway,
    user_plan: &UserPlan,
    now: DateTime<Utc>,
) -> ServiceResult<RowOutcome> {
    let effective = user_plan
        .cancel_scheduled_on
        .ok_or_else(|| AppError::new(ErrorCode::CancellationDateInvalid))?;
    let plan = plans
        .find_plan(user_plan.plan_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::PlanNotFound))?;
    let fee = calculate_cancellation_fee(
        &plan.cancellation,
        user_plan.contract_start,
        effective,
        user_plan.base_price(&plan),
    )?;

    if fee.amount > 0 {
        charge_fee(payments, user_plan, fee.amount).await?;
    }
    if let Some(subscription_id) = &user_plan.stripe_subscription_id {
        payments.cancel_subscription(subscription_id).await?;
    }

    let members_canceled = close_out(plans, seats, payments, user_plan, fee.amount, now).await?;
    Ok(RowOutcome {
        fee_charged: fee.amount,
        members_canceled,
    })
}

async fn charge_fee(
    payments: &dyn PaymentGateway,
    user_plan: &UserPlan,
    amount: Amount,
) -> ServiceResult<()> {
    let customer_id = user_plan.stripe_customer_id.as_deref().ok_or_else(|| {
        AppError::with_message(
            ErrorCode::PaymentFailed,
            "No Stripe customer to charge the early-termination fee",
        )
    })?;
    let idempotency_key = format!("cancel-fee-{}", user_plan.id);
    let payment_intent = payments
        .charge_off_session(&OffSessionCharge {
            customer_id,
            amount,
            description: "Early termination fee",
            idempotency_key: &idempotency_key,
        })
        .await?;
    tracing::info!(
        user_plan_id = user_plan.id,
        amount,
        payment_intent = %payment_intent,
        "Early-termination fee charged"
    );
    Ok(())
}

/// Release the plan's lockers, close its group slots and mark it canceled.
/// Returns the ids of the group slots closed with it.
async fn close_out(
    plans: &dyn PlanStore,
    seats: &dyn OccupancyStore,
    payments: &dyn PaymentGateway,
    user_plan: &UserPlan,
    fee: Amount,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<i64>> {
    let lockers = release_plan_lockers(seats, user_plan.id, now).await?;
    if lockers > 0 {
        tracing::info!(user_plan_id = user_plan.id, lockers, "Lockers released");
    }

    let mut members_canceled = Vec::new();
    if user_plan.is_group_owner() {
        for member in plans.group_members(user_plan.id).await? {
            if let Some(subscription_id) = &member.stripe_subscription_id {
                payments.cancel_subscription(subscription_id).await?;
            }
            release_plan_lockers(seats, member.id, now).await?;
            if plans.mark_canceled(member.id, 0, now).await? {
                tracing::info!(
                    user_plan_id = member.id,
                    owner_id = user_plan.id,
                    "Group slot closed with owner"
                );
                members_canceled.push(member.id);
            }
        }
    }

    if plans.mark_canceled(user_plan.id, fee, now).await? {
        tracing::info!(
            user_plan_id = user_plan.id,
            member_id = user_plan.member_id,
            fee,
            "User plan canceled"
        );
    } else {
        tracing::warn!(user_plan_id = user_plan.id, fee, "User plan was already canceled");
    }
    Ok(members_canceled)
}

/// Stripe ended `subscription_id` on its own (dashboard, dunning).
///
/// Live plans on it are closed out like a job cancellation without a fee.
/// A plan with a scheduled cancellation is left alone: the job still owes
/// its early-termination fee.
pub async fn end_subscription(
    plans: &dyn PlanStore,
    seats: &dyn OccupancyStore,
    payments: &dyn PaymentGateway,
    subscription_id: &str,
    now: DateTime<Utc>,
) -> ServiceResult<SubscriptionEndSummary> {
    let mut summary = SubscriptionEndSummary::default();
    for user_plan in plans.live_by_subscription(subscription_id).await? {
        if user_plan.status == UserPlanStatus::CancelScheduled {
            tracing::info!(
                user_plan_id = user_plan.id,
                subscription_id,
                cancel_on = ?user_plan.cancel_scheduled_on,
                "Subscription ended before its scheduled cancellation ran"
            );
            summary.left_for_job += 1;
            continue;
        }
        let members = close_out(plans, seats, payments, &user_plan, 0, now).await?;
        summary.canceled += 1;
        summary.group_members_canceled += members.len();
    }
    Ok(summary)
}
