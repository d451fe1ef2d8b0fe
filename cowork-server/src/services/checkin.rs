//! QR check-in and checkout
//!
//! Check-in: verify the token, confirm the visitor may enter (billable plan
//! for members, unused authorized pass for drop-ins), take the seat, open the
//! visit. Checkout: verify, price the visit, collect payment, free the seat,
//! close the visit with its fee outcome.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use shared::billing::{Amount, DropInRate};
use shared::checkin::{CheckoutFee, checkout_fee, issue_token, verify_token};
use shared::error::{AppError, ErrorCode};
use shared::models::{
    DropInPass, OccupancyError, UserPlan, Visit, VisitFeeKind, VisitSettlement, Visitor,
};
use shared::util::{local_date, snowflake_id};

use super::cancellation::PlanStore;
use super::occupancy::{OccupancyStore, occupy_seat, release_seat};
use crate::error::{BoxError, ServiceError, ServiceResult};
use crate::stripe::{OffSessionCharge, PaymentGateway};

#[async_trait]
pub trait VisitStore: Send + Sync {
    async fn find_pass(&self, pass_id: i64) -> Result<Option<DropInPass>, BoxError>;
    async fn insert_pass(&self, pass: &DropInPass) -> Result<(), BoxError>;
    /// Mark an unused pass as used. Returns false if it was already used.
    async fn claim_pass(&self, pass_id: i64, at: DateTime<Utc>) -> Result<bool, BoxError>;
    async fn unclaim_pass(&self, pass_id: i64) -> Result<(), BoxError>;

    async fn open_visit(&self, visitor: &Visitor) -> Result<Option<Visit>, BoxError>;
    async fn insert_visit(&self, visit: &Visit) -> Result<(), BoxError>;
    async fn close_visit(&self, visit_id: i64, settlement: &VisitSettlement)
    -> Result<(), BoxError>;
}

/// Site settings the check-in flow needs
#[derive(Debug, Clone)]
pub struct CheckinSettings {
    pub qr_secret: Vec<u8>,
    pub token_ttl_secs: i64,
    pub offset: FixedOffset,
    pub drop_in_rate: DropInRate,
}

/// Stores and gateways the check-in flow runs against
#[derive(Clone, Copy)]
pub struct CheckinDeps<'a> {
    pub visits: &'a dyn VisitStore,
    pub seats: &'a dyn OccupancyStore,
    pub plans: &'a dyn PlanStore,
    pub payments: &'a dyn PaymentGateway,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInReceipt {
    pub visit_id: i64,
    pub seat_id: i64,
    pub visitor: Visitor,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutReceipt {
    pub visit_id: i64,
    pub seat_id: i64,
    pub checked_out_at: DateTime<Utc>,
    pub fee: CheckoutFee,
    pub captured_amount: Amount,
    /// Owed but not collected (drop-in charge above the hold, failed overtime charge)
    pub outstanding_amount: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct DropInRegistration {
    pub pass_id: i64,
    pub token: String,
    pub authorized_amount: Amount,
}

/// Issue a fresh QR token for a member
pub fn issue_member_token(
    settings: &CheckinSettings,
    member_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<String> {
    Ok(issue_token(
        &settings.qr_secret,
        &Visitor::Member { member_id },
        now,
    )?)
}

/// Issue a fresh QR token for a drop-in pass.
///
/// The pass must still admit its visit or have that visit open, so the
/// visitor can scan out long after the registration token has expired.
pub async fn issue_pass_token(
    visits: &dyn VisitStore,
    settings: &CheckinSettings,
    pass_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<String> {
    let refused = || AppError::new(ErrorCode::AuthorizationMissing).with_detail("pass_id", pass_id);
    let pass = visits.find_pass(pass_id).await?.ok_or_else(refused)?;
    let visitor = Visitor::DropIn { pass_id };
    if !pass.is_usable() && visits.open_visit(&visitor).await?.is_none() {
        return Err(refused().into());
    }
    Ok(issue_token(&settings.qr_secret, &visitor, now)?)
}

/// Place the authorization hold for a drop-in visitor and hand out their pass
pub async fn register_drop_in(
    deps: CheckinDeps<'_>,
    settings: &CheckinSettings,
    customer_id: &str,
    now: DateTime<Utc>,
) -> ServiceResult<DropInRegistration> {
    let pass_id = snowflake_id();
    let amount = settings.drop_in_rate.authorization_amount;
    let payment_intent_id = deps
        .payments
        .authorize(customer_id, amount, &format!("dropin-{pass_id}"))
        .await
        .map_err(|e| {
            tracing::warn!(pass_id, error = %e, "Drop-in authorization failed");
            AppError::with_message(ErrorCode::PaymentFailed, "Card authorization failed")
        })?;

    deps.visits
        .insert_pass(&DropInPass {
            id: pass_id,
            stripe_customer_id: Some(customer_id.to_string()),
            payment_intent_id: Some(payment_intent_id),
            authorized_amount: amount,
            created_at: now,
            used_at: None,
        })
        .await?;

    let token = issue_token(&settings.qr_secret, &Visitor::DropIn { pass_id }, now)?;
    tracing::info!(pass_id, authorized_amount = amount, "Drop-in pass issued");
    Ok(DropInRegistration {
        pass_id,
        token,
        authorized_amount: amount,
    })
}

async fn billable_plan(
    plans: &dyn PlanStore,
    member_id: i64,
    today: chrono::NaiveDate,
) -> ServiceResult<UserPlan> {
    match plans.current_user_plan(member_id).await? {
        Some((user_plan, _)) if user_plan.is_billable_on(today) => Ok(user_plan),
        _ => Err(AppError::new(ErrorCode::NoActivePlan)
            .with_detail("member_id", member_id)
            .into()),
    }
}

pub async fn check_in(
    deps: CheckinDeps<'_>,
    settings: &CheckinSettings,
    token: &str,
    seat_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<CheckInReceipt> {
    let visitor = verify_token(&settings.qr_secret, token, now, settings.token_ttl_secs)?;

    let (payment_intent_id, authorized_amount) = match visitor {
        Visitor::Member { member_id } => {
            billable_plan(deps.plans, member_id, local_date(now, settings.offset)).await?;
            (None, 0)
        }
        Visitor::DropIn { pass_id } => {
            let pass = deps
                .visits
                .find_pass(pass_id)
                .await?
                .filter(DropInPass::is_usable)
                .ok_or_else(|| AppError::new(ErrorCode::AuthorizationMissing))?;
            if !deps.visits.claim_pass(pass_id, now).await? {
                return Err(AppError::new(ErrorCode::AuthorizationMissing).into());
            }
            (pass.payment_intent_id, pass.authorized_amount)
        }
    };

    let result = open_visit(deps, visitor, seat_id, payment_intent_id, authorized_amount, now).await;
    if let (Err(_), Visitor::DropIn { pass_id }) = (&result, visitor)
        && let Err(e) = deps.visits.unclaim_pass(pass_id).await
    {
        tracing::error!(pass_id, error = %e, "Failed to return drop-in pass after failed check-in");
    }
    result
}

async fn open_visit(
    deps: CheckinDeps<'_>,
    visitor: Visitor,
    seat_id: i64,
    payment_intent_id: Option<String>,
    authorized_amount: Amount,
    now: DateTime<Utc>,
) -> ServiceResult<CheckInReceipt> {
    occupy_seat(deps.seats, seat_id, visitor, now).await?;

    let visit = Visit {
        id: snowflake_id(),
        visitor,
        seat_id,
        checked_in_at: now,
        checked_out_at: None,
        payment_intent_id,
        authorized_amount,
        fee_kind: VisitFeeKind::None,
        fee_amount: 0,
        captured_amount: 0,
    };
    if let Err(e) = deps.visits.insert_visit(&visit).await {
        if let Err(release_err) = release_seat(deps.seats, &visitor, now).await {
            tracing::error!(seat_id, error = %release_err, "Failed to free seat after visit insert error");
        }
        return Err(e.into());
    }

    tracing::info!(visit_id = visit.id, seat_id, visitor = ?visitor, "Checked in");
    Ok(CheckInReceipt {
        visit_id: visit.id,
        seat_id,
        visitor,
        checked_in_at: now,
    })
}

pub async fn check_out(
    deps: CheckinDeps<'_>,
    settings: &CheckinSettings,
    token: &str,
    now: DateTime<Utc>,
) -> ServiceResult<CheckOutReceipt> {
    let visitor = verify_token(&settings.qr_secret, token, now, settings.token_ttl_secs)?;
    let visit = deps
        .visits
        .open_visit(&visitor)
        .await?
        .ok_or(OccupancyError::NotSeated)?;

    let member_plan = match visitor {
        Visitor::Member { member_id } => deps.plans.current_user_plan(member_id).await?,
        Visitor::DropIn { .. } => None,
    };
    let fee = checkout_fee(
        &visit,
        now,
        settings.offset,
        member_plan.as_ref().map(|(_, plan)| plan),
        &settings.drop_in_rate,
    )?;

    let captured_amount = match &fee {
        CheckoutFee::None => 0,
        CheckoutFee::Overtime(overtime) => {
            let customer = member_plan
                .as_ref()
                .and_then(|(user_plan, _)| user_plan.stripe_customer_id.as_deref());
            charge_overtime(deps.payments, &visit, customer, overtime.amount).await
        }
        CheckoutFee::DropIn { capture, .. } => {
            let payment_intent_id = visit
                .payment_intent_id
                .as_deref()
                .ok_or_else(|| AppError::new(ErrorCode::AuthorizationMissing))?;
            if capture.capture_amount > 0 {
                deps.payments
                    .capture_payment_intent(payment_intent_id, capture.capture_amount)
                    .await
                    .map_err(|e| {
                        tracing::error!(visit_id = visit.id, error = %e, "Drop-in capture failed");
                        ServiceError::from(AppError::new(ErrorCode::CaptureFailed))
                    })?;
            }
            if capture.uncaptured_excess > 0 {
                tracing::warn!(
                    visit_id = visit.id,
                    excess = capture.uncaptured_excess,
                    "Drop-in charge exceeds the authorization hold"
                );
            }
            capture.capture_amount
        }
    };

    match release_seat(deps.seats, &visitor, now).await {
        Ok(_) => {}
        Err(ServiceError::App(e)) if e.code == ErrorCode::NotSeated => {
            tracing::warn!(visit_id = visit.id, "Visit had no open seat at checkout");
        }
        Err(e) => return Err(e),
    }

    let settlement = VisitSettlement {
        checked_out_at: now,
        fee_kind: match fee {
            CheckoutFee::None => VisitFeeKind::None,
            CheckoutFee::Overtime(_) => VisitFeeKind::Overtime,
            CheckoutFee::DropIn { .. } => VisitFeeKind::DropIn,
        },
        fee_amount: fee.amount(),
        captured_amount,
    };
    deps.visits.close_visit(visit.id, &settlement).await?;

    tracing::info!(
        visit_id = visit.id,
        fee = settlement.fee_amount,
        captured = captured_amount,
        "Checked out"
    );
    Ok(CheckOutReceipt {
        visit_id: visit.id,
        seat_id: visit.seat_id,
        checked_out_at: now,
        fee,
        captured_amount,
        outstanding_amount: settlement.fee_amount - captured_amount,
    })
}

/// Charge member overtime off-session. The fee stays on the visit even when
/// the charge does not go through. Returns the amount collected.
async fn charge_overtime(
    payments: &dyn PaymentGateway,
    visit: &Visit,
    customer_id: Option<&str>,
    amount: Amount,
) -> Amount {
    let Some(customer_id) = customer_id else {
        tracing::warn!(visit_id = visit.id, amount, "Overtime owed but member has no Stripe customer");
        return 0;
    };
    let idempotency_key = format!("overtime-{}", visit.id);
    let charge = OffSessionCharge {
        customer_id,
        amount,
        description: "Overtime fee",
        idempotency_key: &idempotency_key,
    };
    match payments.charge_off_session(&charge).await {
        Ok(payment_intent) => {
            tracing::info!(visit_id = visit.id, amount, payment_intent = %payment_intent, "Overtime charged");
            amount
        }
        Err(e) => {
            tracing::error!(visit_id = visit.id, amount, error = %e, "Overtime charge failed");
            0
        }
    }
}
