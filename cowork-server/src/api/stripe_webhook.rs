//! Stripe webhook handler
//!
//! POST /stripe/webhook — subscription lifecycle events (raw body for signature verification)

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::billing::BillingPeriod;
use shared::util::local_date;

use crate::services::cancellation;
use crate::state::AppState;
use crate::stripe;

/// Handle incoming Stripe webhook events
///
/// Must receive raw body (not JSON) for HMAC signature verification.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(sig_header) = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("Missing Stripe-Signature header");
        return StatusCode::BAD_REQUEST;
    };

    if let Err(e) = stripe::verify_webhook_signature(
        &body,
        sig_header,
        &state.stripe_webhook_secret,
        Utc::now().timestamp(),
    ) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return StatusCode::BAD_REQUEST;
    }

    let event: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return StatusCode::BAD_REQUEST;
        }
    };

    let event_type = event["type"].as_str().unwrap_or("");
    let Some(event_id) = event["id"].as_str() else {
        tracing::warn!("Webhook event missing id");
        return StatusCode::BAD_REQUEST;
    };
    tracing::info!(event_id, event_type, "Received Stripe webhook");

    // Insert first: a redelivered event finds its row already present
    match state
        .backends
        .plans
        .record_webhook_event(event_id, event_type)
        .await
    {
        Ok(false) => {
            tracing::info!(event_id, "Duplicate webhook event, skipping");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error recording webhook event");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        Ok(true) => {}
    }

    let status = dispatch(&state, event_type, &event).await;

    // A failed handler must not leave the event marked as seen
    if status.is_server_error()
        && let Err(e) = state.backends.plans.forget_webhook_event(event_id).await
    {
        tracing::error!(%e, event_id, "Failed to release webhook event for redelivery");
    }
    status
}

async fn dispatch(state: &AppState, event_type: &str, event: &Value) -> StatusCode {
    let Some(obj) = event.get("data").and_then(|d| d.get("object")) else {
        return StatusCode::OK;
    };

    match event_type {
        "customer.subscription.deleted" => handle_subscription_deleted(state, obj).await,
        "invoice.payment_failed" => handle_payment_failed(state, obj).await,
        "invoice.paid" => handle_invoice_paid(state, obj).await,
        _ => {
            tracing::debug!(event_type, "Unhandled webhook event type");
            StatusCode::OK
        }
    }
}

/// customer.subscription.deleted → close out the plans billed through it
async fn handle_subscription_deleted(state: &AppState, subscription: &Value) -> StatusCode {
    let Some(subscription_id) = subscription["id"].as_str() else {
        tracing::warn!("subscription.deleted without an id");
        return StatusCode::OK;
    };

    match cancellation::end_subscription(
        state.backends.plans.as_ref(),
        state.backends.seats.as_ref(),
        state.backends.payments.as_ref(),
        subscription_id,
        Utc::now(),
    )
    .await
    {
        Ok(summary) => {
            tracing::info!(
                subscription_id,
                canceled = summary.canceled,
                group_members_canceled = summary.group_members_canceled,
                left_for_job = summary.left_for_job,
                "Subscription ended"
            );
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(%e, subscription_id, "Failed to close out ended subscription");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// invoice.payment_failed → active plans on the subscription become past due
async fn handle_payment_failed(state: &AppState, invoice: &Value) -> StatusCode {
    let Some(subscription_id) = invoice["subscription"].as_str() else {
        return StatusCode::OK;
    };

    match state.backends.plans.mark_past_due(subscription_id).await {
        Ok(updated) => {
            tracing::info!(subscription_id, updated, "Plan marked past due");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(%e, subscription_id, "Failed to mark plan past due");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// invoice.paid → move the plan onto the invoiced service period
async fn handle_invoice_paid(state: &AppState, invoice: &Value) -> StatusCode {
    let Some(subscription_id) = invoice["subscription"].as_str() else {
        // One-off invoices (cancellation fees, overtime) carry no subscription
        return StatusCode::OK;
    };

    let Some(period) = invoice_period(invoice, state) else {
        tracing::warn!(subscription_id, "invoice.paid without a usable service period");
        return StatusCode::OK;
    };

    match state
        .backends
        .plans
        .advance_period_by_subscription(subscription_id, period)
        .await
    {
        Ok(updated) => {
            tracing::info!(
                subscription_id,
                updated,
                period_start = %period.start,
                period_end = %period.end,
                "Billing period advanced"
            );
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(%e, subscription_id, "Failed to advance billing period");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Service period of the first line item, falling back to the invoice's own period
fn invoice_period(invoice: &Value, state: &AppState) -> Option<BillingPeriod> {
    let line_period = &invoice["lines"]["data"][0]["period"];
    let (start, end) = match (line_period["start"].as_i64(), line_period["end"].as_i64()) {
        (Some(start), Some(end)) => (start, end),
        _ => (
            invoice["period_start"].as_i64()?,
            invoice["period_end"].as_i64()?,
        ),
    };
    let to_date = |secs: i64| {
        DateTime::<Utc>::from_timestamp(secs, 0).map(|at| local_date(at, state.offset))
    };
    let period = BillingPeriod {
        start: to_date(start)?,
        end: to_date(end)?,
    };
    (period.end > period.start).then_some(period)
}
