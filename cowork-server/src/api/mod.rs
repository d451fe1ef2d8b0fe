//! API routes for cowork-server

pub mod bookings;
pub mod calendar;
pub mod checkin;
pub mod cron;
pub mod health;
pub mod line_webhook;
pub mod occupancy;
pub mod plans;
pub mod stripe_webhook;

use crate::auth::{cron_auth_middleware, staff_auth_middleware};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Front desk and back office (staff bearer token)
    let staff = Router::new()
        .route("/api/checkin", post(checkin::check_in))
        .route("/api/checkout", post(checkin::check_out))
        .route("/api/qr-tokens", post(checkin::issue_qr_token))
        .route("/api/dropins", post(checkin::register_drop_in))
        .route("/api/occupancy", get(occupancy::snapshot))
        .route("/api/lockers/{id}/assign", post(occupancy::assign_locker))
        .route("/api/lockers/{id}/release", post(occupancy::release_locker))
        .route("/api/bookings", post(bookings::create_booking))
        .route("/api/plans/{id}/cancel", post(plans::schedule_cancellation))
        .route("/api/knowledge/refresh", post(plans::refresh_knowledge))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            staff_auth_middleware,
        ));

    // Platform scheduler (cron secret)
    let cron = Router::new()
        .route("/internal/cron/cancellations", post(cron::run_cancellations))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            cron_auth_middleware,
        ));

    // Provider callbacks (each verifies its own signature or channel token)
    let webhooks = Router::new()
        .route("/stripe/webhook", post(stripe_webhook::handle_webhook))
        .route("/line/webhook", post(line_webhook::handle_webhook))
        .route("/calendar/notifications", post(calendar::handle_notification));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(staff)
        .merge(cron)
        .merge(webhooks)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
