//! cowork-server — coworking space operations service
//!
//! Long-running service that:
//! - Runs front-desk check-in/check-out with QR tokens and drop-in billing
//! - Tracks live seat and locker occupancy
//! - Books meeting rooms and mirrors room calendars
//! - Executes scheduled plan cancellations (timer + cron endpoint)
//! - Follows Stripe subscription events and answers LINE messages

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod error;
mod line;
mod services;
mod state;
mod stripe;

#[cfg(test)]
mod testing;

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;

use config::Config;
use db::PgStore;
use error::BoxError;
use state::{AppState, Backends};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env()?;
    tracing::info!("Starting cowork-server (env: {})", config.environment);

    let pool = PgPool::connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let backends = Backends::production(PgStore::new(pool), &config);
    let state = AppState::new(&config, backends);

    spawn_cancellation_timer(state.clone(), config.cancellation_cron_interval_secs);

    // Periodic cache cleanup (every 5 minutes)
    let knowledge_cache = state.knowledge_cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let purged = knowledge_cache.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "Expired cache entries purged");
            }
        }
    });

    let app = api::create_router(state);
    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("cowork-server HTTP listening on {http_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to one JSON object per line
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cowork_server=info,tower_http=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// In-process fallback for the cron endpoint; the first tick runs at startup
fn spawn_cancellation_timer(state: AppState, interval_secs: u64) {
    if interval_secs == 0 {
        tracing::info!("Cancellation timer disabled");
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let now = Utc::now();
            if let Err(e) = services::cancellation::run_due_cancellations(
                state.backends.plans.as_ref(),
                state.backends.seats.as_ref(),
                state.backends.payments.as_ref(),
                state.local_date(now),
                now,
            )
            .await
            {
                tracing::error!(error = %e, "Scheduled cancellation run failed");
            }
        }
    });
}
