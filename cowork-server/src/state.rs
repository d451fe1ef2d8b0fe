//! Application state shared by every handler

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::booking::BookingRules;
use shared::util::{local_date, site_offset};

use crate::config::Config;
use crate::db::PgStore;
use crate::line::{LineClient, LineMessenger};
use crate::services::booking::{BookingSettings, BookingStore};
use crate::services::cancellation::PlanStore;
use crate::services::chatbot::{KnowledgeCache, KnowledgeStore};
use crate::services::checkin::{CheckinDeps, CheckinSettings, VisitStore};
use crate::services::occupancy::OccupancyStore;
use crate::stripe::{PaymentGateway, StripeClient};

/// Storage and external services the handlers run against
#[derive(Clone)]
pub struct Backends {
    pub plans: Arc<dyn PlanStore>,
    pub seats: Arc<dyn OccupancyStore>,
    pub visits: Arc<dyn VisitStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub line: Arc<dyn LineMessenger>,
}

impl Backends {
    /// Postgres for storage, Stripe and LINE over REST
    pub fn production(store: PgStore, config: &Config) -> Self {
        let store = Arc::new(store);
        Self {
            plans: store.clone(),
            seats: store.clone(),
            visits: store.clone(),
            bookings: store.clone(),
            knowledge: store,
            payments: Arc::new(StripeClient::new(&config.stripe_secret_key)),
            line: Arc::new(LineClient::new(&config.line_channel_access_token)),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub backends: Backends,
    pub knowledge_cache: KnowledgeCache,
    pub checkin: Arc<CheckinSettings>,
    pub booking: Arc<BookingSettings>,
    pub offset: FixedOffset,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// LINE channel secret (webhook signature)
    pub line_channel_secret: String,
    pub cron_secret: String,
    pub staff_api_token: String,
    pub calendar_channel_token: String,
}

impl AppState {
    pub fn new(config: &Config, backends: Backends) -> Self {
        let offset = site_offset(config.site_utc_offset_minutes);
        Self {
            backends,
            knowledge_cache: KnowledgeCache::new(Duration::from_secs(config.cache_ttl_secs)),
            checkin: Arc::new(CheckinSettings {
                qr_secret: config.qr_signing_secret.as_bytes().to_vec(),
                token_ttl_secs: config.qr_token_ttl_secs,
                offset,
                drop_in_rate: config.drop_in_rate,
            }),
            booking: Arc::new(BookingSettings {
                rules: BookingRules::default(),
                offset,
                member_discount_percent: Decimal::from(config.member_booking_discount_percent),
            }),
            offset,
            stripe_webhook_secret: config.stripe_webhook_secret.clone(),
            line_channel_secret: config.line_channel_secret.clone(),
            cron_secret: config.cron_secret.clone(),
            staff_api_token: config.staff_api_token.clone(),
            calendar_channel_token: config.calendar_channel_token.clone(),
        }
    }

    pub fn checkin_deps(&self) -> CheckinDeps<'_> {
        CheckinDeps {
            visits: self.backends.visits.as_ref(),
            seats: self.backends.seats.as_ref(),
            plans: self.backends.plans.as_ref(),
            payments: self.backends.payments.as_ref(),
        }
    }

    /// Site-local calendar date of `now`
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        local_date(now, self.offset)
    }
}
