//! Server configuration

use std::str::FromStr;

use shared::billing::DropInRate;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Site UTC offset in minutes (540 = JST)
    pub site_utc_offset_minutes: i32,
    /// TTL of the in-process read cache
    pub cache_ttl_secs: u64,
    /// Interval of the in-process cancellation timer; 0 disables it
    pub cancellation_cron_interval_secs: u64,
    /// Lifetime of a QR check-in token
    pub qr_token_ttl_secs: i64,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// LINE channel secret (webhook signature)
    pub line_channel_secret: String,
    /// LINE channel access token (reply API)
    pub line_channel_access_token: String,
    /// HMAC key for QR tokens
    pub qr_signing_secret: String,
    /// Bearer token for `/internal/cron/*`
    pub cron_secret: String,
    /// Bearer token for staff-facing `/api/*` routes
    pub staff_api_token: String,
    /// Token registered on calendar watch channels
    pub calendar_channel_token: String,
    /// Drop-in pricing
    pub drop_in_rate: DropInRate,
    /// Percentage off meeting-room prices for members with a billable plan
    pub member_booking_discount_percent: u32,
}

/// Default percentage off meeting rooms for members
const DEFAULT_MEMBER_BOOKING_DISCOUNT_PERCENT: u32 = 10;

/// Variable lookup; the process environment in production, a map in tests
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn var(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    /// Parsed value, or `default` when unset. A value that does not parse is
    /// logged and replaced by the default.
    fn or<T: FromStr>(&self, name: &str, default: T) -> T {
        let Some(raw) = self.var(name) else {
            return default;
        };
        match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(name, value = %raw, "Unparseable config value, using default");
                default
            }
        }
    }

    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(&self, name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match self.var(name) {
            Some(v) => v,
            None => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        Self::load(Env(|name: &str| std::env::var(name).ok()))
    }

    fn load<F: Fn(&str) -> Option<String>>(env: Env<F>) -> Result<Self, BoxError> {
        let environment = env.var("ENVIRONMENT").unwrap_or_else(|| "development".into());

        let drop_in_rate = DropInRate {
            unit_minutes: env.or("DROP_IN_UNIT_MINUTES", 60),
            unit_price: env.or("DROP_IN_UNIT_PRICE", 500),
            daily_cap: env.or("DROP_IN_DAILY_CAP", 2_000),
            authorization_amount: env.or("DROP_IN_AUTHORIZATION_AMOUNT", 3_000),
        };
        drop_in_rate.validate().map_err(|e| format!("drop-in rate: {e}"))?;

        Ok(Self {
            database_url: env.var("DATABASE_URL").ok_or("DATABASE_URL must be set")?,
            http_port: env.or("HTTP_PORT", 8080),
            environment: environment.clone(),
            site_utc_offset_minutes: env.or("SITE_UTC_OFFSET_MINUTES", 540),
            cache_ttl_secs: env.or("CACHE_TTL_SECS", 300),
            cancellation_cron_interval_secs: env.or("CANCELLATION_CRON_INTERVAL_SECS", 3600),
            qr_token_ttl_secs: env.or("QR_TOKEN_TTL_SECS", 60),
            stripe_secret_key: env.require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: env.require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            line_channel_secret: env.require_secret("LINE_CHANNEL_SECRET", &environment)?,
            line_channel_access_token: env
                .require_secret("LINE_CHANNEL_ACCESS_TOKEN", &environment)?,
            qr_signing_secret: env.require_secret("QR_SIGNING_SECRET", &environment)?,
            cron_secret: env.require_secret("CRON_SECRET", &environment)?,
            staff_api_token: env.require_secret("STAFF_API_TOKEN", &environment)?,
            calendar_channel_token: env.require_secret("CALENDAR_CHANNEL_TOKEN", &environment)?,
            drop_in_rate,
            member_booking_discount_percent: env
                .or(
                    "MEMBER_BOOKING_DISCOUNT_PERCENT",
                    DEFAULT_MEMBER_BOOKING_DISCOUNT_PERCENT,
                )
                .min(100),
        })
    }
}
