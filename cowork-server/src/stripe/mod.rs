//! Stripe integration via REST API (no SDK dependency)

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared::billing::Amount;

use crate::error::BoxError;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Site currency (zero-decimal, amounts are sent as is)
const CURRENCY: &str = "jpy";

/// Webhook events older than this are rejected
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Off-session charge against a customer's default payment method
#[derive(Debug, Clone)]
pub struct OffSessionCharge<'a> {
    pub customer_id: &'a str,
    pub amount: Amount,
    pub description: &'a str,
    /// Sent as `Idempotency-Key`; a repeated key returns the original PaymentIntent
    pub idempotency_key: &'a str,
}

/// Payment operations the workflows depend on
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BoxError>;

    /// Returns the PaymentIntent id
    async fn charge_off_session(&self, charge: &OffSessionCharge<'_>) -> Result<String, BoxError>;

    /// Place a manual-capture hold. Returns the PaymentIntent id.
    async fn authorize(
        &self,
        customer_id: &str,
        amount: Amount,
        idempotency_key: &str,
    ) -> Result<String, BoxError>;

    /// Capture `amount` (at most the authorized amount) of a held PaymentIntent
    async fn capture_payment_intent(&self, payment_intent_id: &str, amount: Amount)
    -> Result<(), BoxError>;
}

/// Stripe REST client
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
        }
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
        idempotency_key: Option<&str>,
    ) -> Result<serde_json::Value, BoxError> {
        let mut req = self
            .http
            .post(format!("{API_BASE}{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        let resp: serde_json::Value = req.send().await?.json().await?;
        if let Some(err) = resp.get("error") {
            return Err(format!("Stripe {path} failed: {err}").into());
        }
        Ok(resp)
    }

    async fn delete(&self, path: &str) -> Result<serde_json::Value, BoxError> {
        let resp: serde_json::Value = self
            .http
            .delete(format!("{API_BASE}{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?
            .json()
            .await?;
        if let Some(err) = resp.get("error") {
            return Err(format!("Stripe {path} failed: {err}").into());
        }
        Ok(resp)
    }
}

fn payment_intent_id(resp: &serde_json::Value, op: &str) -> Result<String, BoxError> {
    resp["id"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("Stripe {op} returned no id: {resp}").into())
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BoxError> {
        let resp = self
            .delete(&format!("/subscriptions/{subscription_id}"))
            .await;
        match resp {
            Ok(_) => Ok(()),
            // Already canceled on Stripe's side (e.g. by the dashboard)
            Err(e) if e.to_string().contains("resource_missing") => {
                tracing::warn!(subscription_id, "Subscription already gone on Stripe");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn charge_off_session(&self, charge: &OffSessionCharge<'_>) -> Result<String, BoxError> {
        let amount = charge.amount.to_string();
        let resp = self
            .post_form(
                "/payment_intents",
                &[
                    ("amount", amount.as_str()),
                    ("currency", CURRENCY),
                    ("customer", charge.customer_id),
                    ("description", charge.description),
                    ("confirm", "true"),
                    ("off_session", "true"),
                ],
                Some(charge.idempotency_key),
            )
            .await?;
        let id = payment_intent_id(&resp, "charge_off_session")?;
        match resp["status"].as_str() {
            Some("succeeded" | "processing") => Ok(id),
            other => Err(format!("PaymentIntent {id} not completed (status: {other:?})").into()),
        }
    }

    async fn authorize(
        &self,
        customer_id: &str,
        amount: Amount,
        idempotency_key: &str,
    ) -> Result<String, BoxError> {
        let amount = amount.to_string();
        let resp = self
            .post_form(
                "/payment_intents",
                &[
                    ("amount", amount.as_str()),
                    ("currency", CURRENCY),
                    ("customer", customer_id),
                    ("capture_method", "manual"),
                    ("confirm", "true"),
                    ("off_session", "true"),
                ],
                Some(idempotency_key),
            )
            .await?;
        let id = payment_intent_id(&resp, "authorize")?;
        match resp["status"].as_str() {
            Some("requires_capture") => Ok(id),
            other => Err(format!("PaymentIntent {id} not authorized (status: {other:?})").into()),
        }
    }

    async fn capture_payment_intent(
        &self,
        payment_intent_id: &str,
        amount: Amount,
    ) -> Result<(), BoxError> {
        let amount = amount.to_string();
        self.post_form(
            &format!("/payment_intents/{payment_intent_id}/capture"),
            &[("amount_to_capture", amount.as_str())],
            Some(&format!("capture-{payment_intent_id}")),
        )
        .await?;
        Ok(())
    }
}

/// Verify Stripe webhook signature (HMAC-SHA256)
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Stripe sends one v1 entry per active secret during rotation
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err("Webhook signature mismatch");
    }

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now_unix - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, ts: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{ts}.").as_bytes());
        mac.update(payload);
        format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_webhook_signature(payload, &header, "whsec_test", 1_700_000_100).is_ok());
    }

    #[test]
    fn test_rotated_secret_second_signature_matches() {
        let payload = br#"{"id":"evt_1"}"#;
        let good = sign(payload, "whsec_new", 1_700_000_000);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1700000000,v1={},v1={good_sig}", "00".repeat(32));
        assert!(verify_webhook_signature(payload, &header, "whsec_new", 1_700_000_000).is_ok());
    }

    #[test]
    fn test_rejects_bad_signature_and_stale_timestamp() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert_eq!(
            verify_webhook_signature(payload, &header, "whsec_other", 1_700_000_000),
            Err("Webhook signature mismatch")
        );
        assert_eq!(
            verify_webhook_signature(payload, &header, "whsec_test", 1_700_000_301),
            Err("Webhook timestamp too old")
        );
        assert_eq!(
            verify_webhook_signature(payload, "v1=abc", "whsec_test", 1_700_000_000),
            Err("Invalid Stripe-Signature header")
        );
    }
}
