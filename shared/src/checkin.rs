//! QR check-in tokens and checkout fee rules
//!
//! Token format: `v1.<subject>.<issued_unix>.<hex hmac-sha256>` where subject
//! is `m<member_id>` or `d<pass_id>` and the MAC covers everything before the
//! last dot. Tokens are short-lived; the kiosk app refreshes them.

use crate::billing::{
    BillingError, CapturePlan, DropInCharge, DropInRate, Overtime, calculate_drop_in_charge,
    calculate_overtime, plan_capture,
};
use crate::error::{AppError, ErrorCode};
use crate::models::{Plan, Visit, Visitor};
use chrono::{DateTime, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

const TOKEN_VERSION: &str = "v1";

/// Allowed clock skew for tokens issued "in the future"
const MAX_FUTURE_SKEW_SECS: i64 = 30;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token issued in the future")]
    NotYetValid,
    #[error("signing key rejected")]
    InvalidKey,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        let code = match err {
            TokenError::Malformed | TokenError::NotYetValid => ErrorCode::TokenInvalid,
            TokenError::BadSignature => ErrorCode::SignatureInvalid,
            TokenError::Expired => ErrorCode::TokenExpired,
            TokenError::InvalidKey => ErrorCode::ConfigError,
        };
        AppError::with_message(code, err.to_string())
    }
}

fn encode_subject(visitor: &Visitor) -> String {
    match visitor {
        Visitor::Member { member_id } => format!("m{member_id}"),
        Visitor::DropIn { pass_id } => format!("d{pass_id}"),
    }
}

fn decode_subject(s: &str) -> Option<Visitor> {
    let (prefix, id) = s.split_at_checked(1)?;
    let id: i64 = id.parse().ok().filter(|id| *id > 0)?;
    match prefix {
        "m" => Some(Visitor::Member { member_id: id }),
        "d" => Some(Visitor::DropIn { pass_id: id }),
        _ => None,
    }
}

fn mac_for(secret: &[u8], payload: &str) -> Result<HmacSha256, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Issue a token for `visitor` at `issued_at`
pub fn issue_token(
    secret: &[u8],
    visitor: &Visitor,
    issued_at: DateTime<Utc>,
) -> Result<String, TokenError> {
    let payload = format!(
        "{TOKEN_VERSION}.{}.{}",
        encode_subject(visitor),
        issued_at.timestamp()
    );
    let signature = hex::encode(mac_for(secret, &payload)?.finalize().into_bytes());
    Ok(format!("{payload}.{signature}"))
}

/// Verify a token and return its subject.
///
/// The signature is checked before the timestamp so a forged token never
/// learns whether its age would have been accepted.
pub fn verify_token(
    secret: &[u8],
    token: &str,
    now: DateTime<Utc>,
    ttl_secs: i64,
) -> Result<Visitor, TokenError> {
    let (payload, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
    let mut parts = payload.split('.');
    let (Some(version), Some(subject), Some(issued), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };
    if version != TOKEN_VERSION {
        return Err(TokenError::Malformed);
    }
    let visitor = decode_subject(subject).ok_or(TokenError::Malformed)?;
    let issued: i64 = issued.parse().map_err(|_| TokenError::Malformed)?;
    let sig_bytes = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

    mac_for(secret, payload)?
        .verify_slice(&sig_bytes)
        .map_err(|_| TokenError::BadSignature)?;

    let age = now.timestamp() - issued;
    if age < -MAX_FUTURE_SKEW_SECS {
        return Err(TokenError::NotYetValid);
    }
    if age > ttl_secs {
        return Err(TokenError::Expired);
    }
    Ok(visitor)
}

/// What a checkout owes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutFee {
    None,
    Overtime(Overtime),
    DropIn {
        charge: DropInCharge,
        capture: CapturePlan,
    },
}

impl CheckoutFee {
    pub fn amount(&self) -> i64 {
        match self {
            Self::None => 0,
            Self::Overtime(o) => o.amount,
            Self::DropIn { charge, .. } => charge.amount,
        }
    }
}

/// Fee for closing `visit` at `checked_out_at`.
///
/// Members pay overtime only when their plan has both a time window and an
/// overtime rate. Drop-ins pay the drop-in charge, captured against the hold.
pub fn checkout_fee(
    visit: &Visit,
    checked_out_at: DateTime<Utc>,
    offset: FixedOffset,
    member_plan: Option<&Plan>,
    drop_in_rate: &DropInRate,
) -> Result<CheckoutFee, BillingError> {
    match visit.visitor {
        Visitor::Member { .. } => {
            let Some((window, rate)) =
                member_plan.and_then(|p| p.allowed_window.zip(p.overtime))
            else {
                return Ok(CheckoutFee::None);
            };
            let overtime =
                calculate_overtime(visit.checked_in_at, checked_out_at, offset, &window, &rate)?;
            if overtime.amount == 0 {
                Ok(CheckoutFee::None)
            } else {
                Ok(CheckoutFee::Overtime(overtime))
            }
        }
        Visitor::DropIn { .. } => {
            let charge = calculate_drop_in_charge(visit.checked_in_at, checked_out_at, drop_in_rate)?;
            let capture = plan_capture(charge.amount, visit.authorized_amount);
            Ok(CheckoutFee::DropIn { charge, capture })
        }
    }
}
