//! Visit records (one per check-in)

use super::occupancy::Visitor;
use crate::billing::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitFeeKind {
    None,
    Overtime,
    DropIn,
}

impl VisitFeeKind {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Overtime => "overtime",
            Self::DropIn => "drop_in",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "overtime" => Self::Overtime,
            "drop_in" => Self::DropIn,
            _ => Self::None,
        }
    }
}

/// `visits` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: i64,
    pub visitor: Visitor,
    pub seat_id: i64,
    pub checked_in_at: DateTime<Utc>,
    pub checked_out_at: Option<DateTime<Utc>>,
    /// Stripe PaymentIntent holding the drop-in authorization
    pub payment_intent_id: Option<String>,
    pub authorized_amount: Amount,
    pub fee_kind: VisitFeeKind,
    pub fee_amount: Amount,
    pub captured_amount: Amount,
}

impl Visit {
    pub fn is_open(&self) -> bool {
        self.checked_out_at.is_none()
    }
}

/// Prepaid authorization a drop-in visitor obtains before their first check-in.
///
/// The QR subject of a drop-in is the pass id; a pass admits one visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropInPass {
    pub id: i64,
    pub stripe_customer_id: Option<String>,
    /// PaymentIntent created with manual capture
    pub payment_intent_id: Option<String>,
    pub authorized_amount: Amount,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl DropInPass {
    pub fn is_usable(&self) -> bool {
        self.used_at.is_none() && self.payment_intent_id.is_some() && self.authorized_amount > 0
    }
}

/// Fee outcome recorded when a visit closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitSettlement {
    pub checked_out_at: DateTime<Utc>,
    pub fee_kind: VisitFeeKind,
    pub fee_amount: Amount,
    pub captured_amount: Amount,
}
