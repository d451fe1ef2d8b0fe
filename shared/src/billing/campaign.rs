//! Campaign discounts on monthly plan fees

use super::BillingError;
use super::money::{Amount, percent_of};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CampaignKind {
    Percent { rate_percent: Decimal },
    FixedAmount { amount: Amount },
    FreeMonths,
}

/// Discount applied to the first `months` billing months of a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub code: String,
    pub kind: CampaignKind,
    pub months: u32,
}

impl Campaign {
    pub fn validate(&self) -> Result<(), BillingError> {
        match self.kind {
            CampaignKind::Percent { rate_percent }
                if rate_percent.is_sign_negative() || rate_percent > Decimal::ONE_HUNDRED =>
            {
                Err(BillingError::InvalidRate("campaign rate must be within 0..=100"))
            }
            CampaignKind::FixedAmount { amount } if amount < 0 => {
                Err(BillingError::InvalidRate("campaign amount must not be negative"))
            }
            _ => Ok(()),
        }
    }

    /// Whether billing month `month_index` (0-based since contract start) is discounted
    pub fn covers(&self, month_index: u32) -> bool {
        month_index < self.months
    }
}

/// Price for billing month `month_index` after the campaign, never below zero.
pub fn apply_campaign(price: Amount, campaign: Option<&Campaign>, month_index: u32) -> Amount {
    let Some(campaign) = campaign.filter(|c| c.covers(month_index)) else {
        return price;
    };
    let discounted = match campaign.kind {
        CampaignKind::Percent { rate_percent } => price - percent_of(price, rate_percent),
        CampaignKind::FixedAmount { amount } => price - amount,
        CampaignKind::FreeMonths => 0,
    };
    discounted.max(0)
}
