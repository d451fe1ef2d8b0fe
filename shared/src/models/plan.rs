//! Membership plans and user contracts

use crate::billing::{
    Amount, BillingPeriod, Campaign, CancellationPolicy, GroupPricing, OvertimeRate, TimeWindow,
    apply_campaign, whole_months_between,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

/// Pricing plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub monthly_price: Amount,
    pub billing_cycle: BillingCycle,
    /// Daily window the plan covers; `None` means 24h access
    pub allowed_window: Option<TimeWindow>,
    pub cancellation: CancellationPolicy,
    pub overtime: Option<OvertimeRate>,
    pub group: Option<GroupPricing>,
    pub stripe_price_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOnKind {
    Locker,
    FixedSeat,
    Mailbox,
    Other,
}

impl AddOnKind {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Locker => "locker",
            Self::FixedSeat => "fixed_seat",
            Self::Mailbox => "mailbox",
            Self::Other => "other",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "locker" => Self::Locker,
            "fixed_seat" => Self::FixedSeat,
            "mailbox" => Self::Mailbox,
            _ => Self::Other,
        }
    }
}

/// Optional monthly add-on (locker, fixed desk, mailbox)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOn {
    pub id: i64,
    pub name: String,
    pub monthly_price: Amount,
    pub kind: AddOnKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserPlanStatus {
    Active,
    CancelScheduled,
    Canceled,
    PastDue,
}

impl UserPlanStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::CancelScheduled => "cancel_scheduled",
            Self::Canceled => "canceled",
            Self::PastDue => "past_due",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "cancel_scheduled" => Some(Self::CancelScheduled),
            "canceled" => Some(Self::Canceled),
            "past_due" => Some(Self::PastDue),
            _ => None,
        }
    }

    /// Canceled is terminal
    pub fn can_transition_to(&self, next: UserPlanStatus) -> bool {
        match (self, next) {
            (Self::Canceled, _) => false,
            (Self::CancelScheduled, Self::Active) => true,
            (_, Self::CancelScheduled) => matches!(self, Self::Active | Self::CancelScheduled),
            _ => true,
        }
    }
}

/// A member's subscription (`user_plans` row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPlan {
    pub id: i64,
    pub member_id: i64,
    pub plan_id: i64,
    pub status: UserPlanStatus,
    pub contract_start: NaiveDate,
    pub current_period: BillingPeriod,
    pub cancel_scheduled_on: Option<NaiveDate>,
    /// Owner's user plan when this is a secondary group slot
    pub group_owner_id: Option<i64>,
    pub slot_number: Option<u32>,
    pub add_on_ids: Vec<i64>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub campaign: Option<Campaign>,
}

impl UserPlan {
    /// Whether the member may use the space on `date`
    pub fn is_billable_on(&self, date: NaiveDate) -> bool {
        match self.status {
            UserPlanStatus::Active => date >= self.contract_start,
            UserPlanStatus::CancelScheduled => {
                date >= self.contract_start
                    && self.cancel_scheduled_on.is_none_or(|end| date < end)
            }
            UserPlanStatus::Canceled | UserPlanStatus::PastDue => false,
        }
    }

    pub fn is_group_owner(&self) -> bool {
        self.group_owner_id.is_none() && self.slot_number == Some(crate::billing::OWNER_SLOT)
    }

    /// Plan price for this member's slot, before campaigns
    pub fn base_price(&self, plan: &Plan) -> Amount {
        match (&plan.group, self.slot_number) {
            (Some(group), Some(slot)) => group.slot_price(slot).unwrap_or(plan.monthly_price),
            _ => plan.monthly_price,
        }
    }

    /// Monthly invoice total for the period starting on `period_start`:
    /// slot price with any campaign applied, plus add-ons.
    pub fn monthly_total(&self, plan: &Plan, add_ons: &[AddOn], period_start: NaiveDate) -> Amount {
        let month_index = whole_months_between(self.contract_start, period_start);
        let base = apply_campaign(self.base_price(plan), self.campaign.as_ref(), month_index);
        let extras: Amount = add_ons
            .iter()
            .filter(|a| self.add_on_ids.contains(&a.id))
            .map(|a| a.monthly_price)
            .sum();
        base + extras
    }
}
