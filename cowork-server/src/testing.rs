//! In-memory fakes for workflow and router tests

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Months, NaiveDate, Utc};
use shared::billing::{Amount, BillingPeriod, CancellationPolicy, DropInRate};
use shared::booking::{Booking, BookingStatus, Room, SyncPlan};
use shared::chatbot::KnowledgeEntry;
use shared::models::{
    BillingCycle, DropInPass, Locker, LockerAssignment, OccupancySnapshot, Plan, Seat, SeatKind,
    SeatOccupancy, UserPlan, UserPlanStatus, Visit, VisitSettlement, Visitor,
};

use crate::config::Config;
use crate::db::InsertOutcome;
use crate::error::BoxError;
use crate::line::LineMessenger;
use crate::services::booking::BookingStore;
use crate::services::cancellation::PlanStore;
use crate::services::chatbot::KnowledgeStore;
use crate::services::checkin::VisitStore;
use crate::services::occupancy::OccupancyStore;
use crate::state::{AppState, Backends};
use crate::stripe::{OffSessionCharge, PaymentGateway};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn plan(id: i64, monthly_price: Amount) -> Plan {
    Plan {
        id,
        name: format!("Plan {id}"),
        monthly_price,
        billing_cycle: BillingCycle::Monthly,
        allowed_window: None,
        cancellation: CancellationPolicy::default(),
        overtime: None,
        group: None,
        stripe_price_id: None,
    }
}

pub fn user_plan(id: i64, member_id: i64, plan_id: i64, contract_start: NaiveDate) -> UserPlan {
    UserPlan {
        id,
        member_id,
        plan_id,
        status: UserPlanStatus::Active,
        contract_start,
        current_period: BillingPeriod {
            start: contract_start,
            end: contract_start + Months::new(1),
        },
        cancel_scheduled_on: None,
        group_owner_id: None,
        slot_number: None,
        add_on_ids: Vec::new(),
        stripe_subscription_id: None,
        stripe_customer_id: None,
        campaign: None,
    }
}

#[derive(Default)]
struct Inner {
    seats: BTreeMap<i64, Seat>,
    occupancies: Vec<SeatOccupancy>,
    lockers: BTreeMap<i64, Locker>,
    assignments: Vec<LockerAssignment>,
    plans: BTreeMap<i64, Plan>,
    user_plans: BTreeMap<i64, UserPlan>,
    webhook_events: HashSet<String>,
    passes: BTreeMap<i64, DropInPass>,
    visits: Vec<Visit>,
    rooms: Vec<(Room, Option<String>)>,
    bookings: Vec<Booking>,
    knowledge: Vec<KnowledgeEntry>,
    cancellation_fees: BTreeMap<i64, Amount>,
    fail_next_insert: bool,
    fail_next_plan_write: bool,
}

/// Every store trait over plain collections. Inserts enforce the same
/// one-open-row rules as the partial unique indexes.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    pub fn add_seat(&self, id: i64, kind: SeatKind, is_active: bool) {
        self.with(|s| {
            s.seats.insert(
                id,
                Seat {
                    id,
                    code: format!("S-{id}"),
                    zone: "main".into(),
                    kind,
                    is_active,
                },
            )
        });
    }

    pub fn add_locker(&self, id: i64, is_active: bool) {
        self.with(|s| {
            s.lockers.insert(
                id,
                Locker {
                    id,
                    code: format!("L-{id}"),
                    is_active,
                },
            )
        });
    }

    /// The next guarded insert reports a constraint conflict
    pub fn fail_next_insert_with_conflict(&self) {
        self.with(|s| s.fail_next_insert = true);
    }

    /// The next subscription-driven plan update fails like a dropped connection
    pub fn fail_next_plan_write(&self) {
        self.with(|s| s.fail_next_plan_write = true);
    }

    pub fn add_plan(&self, plan: Plan) {
        self.with(|s| s.plans.insert(plan.id, plan));
    }

    pub fn add_user_plan(&self, user_plan: UserPlan) {
        self.with(|s| s.user_plans.insert(user_plan.id, user_plan));
    }

    pub fn add_room(&self, room: Room, channel_id: Option<&str>) {
        self.with(|s| s.rooms.push((room, channel_id.map(String::from))));
    }

    pub fn add_knowledge(&self, entry: KnowledgeEntry) {
        self.with(|s| s.knowledge.push(entry));
    }

    pub fn user_plan(&self, id: i64) -> Option<UserPlan> {
        self.with(|s| s.user_plans.get(&id).cloned())
    }

    /// Fee recorded when the plan was canceled
    pub fn cancellation_fee(&self, user_plan_id: i64) -> Option<Amount> {
        self.with(|s| s.cancellation_fees.get(&user_plan_id).copied())
    }

    pub fn visit(&self, id: i64) -> Option<Visit> {
        self.with(|s| s.visits.iter().find(|v| v.id == id).cloned())
    }

    pub fn open_occupancy(&self, seat_id: i64) -> Option<SeatOccupancy> {
        self.with(|s| {
            s.occupancies
                .iter()
                .find(|o| o.seat_id == seat_id && o.ended_at.is_none())
                .cloned()
        })
    }

    pub fn open_assignment(&self, locker_id: i64) -> Option<LockerAssignment> {
        self.with(|s| {
            s.assignments
                .iter()
                .find(|a| a.locker_id == locker_id && a.released_at.is_none())
                .cloned()
        })
    }

    pub fn booking_by_external_id(&self, event_id: &str) -> Option<Booking> {
        self.with(|s| {
            s.bookings
                .iter()
                .find(|b| b.external_event_id.as_deref() == Some(event_id))
                .cloned()
        })
    }

    fn take_forced_conflict(inner: &mut Inner) -> bool {
        std::mem::take(&mut inner.fail_next_insert)
    }

    fn take_forced_write_failure(inner: &mut Inner) -> Result<(), BoxError> {
        if std::mem::take(&mut inner.fail_next_plan_write) {
            return Err("connection reset".into());
        }
        Ok(())
    }
}

#[async_trait]
impl OccupancyStore for MemoryStore {
    async fn find_seat(&self, seat_id: i64) -> Result<Option<Seat>, BoxError> {
        Ok(self.with(|s| s.seats.get(&seat_id).cloned()))
    }

    async fn open_occupancy_for_seat(
        &self,
        seat_id: i64,
    ) -> Result<Option<SeatOccupancy>, BoxError> {
        Ok(self.open_occupancy(seat_id))
    }

    async fn open_occupancy_for_visitor(
        &self,
        visitor: &Visitor,
    ) -> Result<Option<SeatOccupancy>, BoxError> {
        Ok(self.with(|s| {
            s.occupancies
                .iter()
                .find(|o| o.visitor == *visitor && o.ended_at.is_none())
                .cloned()
        }))
    }

    async fn insert_occupancy(&self, occupancy: &SeatOccupancy) -> Result<InsertOutcome, BoxError> {
        Ok(self.with(|s| {
            let taken = s.occupancies.iter().any(|o| {
                o.ended_at.is_none()
                    && (o.seat_id == occupancy.seat_id || o.visitor == occupancy.visitor)
            });
            if Self::take_forced_conflict(s) || taken {
                return InsertOutcome::Conflict;
            }
            s.occupancies.push(occupancy.clone());
            InsertOutcome::Inserted
        }))
    }

    async fn end_occupancy(
        &self,
        occupancy_id: i64,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        Ok(self.with(|s| {
            match s
                .occupancies
                .iter_mut()
                .find(|o| o.id == occupancy_id && o.ended_at.is_none())
            {
                Some(o) => {
                    o.ended_at = Some(ended_at);
                    true
                }
                None => false,
            }
        }))
    }

    async fn find_locker(&self, locker_id: i64) -> Result<Option<Locker>, BoxError> {
        Ok(self.with(|s| s.lockers.get(&locker_id).cloned()))
    }

    async fn open_assignment_for_locker(
        &self,
        locker_id: i64,
    ) -> Result<Option<LockerAssignment>, BoxError> {
        Ok(self.open_assignment(locker_id))
    }

    async fn open_assignments_for_plan(
        &self,
        user_plan_id: i64,
    ) -> Result<Vec<LockerAssignment>, BoxError> {
        Ok(self.with(|s| {
            s.assignments
                .iter()
                .filter(|a| a.user_plan_id == user_plan_id && a.released_at.is_none())
                .cloned()
                .collect()
        }))
    }

    async fn insert_assignment(
        &self,
        assignment: &LockerAssignment,
    ) -> Result<InsertOutcome, BoxError> {
        Ok(self.with(|s| {
            let taken = s
                .assignments
                .iter()
                .any(|a| a.locker_id == assignment.locker_id && a.released_at.is_none());
            if Self::take_forced_conflict(s) || taken {
                return InsertOutcome::Conflict;
            }
            s.assignments.push(assignment.clone());
            InsertOutcome::Inserted
        }))
    }

    async fn end_assignment(
        &self,
        assignment_id: i64,
        released_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        Ok(self.with(|s| {
            match s
                .assignments
                .iter_mut()
                .find(|a| a.id == assignment_id && a.released_at.is_none())
            {
                Some(a) => {
                    a.released_at = Some(released_at);
                    true
                }
                None => false,
            }
        }))
    }

    async fn snapshot(&self) -> Result<OccupancySnapshot, BoxError> {
        Ok(self.with(|s| OccupancySnapshot {
            seats_total: s.seats.values().filter(|x| x.is_active).count() as i64,
            seats_occupied: s.occupancies.iter().filter(|o| o.ended_at.is_none()).count() as i64,
            lockers_total: s.lockers.values().filter(|x| x.is_active).count() as i64,
            lockers_assigned: s
                .assignments
                .iter()
                .filter(|a| a.released_at.is_none())
                .count() as i64,
        }))
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn find_plan(&self, plan_id: i64) -> Result<Option<Plan>, BoxError> {
        Ok(self.with(|s| s.plans.get(&plan_id).cloned()))
    }

    async fn find_user_plan(&self, user_plan_id: i64) -> Result<Option<UserPlan>, BoxError> {
        Ok(self.user_plan(user_plan_id))
    }

    async fn current_user_plan(
        &self,
        member_id: i64,
    ) -> Result<Option<(UserPlan, Plan)>, BoxError> {
        Ok(self.with(|s| {
            let user_plan = s
                .user_plans
                .values()
                .filter(|up| up.member_id == member_id && up.status != UserPlanStatus::Canceled)
                .max_by_key(|up| (up.contract_start, up.id))?
                .clone();
            let plan = s.plans.get(&user_plan.plan_id)?.clone();
            Some((user_plan, plan))
        }))
    }

    async fn due_cancellations(&self, today: NaiveDate) -> Result<Vec<UserPlan>, BoxError> {
        Ok(self.with(|s| {
            let mut due: Vec<UserPlan> = s
                .user_plans
                .values()
                .filter(|up| {
                    up.status == UserPlanStatus::CancelScheduled
                        && up.cancel_scheduled_on.is_some_and(|d| d <= today)
                })
                .cloned()
                .collect();
            due.sort_by_key(|up| (up.cancel_scheduled_on, up.id));
            due
        }))
    }

    async fn group_members(&self, owner_id: i64) -> Result<Vec<UserPlan>, BoxError> {
        Ok(self.with(|s| {
            s.user_plans
                .values()
                .filter(|up| {
                    up.group_owner_id == Some(owner_id) && up.status != UserPlanStatus::Canceled
                })
                .cloned()
                .collect()
        }))
    }

    async fn set_cancel_scheduled(
        &self,
        user_plan_id: i64,
        on: NaiveDate,
    ) -> Result<(), BoxError> {
        self.with(|s| {
            if let Some(up) = s.user_plans.get_mut(&user_plan_id) {
                up.status = UserPlanStatus::CancelScheduled;
                up.cancel_scheduled_on = Some(on);
            }
        });
        Ok(())
    }

    async fn mark_canceled(
        &self,
        user_plan_id: i64,
        fee: Amount,
        _at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        Ok(self.with(|s| match s.user_plans.get_mut(&user_plan_id) {
            Some(up) if up.status != UserPlanStatus::Canceled => {
                up.status = UserPlanStatus::Canceled;
                s.cancellation_fees.insert(user_plan_id, fee);
                true
            }
            _ => false,
        }))
    }

    async fn record_webhook_event(
        &self,
        event_id: &str,
        _event_type: &str,
    ) -> Result<bool, BoxError> {
        Ok(self.with(|s| s.webhook_events.insert(event_id.to_string())))
    }

    async fn forget_webhook_event(&self, event_id: &str) -> Result<(), BoxError> {
        self.with(|s| s.webhook_events.remove(event_id));
        Ok(())
    }

    async fn live_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<UserPlan>, BoxError> {
        Ok(self.with(|s| {
            s.user_plans
                .values()
                .filter(|up| {
                    up.stripe_subscription_id.as_deref() == Some(subscription_id)
                        && up.status != UserPlanStatus::Canceled
                })
                .cloned()
                .collect()
        }))
    }

    async fn mark_past_due(&self, subscription_id: &str) -> Result<u64, BoxError> {
        self.with(|s| {
            Self::take_forced_write_failure(s)?;
            let mut updated = 0;
            for up in s.user_plans.values_mut().filter(|up| {
                up.stripe_subscription_id.as_deref() == Some(subscription_id)
                    && up.status == UserPlanStatus::Active
            }) {
                up.status = UserPlanStatus::PastDue;
                updated += 1;
            }
            Ok(updated)
        })
    }

    async fn advance_period_by_subscription(
        &self,
        subscription_id: &str,
        period: BillingPeriod,
    ) -> Result<u64, BoxError> {
        self.with(|s| {
            Self::take_forced_write_failure(s)?;
            let mut updated = 0;
            for up in s.user_plans.values_mut().filter(|up| {
                up.stripe_subscription_id.as_deref() == Some(subscription_id)
                    && up.status != UserPlanStatus::Canceled
                    && up.current_period.start <= period.start
            }) {
                up.current_period = period;
                if up.status == UserPlanStatus::PastDue {
                    up.status = UserPlanStatus::Active;
                }
                updated += 1;
            }
            Ok(updated)
        })
    }
}

#[async_trait]
impl VisitStore for MemoryStore {
    async fn find_pass(&self, pass_id: i64) -> Result<Option<DropInPass>, BoxError> {
        Ok(self.with(|s| s.passes.get(&pass_id).cloned()))
    }

    async fn insert_pass(&self, pass: &DropInPass) -> Result<(), BoxError> {
        self.with(|s| s.passes.insert(pass.id, pass.clone()));
        Ok(())
    }

    async fn claim_pass(&self, pass_id: i64, at: DateTime<Utc>) -> Result<bool, BoxError> {
        Ok(self.with(|s| match s.passes.get_mut(&pass_id) {
            Some(p) if p.used_at.is_none() => {
                p.used_at = Some(at);
                true
            }
            _ => false,
        }))
    }

    async fn unclaim_pass(&self, pass_id: i64) -> Result<(), BoxError> {
        self.with(|s| {
            if let Some(p) = s.passes.get_mut(&pass_id) {
                p.used_at = None;
            }
        });
        Ok(())
    }

    async fn open_visit(&self, visitor: &Visitor) -> Result<Option<Visit>, BoxError> {
        Ok(self.with(|s| {
            s.visits
                .iter()
                .find(|v| v.visitor == *visitor && v.is_open())
                .cloned()
        }))
    }

    async fn insert_visit(&self, visit: &Visit) -> Result<(), BoxError> {
        self.with(|s| s.visits.push(visit.clone()));
        Ok(())
    }

    async fn close_visit(
        &self,
        visit_id: i64,
        settlement: &VisitSettlement,
    ) -> Result<(), BoxError> {
        self.with(|s| {
            if let Some(v) = s.visits.iter_mut().find(|v| v.id == visit_id) {
                v.checked_out_at = Some(settlement.checked_out_at);
                v.fee_kind = settlement.fee_kind;
                v.fee_amount = settlement.fee_amount;
                v.captured_amount = settlement.captured_amount;
            }
        });
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find_room(&self, room_id: i64) -> Result<Option<Room>, BoxError> {
        Ok(self.with(|s| {
            s.rooms
                .iter()
                .find(|(r, _)| r.id == room_id)
                .map(|(r, _)| r.clone())
        }))
    }

    async fn find_room_by_channel(&self, channel_id: &str) -> Result<Option<Room>, BoxError> {
        Ok(self.with(|s| {
            s.rooms
                .iter()
                .find(|(_, c)| c.as_deref() == Some(channel_id))
                .map(|(r, _)| r.clone())
        }))
    }

    async fn confirmed_between(
        &self,
        room_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BoxError> {
        Ok(self.with(|s| {
            s.bookings
                .iter()
                .filter(|b| b.room_id == room_id && b.is_confirmed() && b.overlaps(from, to))
                .cloned()
                .collect()
        }))
    }

    async fn find_by_external_ids(
        &self,
        room_id: i64,
        event_ids: &[String],
    ) -> Result<Vec<Booking>, BoxError> {
        Ok(self.with(|s| {
            s.bookings
                .iter()
                .filter(|b| {
                    b.room_id == room_id
                        && b.external_event_id
                            .as_ref()
                            .is_some_and(|id| event_ids.contains(id))
                })
                .cloned()
                .collect()
        }))
    }

    async fn insert_booking(&self, booking: &Booking, _price: Amount) -> Result<InsertOutcome, BoxError> {
        Ok(self.with(|s| {
            let clash = s.bookings.iter().any(|b| {
                b.room_id == booking.room_id
                    && b.is_confirmed()
                    && b.overlaps(booking.start, booking.end)
            });
            if Self::take_forced_conflict(s) || clash {
                return InsertOutcome::Conflict;
            }
            s.bookings.push(booking.clone());
            InsertOutcome::Inserted
        }))
    }

    /// All or nothing, with the overlap rule checked on the end state
    async fn apply_sync_plan(&self, plan: &SyncPlan) -> Result<(), BoxError> {
        self.with(|s| {
            let mut bookings = s.bookings.clone();
            for b in bookings.iter_mut().filter(|b| plan.cancelled.contains(&b.id)) {
                b.status = BookingStatus::Cancelled;
            }
            for updated in &plan.updated {
                if let Some(b) = bookings.iter_mut().find(|b| b.id == updated.id) {
                    *b = updated.clone();
                }
            }
            bookings.extend(plan.created.iter().cloned());

            let confirmed: Vec<&Booking> = bookings.iter().filter(|b| b.is_confirmed()).collect();
            for (i, a) in confirmed.iter().enumerate() {
                if let Some(b) = confirmed[i + 1..]
                    .iter()
                    .find(|b| b.room_id == a.room_id && b.overlaps(a.start, a.end))
                {
                    return Err(BoxError::from(format!("bookings {} and {} overlap", a.id, b.id)));
                }
            }
            s.bookings = bookings;
            Ok(())
        })
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn active_entries(&self) -> Result<Vec<KnowledgeEntry>, BoxError> {
        Ok(self.with(|s| s.knowledge.iter().filter(|e| e.is_active).cloned().collect()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCharge {
    pub customer_id: String,
    pub amount: Amount,
    pub idempotency_key: String,
}

#[derive(Default)]
struct PaymentLog {
    canceled: Vec<String>,
    charges: Vec<RecordedCharge>,
    authorizations: Vec<(String, Amount)>,
    captures: Vec<(String, Amount)>,
    fail_cancel: HashSet<String>,
    fail_charges: bool,
}

/// Records every call; failures are opt-in
#[derive(Default)]
pub struct FakePayments {
    log: Mutex<PaymentLog>,
}

impl FakePayments {
    pub fn fail_cancel_for(&self, subscription_id: &str) {
        self.log.lock().unwrap().fail_cancel.insert(subscription_id.to_string());
    }

    pub fn fail_charges(&self) {
        self.log.lock().unwrap().fail_charges = true;
    }

    pub fn accept_charges(&self) {
        self.log.lock().unwrap().fail_charges = false;
    }

    pub fn canceled_subscriptions(&self) -> Vec<String> {
        self.log.lock().unwrap().canceled.clone()
    }

    pub fn charges(&self) -> Vec<RecordedCharge> {
        self.log.lock().unwrap().charges.clone()
    }

    pub fn authorizations(&self) -> Vec<(String, Amount)> {
        self.log.lock().unwrap().authorizations.clone()
    }

    pub fn captures(&self) -> Vec<(String, Amount)> {
        self.log.lock().unwrap().captures.clone()
    }
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BoxError> {
        let mut log = self.log.lock().unwrap();
        if log.fail_cancel.contains(subscription_id) {
            return Err(format!("cannot cancel {subscription_id}").into());
        }
        log.canceled.push(subscription_id.to_string());
        Ok(())
    }

    async fn charge_off_session(&self, charge: &OffSessionCharge<'_>) -> Result<String, BoxError> {
        let mut log = self.log.lock().unwrap();
        if log.fail_charges {
            return Err("card declined".into());
        }
        log.charges.push(RecordedCharge {
            customer_id: charge.customer_id.to_string(),
            amount: charge.amount,
            idempotency_key: charge.idempotency_key.to_string(),
        });
        Ok(format!("pi_charge_{}", log.charges.len()))
    }

    async fn authorize(
        &self,
        customer_id: &str,
        amount: Amount,
        _idempotency_key: &str,
    ) -> Result<String, BoxError> {
        let mut log = self.log.lock().unwrap();
        log.authorizations.push((customer_id.to_string(), amount));
        Ok(format!("pi_hold_{}", log.authorizations.len()))
    }

    async fn capture_payment_intent(
        &self,
        payment_intent_id: &str,
        amount: Amount,
    ) -> Result<(), BoxError> {
        self.log
            .lock()
            .unwrap()
            .captures
            .push((payment_intent_id.to_string(), amount));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLine {
    sent: Mutex<Vec<(String, String)>>,
    fail: Mutex<bool>,
}

impl FakeLine {
    pub fn fail_replies(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LineMessenger for FakeLine {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), BoxError> {
        if *self.fail.lock().unwrap() {
            return Err("LINE unavailable".into());
        }
        self.sent
            .lock()
            .unwrap()
            .push((reply_token.to_string(), text.to_string()));
        Ok(())
    }
}

pub const STAFF_TOKEN: &str = "staff-token";
pub const CRON_TOKEN: &str = "cron-token";
pub const STRIPE_SECRET: &str = "whsec_test";
pub const LINE_SECRET: &str = "line-secret";
pub const CHANNEL_TOKEN: &str = "channel-token";

pub fn config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        http_port: 0,
        environment: "test".into(),
        site_utc_offset_minutes: 540,
        cache_ttl_secs: 300,
        cancellation_cron_interval_secs: 0,
        qr_token_ttl_secs: 60,
        stripe_secret_key: "sk_test".into(),
        stripe_webhook_secret: STRIPE_SECRET.into(),
        line_channel_secret: LINE_SECRET.into(),
        line_channel_access_token: "line-access".into(),
        qr_signing_secret: "qr-secret".into(),
        cron_secret: CRON_TOKEN.into(),
        staff_api_token: STAFF_TOKEN.into(),
        calendar_channel_token: CHANNEL_TOKEN.into(),
        drop_in_rate: DropInRate {
            unit_minutes: 60,
            unit_price: 500,
            daily_cap: 2_000,
            authorization_amount: 3_000,
        },
        member_booking_discount_percent: 10,
    }
}

/// Application state wired to the in-memory fakes
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub payments: Arc<FakePayments>,
    pub line: Arc<FakeLine>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let payments = Arc::new(FakePayments::default());
        let line = Arc::new(FakeLine::default());
        let backends = Backends {
            plans: store.clone(),
            seats: store.clone(),
            visits: store.clone(),
            bookings: store.clone(),
            knowledge: store.clone(),
            payments: payments.clone(),
            line: line.clone(),
        };
        let state = AppState::new(&config(), backends);
        Self {
            store,
            payments,
            line,
            state,
        }
    }
}
