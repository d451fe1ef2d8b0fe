//! Meeting-room bookings and calendar reconciliation

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::billing::Amount;
use shared::booking::{
    Booking, BookingError, BookingRequest, BookingRules, BookingStatus, ExternalEvent, Room,
    SyncPlan, apply_calendar_changes, booking_price, validate_booking,
};
use shared::error::{AppError, ErrorCode};
use shared::util::{local_date, snowflake_id};

use super::cancellation::PlanStore;
use crate::db::InsertOutcome;
use crate::error::{BoxError, ServiceResult};

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_room(&self, room_id: i64) -> Result<Option<Room>, BoxError>;
    async fn find_room_by_channel(&self, channel_id: &str) -> Result<Option<Room>, BoxError>;
    /// Confirmed bookings of the room overlapping `[from, to)`
    async fn confirmed_between(
        &self,
        room_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BoxError>;
    async fn find_by_external_ids(
        &self,
        room_id: i64,
        event_ids: &[String],
    ) -> Result<Vec<Booking>, BoxError>;
    async fn insert_booking(&self, booking: &Booking, price: Amount)
    -> Result<InsertOutcome, BoxError>;
    /// Apply a calendar sync plan atomically
    async fn apply_sync_plan(&self, plan: &SyncPlan) -> Result<(), BoxError>;
}

/// Booking settings shared by every request
#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub rules: BookingRules,
    pub offset: FixedOffset,
    pub member_discount_percent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub price: Amount,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub cancelled: usize,
    pub conflicts: usize,
}

impl From<&SyncPlan> for SyncSummary {
    fn from(plan: &SyncPlan) -> Self {
        Self {
            created: plan.created.len(),
            updated: plan.updated.len(),
            cancelled: plan.cancelled.len(),
            conflicts: plan.conflicts.len(),
        }
    }
}

/// Book a room for a member. Members with a billable plan get the discount.
pub async fn create_booking(
    bookings: &dyn BookingStore,
    plans: &dyn PlanStore,
    settings: &BookingSettings,
    request: &BookingRequest,
    now: DateTime<Utc>,
) -> ServiceResult<BookingReceipt> {
    let room = bookings
        .find_room(request.room_id)
        .await?
        .ok_or(BookingError::RoomNotFound(request.room_id))?;
    if request.start < now {
        return Err(BookingError::InvalidTime.into());
    }

    let existing = bookings
        .confirmed_between(room.id, request.start, request.end)
        .await?;
    validate_booking(&room, request, &settings.rules, settings.offset, &existing, None)?;

    let today = local_date(now, settings.offset);
    let discount = match plans.current_user_plan(request.member_id).await? {
        Some((user_plan, _)) if user_plan.is_billable_on(today) => settings.member_discount_percent,
        _ => Decimal::ZERO,
    };
    let price = booking_price(&room, request.start, request.end, discount);

    let booking = Booking {
        id: snowflake_id(),
        room_id: room.id,
        member_id: Some(request.member_id),
        start: request.start,
        end: request.end,
        attendees: request.attendees,
        status: BookingStatus::Confirmed,
        external_event_id: None,
    };
    match bookings.insert_booking(&booking, price).await? {
        InsertOutcome::Inserted => {
            tracing::info!(
                booking_id = booking.id,
                room_id = room.id,
                member_id = request.member_id,
                price,
                "Room booked"
            );
            Ok(BookingReceipt { booking, price })
        }
        InsertOutcome::Conflict => {
            tracing::warn!(room_id = room.id, "Booking lost a race for the slot");
            Err(AppError::new(ErrorCode::BookingConflict).into())
        }
    }
}

/// Reconcile a batch of external calendar events for the room watched by
/// `channel_id`. Unknown channels are ignored.
pub async fn sync_calendar(
    bookings: &dyn BookingStore,
    channel_id: &str,
    events: &[ExternalEvent],
) -> ServiceResult<Option<SyncSummary>> {
    let Some(room) = bookings.find_room_by_channel(channel_id).await? else {
        tracing::warn!(channel_id, "Calendar notification for unknown channel");
        return Ok(None);
    };
    if events.is_empty() {
        return Ok(Some(SyncSummary::default()));
    }

    let from = events.iter().map(|e| e.start).min().unwrap_or_default();
    let to = events.iter().map(|e| e.end).max().unwrap_or_default();
    let ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();

    let mut existing = bookings.confirmed_between(room.id, from, to).await?;
    for booking in bookings.find_by_external_ids(room.id, &ids).await? {
        if !existing.iter().any(|b| b.id == booking.id) {
            existing.push(booking);
        }
    }

    let plan = apply_calendar_changes(room.id, &existing, events, snowflake_id);
    if !plan.is_empty() {
        bookings.apply_sync_plan(&plan).await?;
    }

    let summary = SyncSummary::from(&plan);
    tracing::info!(
        room_id = room.id,
        created = summary.created,
        updated = summary.updated,
        cancelled = summary.cancelled,
        conflicts = summary.conflicts,
        "Calendar synced"
    );
    Ok(Some(summary))
}
