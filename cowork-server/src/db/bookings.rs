//! Meeting rooms and bookings

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::billing::Amount;
use shared::booking::{Booking, BookingStatus, Room, SyncPlan};
use sqlx::PgPool;

use super::{InsertOutcome, PgStore};
use crate::error::BoxError;
use crate::services::booking::BookingStore;

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: i64,
    name: String,
    capacity: i32,
    hourly_price: i64,
    calendar_id: Option<String>,
    is_active: bool,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            id: row.id,
            name: row.name,
            capacity: u32::try_from(row.capacity).unwrap_or(0),
            hourly_price: row.hourly_price,
            calendar_id: row.calendar_id,
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    room_id: i64,
    member_id: Option<i64>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    attendees: i32,
    status: String,
    external_event_id: Option<String>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BoxError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::from_db(&row.status)
            .ok_or_else(|| format!("unknown booking status: {}", row.status))?;
        Ok(Booking {
            id: row.id,
            room_id: row.room_id,
            member_id: row.member_id,
            start: row.starts_at,
            end: row.ends_at,
            attendees: u32::try_from(row.attendees).unwrap_or(0),
            status,
            external_event_id: row.external_event_id,
        })
    }
}

const ROOM_COLUMNS: &str = "id, name, capacity, hourly_price, calendar_id, is_active";
const BOOKING_COLUMNS: &str =
    "id, room_id, member_id, starts_at, ends_at, attendees, status, external_event_id";

fn attendees_column(booking: &Booking) -> Result<i32, BoxError> {
    i32::try_from(booking.attendees)
        .map_err(|_| format!("booking {}: attendee count out of range", booking.id).into())
}

fn convert_all(rows: Vec<BookingRow>) -> Result<Vec<Booking>, BoxError> {
    rows.into_iter().map(Booking::try_from).collect()
}

pub async fn find_room(pool: &PgPool, room_id: i64) -> Result<Option<Room>, sqlx::Error> {
    let row: Option<RoomRow> =
        sqlx::query_as(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1"))
            .bind(room_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Room::from))
}

pub async fn find_room_by_channel(
    pool: &PgPool,
    channel_id: &str,
) -> Result<Option<Room>, sqlx::Error> {
    let row: Option<RoomRow> = sqlx::query_as(&format!(
        "SELECT {ROOM_COLUMNS} FROM rooms WHERE calendar_channel_id = $1"
    ))
    .bind(channel_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Room::from))
}

pub async fn confirmed_between(
    pool: &PgPool,
    room_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Booking>, BoxError> {
    let rows: Vec<BookingRow> = sqlx::query_as(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE room_id = $1 AND status = 'confirmed' AND starts_at < $3 AND ends_at > $2
         ORDER BY starts_at"
    ))
    .bind(room_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    convert_all(rows)
}

pub async fn find_by_external_ids(
    pool: &PgPool,
    room_id: i64,
    event_ids: &[String],
) -> Result<Vec<Booking>, BoxError> {
    let rows: Vec<BookingRow> = sqlx::query_as(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE room_id = $1 AND external_event_id = ANY($2)"
    ))
    .bind(room_id)
    .bind(event_ids)
    .fetch_all(pool)
    .await?;
    convert_all(rows)
}

pub async fn insert_booking(
    pool: &PgPool,
    booking: &Booking,
    price: Amount,
) -> Result<InsertOutcome, BoxError> {
    let attendees = attendees_column(booking)?;
    let result = sqlx::query(
        "INSERT INTO bookings (id, room_id, member_id, starts_at, ends_at, attendees, status, price, external_event_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(booking.id)
    .bind(booking.room_id)
    .bind(booking.member_id)
    .bind(booking.start)
    .bind(booking.end)
    .bind(attendees)
    .bind(booking.status.as_db())
    .bind(price)
    .bind(&booking.external_event_id)
    .execute(pool)
    .await;
    Ok(InsertOutcome::from_result(result)?)
}

/// Apply a calendar sync plan in one transaction.
///
/// Cancellations go first, then moves, then new events, so a batch that frees
/// a slot and books it again does not collide with itself. The overlap
/// constraint is deferred to commit for moves that swap slots.
pub async fn apply_sync_plan(pool: &PgPool, plan: &SyncPlan) -> Result<(), BoxError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET CONSTRAINTS bookings_room_id_tstzrange_excl DEFERRED")
        .execute(&mut *tx)
        .await?;

    if !plan.cancelled.is_empty() {
        sqlx::query("UPDATE bookings SET status = 'cancelled' WHERE id = ANY($1)")
            .bind(&plan.cancelled)
            .execute(&mut *tx)
            .await?;
    }

    for booking in &plan.updated {
        sqlx::query(
            "UPDATE bookings SET starts_at = $2, ends_at = $3, attendees = $4, status = $5
             WHERE id = $1",
        )
        .bind(booking.id)
        .bind(booking.start)
        .bind(booking.end)
        .bind(attendees_column(booking)?)
        .bind(booking.status.as_db())
        .execute(&mut *tx)
        .await?;
    }

    for booking in &plan.created {
        sqlx::query(
            "INSERT INTO bookings (id, room_id, member_id, starts_at, ends_at, attendees, status, external_event_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(booking.id)
        .bind(booking.room_id)
        .bind(booking.member_id)
        .bind(booking.start)
        .bind(booking.end)
        .bind(attendees_column(booking)?)
        .bind(booking.status.as_db())
        .bind(&booking.external_event_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[async_trait]
impl BookingStore for PgStore {
    async fn find_room(&self, room_id: i64) -> Result<Option<Room>, BoxError> {
        Ok(find_room(&self.pool, room_id).await?)
    }

    async fn find_room_by_channel(&self, channel_id: &str) -> Result<Option<Room>, BoxError> {
        Ok(find_room_by_channel(&self.pool, channel_id).await?)
    }

    async fn confirmed_between(
        &self,
        room_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BoxError> {
        confirmed_between(&self.pool, room_id, from, to).await
    }

    async fn find_by_external_ids(
        &self,
        room_id: i64,
        event_ids: &[String],
    ) -> Result<Vec<Booking>, BoxError> {
        find_by_external_ids(&self.pool, room_id, event_ids).await
    }

    async fn insert_booking(&self, booking: &Booking, price: Amount) -> Result<InsertOutcome, BoxError> {
        insert_booking(&self.pool, booking, price).await
    }

    async fn apply_sync_plan(&self, plan: &SyncPlan) -> Result<(), BoxError> {
        apply_sync_plan(&self.pool, plan).await
    }
}
