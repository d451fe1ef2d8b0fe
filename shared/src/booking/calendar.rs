//! External calendar reconciliation
//!
//! Room calendars are the source of truth for bookings made outside the app.
//! A sync pass receives the changed events of one room calendar and turns them
//! into a [`SyncPlan`] the caller persists.

use super::{Booking, BookingStatus, overlaps};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalEventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

/// An event as reported by the calendar provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub event_id: String,
    pub status: ExternalEventStatus,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub attendees: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub event_id: String,
    pub booking_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub created: Vec<Booking>,
    pub updated: Vec<Booking>,
    pub cancelled: Vec<i64>,
    pub conflicts: Vec<SyncConflict>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.cancelled.is_empty()
            && self.conflicts.is_empty()
    }
}

/// Reconcile changed calendar events against the room's current bookings.
///
/// Events are upserted by `external_event_id`. A cancelled event cancels the
/// matching confirmed booking. An event that would overlap a different
/// confirmed booking is reported as a conflict and not applied. Changes are
/// applied in order, so later events see the effect of earlier ones.
pub fn apply_calendar_changes(
    room_id: i64,
    existing: &[Booking],
    changes: &[ExternalEvent],
    mut next_id: impl FnMut() -> i64,
) -> SyncPlan {
    let mut working: Vec<Booking> = existing
        .iter()
        .filter(|b| b.room_id == room_id)
        .cloned()
        .collect();
    let mut plan = SyncPlan::default();

    for event in changes {
        let current = working
            .iter()
            .position(|b| b.external_event_id.as_deref() == Some(event.event_id.as_str()));

        if event.status == ExternalEventStatus::Cancelled || event.start >= event.end {
            if let Some(idx) = current
                && working[idx].is_confirmed()
            {
                working[idx].status = BookingStatus::Cancelled;
                plan.cancelled.push(working[idx].id);
            }
            continue;
        }

        let clash = working.iter().find(|b| {
            b.is_confirmed()
                && b.external_event_id.as_deref() != Some(event.event_id.as_str())
                && overlaps(b.start, b.end, event.start, event.end)
        });
        if let Some(clash) = clash {
            tracing::warn!(
                room_id,
                event_id = %event.event_id,
                booking_id = clash.id,
                "Calendar event overlaps an existing booking"
            );
            plan.conflicts.push(SyncConflict {
                event_id: event.event_id.clone(),
                booking_id: clash.id,
            });
            continue;
        }

        match current {
            Some(idx) => {
                let booking = &mut working[idx];
                let changed = booking.start != event.start
                    || booking.end != event.end
                    || booking.attendees != event.attendees
                    || !booking.is_confirmed();
                if changed {
                    booking.start = event.start;
                    booking.end = event.end;
                    booking.attendees = event.attendees;
                    booking.status = BookingStatus::Confirmed;
                    plan.updated.push(booking.clone());
                }
            }
            None => {
                let booking = Booking {
                    id: next_id(),
                    room_id,
                    member_id: None,
                    start: event.start,
                    end: event.end,
                    attendees: event.attendees,
                    status: BookingStatus::Confirmed,
                    external_event_id: Some(event.event_id.clone()),
                };
                plan.created.push(booking.clone());
                working.push(booking);
            }
        }
    }

    plan
}

/// `X-Goog-Resource-State` of a watch-channel notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Handshake sent when the channel is opened
    Sync,
    Exists,
    NotExists,
}

impl ResourceState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sync" => Some(Self::Sync),
            "exists" => Some(Self::Exists),
            "not_exists" => Some(Self::NotExists),
            _ => None,
        }
    }
}

/// Whether a notification carries the token registered for the channel
pub fn channel_token_matches(expected: &str, received: &str) -> bool {
    crate::util::secure_eq(expected.as_bytes(), received.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, h, 0, 0).unwrap()
    }

    fn booking(id: i64, event: Option<&str>, start: u32, end: u32) -> Booking {
        Booking {
            id,
            room_id: 1,
            member_id: event.is_none().then_some(100),
            start: at(start),
            end: at(end),
            attendees: 2,
            status: BookingStatus::Confirmed,
            external_event_id: event.map(str::to_string),
        }
    }

    fn event(id: &str, status: ExternalEventStatus, start: u32, end: u32) -> ExternalEvent {
        ExternalEvent {
            event_id: id.into(),
            status,
            start: at(start),
            end: at(end),
            attendees: 2,
        }
    }

    fn ids() -> impl FnMut() -> i64 {
        let mut next = 1000;
        move || {
            next += 1;
            next
        }
    }

    #[test]
    fn test_new_event_creates_booking() {
        let changes = vec![event("ev1", ExternalEventStatus::Confirmed, 1, 2)];
        let plan = apply_calendar_changes(1, &[], &changes, ids());
        assert_eq!(plan.created.len(), 1);
        assert_eq!(plan.created[0].id, 1001);
        assert_eq!(plan.created[0].member_id, None);
        assert_eq!(plan.created[0].external_event_id.as_deref(), Some("ev1"));
    }

    #[test]
    fn test_moved_event_updates_booking() {
        let existing = vec![booking(5, Some("ev1"), 1, 2)];
        let changes = vec![event("ev1", ExternalEventStatus::Confirmed, 3, 4)];
        let plan = apply_calendar_changes(1, &existing, &changes, ids());
        assert!(plan.created.is_empty());
        assert_eq!(plan.updated.len(), 1);
        assert_eq!(plan.updated[0].id, 5);
        assert_eq!(plan.updated[0].start, at(3));
    }

    #[test]
    fn test_unchanged_event_is_noop() {
        let existing = vec![booking(5, Some("ev1"), 1, 2)];
        let changes = vec![event("ev1", ExternalEventStatus::Confirmed, 1, 2)];
        assert!(apply_calendar_changes(1, &existing, &changes, ids()).is_empty());
    }

    #[test]
    fn test_cancelled_event_cancels_booking_once() {
        let existing = vec![booking(5, Some("ev1"), 1, 2)];
        let changes = vec![
            event("ev1", ExternalEventStatus::Cancelled, 1, 2),
            event("ev1", ExternalEventStatus::Cancelled, 1, 2),
            event("unknown", ExternalEventStatus::Cancelled, 1, 2),
        ];
        let plan = apply_calendar_changes(1, &existing, &changes, ids());
        assert_eq!(plan.cancelled, vec![5]);
    }

    #[test]
    fn test_overlap_with_app_booking_is_conflict() {
        let existing = vec![booking(5, None, 1, 3)];
        let changes = vec![event("ev1", ExternalEventStatus::Confirmed, 2, 4)];
        let plan = apply_calendar_changes(1, &existing, &changes, ids());
        assert!(plan.created.is_empty());
        assert_eq!(
            plan.conflicts,
            vec![SyncConflict {
                event_id: "ev1".into(),
                booking_id: 5
            }]
        );
    }

    #[test]
    fn test_batch_sees_earlier_changes() {
        // ev1 moves out of the way, then ev2 takes its old slot
        let existing = vec![booking(5, Some("ev1"), 1, 2)];
        let changes = vec![
            event("ev1", ExternalEventStatus::Confirmed, 5, 6),
            event("ev2", ExternalEventStatus::Confirmed, 1, 2),
        ];
        let plan = apply_calendar_changes(1, &existing, &changes, ids());
        assert_eq!(plan.updated.len(), 1);
        assert_eq!(plan.created.len(), 1);
        assert!(plan.conflicts.is_empty());
    }

    #[test]
    fn test_other_rooms_are_ignored() {
        let mut other = booking(5, None, 1, 3);
        other.room_id = 2;
        let changes = vec![event("ev1", ExternalEventStatus::Confirmed, 2, 4)];
        let plan = apply_calendar_changes(1, &[other], &changes, ids());
        assert_eq!(plan.created.len(), 1);
    }

    #[test]
    fn test_channel_token() {
        assert!(channel_token_matches("s3cret", "s3cret"));
        assert!(!channel_token_matches("s3cret", "s3creT"));
        assert!(!channel_token_matches("s3cret", "s3cre"));
        assert!(!channel_token_matches("", ""));
    }

    #[test]
    fn test_resource_state() {
        assert_eq!(ResourceState::parse("sync"), Some(ResourceState::Sync));
        assert_eq!(ResourceState::parse("exists"), Some(ResourceState::Exists));
        assert_eq!(ResourceState::parse("gone"), None);
    }
}
