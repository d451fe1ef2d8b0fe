//! Database access layer
//!
//! Each module exposes free functions over `&PgPool` plus the `PgStore`
//! implementation of the matching workflow trait.

pub mod audit;
pub mod bookings;
pub mod knowledge;
pub mod occupancy;
pub mod user_plans;
pub mod visits;
pub mod webhook_events;

use sqlx::PgPool;

use crate::error::is_constraint_conflict;

/// Result of an insert guarded by a unique or exclusion constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another row already holds the slot
    Conflict,
}

impl InsertOutcome {
    /// Fold a constraint violation into `Conflict`
    pub(crate) fn from_result<T>(result: Result<T, sqlx::Error>) -> Result<Self, sqlx::Error> {
        match result {
            Ok(_) => Ok(Self::Inserted),
            Err(e) if is_constraint_conflict(&e) => Ok(Self::Conflict),
            Err(e) => Err(e),
        }
    }
}

/// Postgres-backed implementation of every store trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
