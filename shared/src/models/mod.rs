//! Data models
//!
//! Shared between cowork-server and its API clients.
//! All IDs are `i64` snowflakes (see [`crate::util::snowflake_id`]).
//! Status enums convert to and from their database text with `as_db` / `from_db`.

pub mod occupancy;
pub mod plan;
pub mod visit;

// Re-exports
pub use occupancy::*;
pub use plan::*;
pub use visit::*;
