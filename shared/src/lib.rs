//! Shared types and business rules for the coworking platform
//!
//! Domain models, the error system and every pure rule the server applies:
//! billing arithmetic, seat admission, booking validation, QR tokens and
//! knowledge-base matching. Nothing in this crate performs I/O.

pub mod billing;
pub mod booking;
pub mod chatbot;
pub mod checkin;
pub mod error;
pub mod models;
pub mod util;

pub use error::{ApiResponse, AppError, ErrorCategory, ErrorCode};
