//! Error codes shared by the server and its clients
//!
//! Every failure a client can see maps to one [`ErrorCode`]; the code picks
//! the HTTP status and the [`ErrorCategory`]. [`AppError`] carries the code
//! through handlers and [`ApiResponse`] is what goes on the wire.
//!
//! # Code ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 3xxx: Membership / plan errors
//! - 4xxx: Billing errors
//! - 5xxx: Payment errors
//! - 6xxx: Occupancy errors
//! - 7xxx: Booking errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::new(ErrorCode::SeatOccupied).with_detail("seat_id", 12);
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, 6003);
//! assert_eq!(response.details.unwrap()["seat_id"], 12);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError};
