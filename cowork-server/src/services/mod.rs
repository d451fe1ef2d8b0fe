//! Workflows over the store and gateway traits

pub mod booking;
pub mod cancellation;
pub mod chatbot;
pub mod checkin;
pub mod occupancy;
