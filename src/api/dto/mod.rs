//! Data Transfer Objects for REST request/response serialization.
//!
//! Dates travel as `YYYY-MM-DD` strings, timestamps as epoch seconds and
//! event identifiers as plain integers.

pub mod day_dto;
pub mod event_dto;

pub use day_dto::*;
pub use event_dto::*;
