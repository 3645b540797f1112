//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` lets consumers follow days: after a
//! `subscribe` command, every change notification for those days is
//! pushed as an `event` message, and `get_day` returns a day's current
//! contents on demand.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
