//! Per-connection subscription manager.
//!
//! Tracks which days a WebSocket client follows and provides
//! server-side event filtering.

use std::collections::BTreeSet;

use chrono::NaiveDate;

/// Manages the set of day subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed days. Ignored while `subscribe_all` is set.
    dates: BTreeSet<NaiveDate>,
    /// Whether the client follows every day (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds days to the subscription set and optionally enables the
    /// wildcard.
    pub fn subscribe(&mut self, dates: &[NaiveDate], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.dates.extend(dates.iter().copied());
    }

    /// Removes days from the subscription set and optionally clears the
    /// wildcard.
    pub fn unsubscribe(&mut self, dates: &[NaiveDate], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for date in dates {
            self.dates.remove(date);
        }
    }

    /// Returns `true` if notifications for `date` should be forwarded.
    #[must_use]
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.subscribe_all || self.dates.contains(&date)
    }

    /// Returns the number of explicitly subscribed days.
    #[must_use]
    pub fn count(&self) -> usize {
        self.dates.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
