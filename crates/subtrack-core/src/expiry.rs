//! Flags subscriptions whose due date is close.
//!
//! Classification only; sending the alert belongs to the caller.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Alert, AlertKind, Notification, SubscriptionRecord};
use crate::time_utils::TimezoneHandler;

/// Default look-ahead window in days.
pub const DEFAULT_EXPIRY_WINDOW_DAYS: u32 = 3;

pub const EXPIRY_TITLE: &str = "Subscription Expiring Soon";

/// Stateless near-expiry rule.
pub struct ExpiryClassifier;

impl ExpiryClassifier {
    /// `true` iff `due_date` is set and `now <= due_date <= now + look_ahead_days`.
    ///
    /// A horizon past the latest representable instant has no upper bound.
    pub fn is_nearing_expiry(
        record: &SubscriptionRecord,
        look_ahead_days: u32,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(due) = record.due_date else {
            return false;
        };
        let horizon = now.checked_add_signed(Duration::days(i64::from(look_ahead_days)));
        now <= due && horizon.map_or(true, |horizon| due <= horizon)
    }

    /// Build the expiry message, with the due date rendered in `display`'s zone.
    ///
    /// Returns `None` for records without a due date.
    pub fn notification(
        record: &SubscriptionRecord,
        display: &TimezoneHandler,
    ) -> Option<Notification> {
        let due = record.due_date?;
        Some(Notification {
            user_id: record.user_id.clone(),
            title: EXPIRY_TITLE.to_string(),
            body: format!(
                "Subscription \"{}\" is nearing expiry on {}",
                record.name,
                display.format_date(due)
            ),
        })
    }

    /// Classify and, when near expiry, return the alert with its message.
    pub fn check(
        record: &SubscriptionRecord,
        look_ahead_days: u32,
        now: DateTime<Utc>,
        display: &TimezoneHandler,
    ) -> Option<Alert> {
        if !Self::is_nearing_expiry(record, look_ahead_days, now) {
            return None;
        }
        Some(Alert {
            kind: AlertKind::NearingExpiry,
            record_id: record.id.clone(),
            name: record.name.clone(),
            notification: Self::notification(record, display)?,
        })
    }
}
