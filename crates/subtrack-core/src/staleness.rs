//! Flags subscriptions that have not been used recently.
//!
//! A record with no `last_used` timestamp is never stale under this rule.
//! Never-used subscriptions arguably deserve the same alert; that policy is
//! left unchanged pending a product decision.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Alert, AlertKind, Notification, SubscriptionRecord};

/// Default number of idle days before a subscription counts as stale.
pub const DEFAULT_STALE_AFTER_DAYS: u32 = 7;

pub const STALE_TITLE: &str = "Inactive Subscription Alert";

/// Stateless staleness rule.
pub struct StalenessClassifier;

impl StalenessClassifier {
    /// `true` iff `last_used` is set and no later than `now - threshold_days`.
    ///
    /// A cutoff before the earliest representable instant flags nothing.
    pub fn is_stale(record: &SubscriptionRecord, threshold_days: u32, now: DateTime<Utc>) -> bool {
        let Some(last_used) = record.last_used else {
            return false;
        };
        now.checked_sub_signed(Duration::days(i64::from(threshold_days)))
            .is_some_and(|cutoff| last_used <= cutoff)
    }

    /// Build the inactivity notification for `record`.
    pub fn notification(record: &SubscriptionRecord, threshold_days: u32) -> Notification {
        Notification {
            user_id: record.user_id.clone(),
            title: STALE_TITLE.to_string(),
            body: format!(
                "Subscription \"{}\" (User: {}) not used in {}+ days",
                record.name,
                record.owner_label(),
                threshold_days
            ),
        }
    }

    /// Classify and, when stale, return the ready-to-dispatch alert.
    pub fn check(
        record: &SubscriptionRecord,
        threshold_days: u32,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        if !Self::is_stale(record, threshold_days, now) {
            return None;
        }
        Some(Alert {
            kind: AlertKind::Stale,
            record_id: record.id.clone(),
            name: record.name.clone(),
            notification: Self::notification(record, threshold_days),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap()
    }

    fn used(days_ago: i64) -> SubscriptionRecord {
        SubscriptionRecord {
            last_used: Some(now() - Duration::days(days_ago)),
            user_id: Some("u1".to_string()),
            ..SubscriptionRecord::new("s1", "Prime Video")
        }
    }

    #[test]
    fn test_eight_days_idle_is_stale() {
        assert!(StalenessClassifier::is_stale(&used(8), 7, now()));
    }

    #[test]
    fn test_six_days_idle_is_not_stale() {
        assert!(!StalenessClassifier::is_stale(&used(6), 7, now()));
    }

    #[test]
    fn test_exactly_threshold_is_stale() {
        assert!(StalenessClassifier::is_stale(&used(7), 7, now()));
    }

    #[test]
    fn test_unrepresentable_cutoff_is_not_stale() {
        let ancient = SubscriptionRecord {
            last_used: Some(DateTime::<Utc>::MIN_UTC),
            ..used(0)
        };
        assert!(!StalenessClassifier::is_stale(&ancient, u32::MAX, now()));
        assert!(StalenessClassifier::check(&used(10_000), u32::MAX, now()).is_none());
    }

    #[test]
    fn test_never_used_is_not_stale() {
        let rec = SubscriptionRecord::new("s1", "Prime Video");
        assert!(!StalenessClassifier::is_stale(&rec, 7, now()));
        assert!(StalenessClassifier::check(&rec, 7, now()).is_none());
    }

    #[test]
    fn test_custom_threshold() {
        assert!(StalenessClassifier::is_stale(&used(3), 2, now()));
        assert!(!StalenessClassifier::is_stale(&used(3), 30, now()));
    }

    #[test]
    fn test_notification_payload() {
        let alert = StalenessClassifier::check(&used(10), 7, now()).expect("stale");
        assert_eq!(alert.kind, AlertKind::Stale);
        assert_eq!(alert.record_id, "s1");
        assert_eq!(alert.notification.user_id.as_deref(), Some("u1"));
        assert_eq!(alert.notification.title, STALE_TITLE);
        assert_eq!(
            alert.notification.body,
            "Subscription \"Prime Video\" (User: u1) not used in 7+ days"
        );
    }

    #[test]
    fn test_notification_unassigned_owner() {
        let rec = SubscriptionRecord {
            user_id: None,
            ..used(10)
        };
        let n = StalenessClassifier::notification(&rec, 7);
        assert!(n.user_id.is_none());
        assert!(n.body.contains("(User: N/A)"));
    }
}
