use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single tracked subscription as handed to the core by the record source.
///
/// The core treats records as read-only. Field names serialise in camelCase
/// to match the documents stored by the surrounding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    /// Opaque identifier assigned by storage.
    pub id: String,
    /// Owner of the subscription, `None` when unassigned.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Display label.
    #[serde(default)]
    pub name: String,
    /// Amount charged for one full billing cycle.
    #[serde(default)]
    pub price: Option<f64>,
    /// End of the current billing cycle and date of the next charge.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Informational only.
    #[serde(default)]
    pub is_auto_pay: bool,
    /// Hours of use accumulated within the current cycle.
    #[serde(default)]
    pub usage_hours: Option<f64>,
    /// Most recent recorded use, `None` when never used.
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    /// Create a record with only an id and a name; every other field takes
    /// its schema default.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            name: name.into(),
            price: None,
            due_date: None,
            is_auto_pay: false,
            usage_hours: Some(0.0),
            last_used: None,
        }
    }

    /// Owner label used in human-readable messages.
    pub fn owner_label(&self) -> &str {
        self.user_id.as_deref().unwrap_or("N/A")
    }
}

/// Payload handed to a notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: Option<String>,
    pub title: String,
    pub body: String,
}

/// Which classifier raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// No recorded use within the staleness threshold.
    Stale,
    /// Due date falls inside the look-ahead window.
    NearingExpiry,
}

impl AlertKind {
    /// Stable label used in reports and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Stale => "stale",
            AlertKind::NearingExpiry => "nearing_expiry",
        }
    }
}

/// An alert about one subscription, carrying its ready-to-send message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub record_id: String,
    pub name: String,
    pub notification: Notification,
}
