//! Billing-cycle window derivation.
//!
//! A cycle is the calendar month ending at a subscription's due date. Month
//! subtraction uses chrono's [`Months`] arithmetic in UTC: when the due
//! date's day-of-month does not exist in the previous month, the start is
//! clamped to that month's last day (Mar 31 → Feb 29 in a leap year). The
//! time of day is carried over unchanged.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

const SECONDS_PER_DAY: i64 = 86_400;

/// The window of one billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCycle {
    /// Inclusive start, one calendar month before `end`.
    pub start: DateTime<Utc>,
    /// The due date.
    pub end: DateTime<Utc>,
    /// Whole days in the window, rounded up.
    pub length_days: i64,
}

/// Stateless cycle calculation.
pub struct CycleCalculator;

impl CycleCalculator {
    /// Compute the billing cycle ending at `due_date`.
    ///
    /// Fails with [`RecordError::InvalidValue`] when the subtraction leaves
    /// chrono's representable range, and with
    /// [`RecordError::ZeroCycleLength`] if the window is empty.
    pub fn cycle(due_date: DateTime<Utc>) -> Result<BillingCycle, RecordError> {
        let start = due_date.checked_sub_months(Months::new(1)).ok_or_else(|| {
            RecordError::invalid(
                "dueDate",
                format!("{} is out of range for month arithmetic", due_date),
            )
        })?;

        let length_days = ceil_days(due_date - start);
        if length_days <= 0 {
            return Err(RecordError::ZeroCycleLength { due_date });
        }

        Ok(BillingCycle {
            start,
            end: due_date,
            length_days,
        })
    }
}

/// Number of days in `span`, with any partial day rounded up.
///
/// Negative spans round toward zero, matching ceiling semantics.
pub fn ceil_days(span: chrono::TimeDelta) -> i64 {
    let secs = span.num_seconds();
    let whole = secs.div_euclid(SECONDS_PER_DAY);
    if secs.rem_euclid(SECONDS_PER_DAY) > 0 || (secs >= 0 && span.subsec_nanos() > 0) {
        whole + 1
    } else {
        whole
    }
}
