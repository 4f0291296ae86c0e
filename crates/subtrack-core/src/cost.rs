use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cycle::{ceil_days, BillingCycle, CycleCalculator};
use crate::error::RecordError;
use crate::models::SubscriptionRecord;

// ── Result types ──────────────────────────────────────────────────────────────

/// Cost derived from the hours a subscription was actually used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageCost {
    /// Hours of use the figures are based on (always > 0).
    pub usage_hours: f64,
    /// `price / usage_hours`.
    pub hourly_cost: f64,
    /// Whole days from cycle start to last use, never less than 1.
    pub days_since_start: i64,
    /// `price / days_since_start`.
    pub daily_used_cost: f64,
}

/// Everything the cost model derives for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub record_id: String,
    pub name: String,
    pub user_id: Option<String>,
    /// Price of one full cycle.
    pub price: f64,
    pub cycle: BillingCycle,
    /// `price / cycle.length_days`.
    pub daily_cost: f64,
    /// `None` when the record carries no usage hours.
    pub usage: Option<UsageCost>,
}

/// Price and due date after validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricedRecord {
    pub price: f64,
    pub due_date: DateTime<Utc>,
    /// Zero when absent.
    pub usage_hours: f64,
}

// ── CostAnalyzer ──────────────────────────────────────────────────────────────

/// Stateless collection of billing-cycle cost calculations.
pub struct CostAnalyzer;

impl CostAnalyzer {
    /// Check the fields the cost model depends on.
    ///
    /// Missing `price` or `dueDate` yields [`RecordError::Incomplete`];
    /// negative or non-finite amounts yield [`RecordError::InvalidValue`].
    pub fn validate(record: &SubscriptionRecord) -> Result<PricedRecord, RecordError> {
        let mut missing = Vec::new();
        if record.price.is_none() {
            missing.push("price".to_string());
        }
        if record.due_date.is_none() {
            missing.push("dueDate".to_string());
        }
        let (Some(price), Some(due_date)) = (record.price, record.due_date) else {
            return Err(RecordError::Incomplete { missing });
        };

        check_amount("price", price)?;
        let usage_hours = record.usage_hours.unwrap_or(0.0);
        check_amount("usageHours", usage_hours)?;

        Ok(PricedRecord {
            price,
            due_date,
            usage_hours,
        })
    }

    /// Flat daily cost: the cycle price spread evenly over the cycle's days.
    pub fn daily_cost(price: f64, cycle: &BillingCycle) -> f64 {
        price / cycle.length_days as f64
    }

    /// Usage-based cost, or `None` when `usage_hours` is zero.
    ///
    /// When the record was never used, the cycle start stands in for the
    /// last-use time; the day count is clamped to at least 1 either way.
    pub fn usage_cost(
        price: f64,
        usage_hours: f64,
        last_used: Option<DateTime<Utc>>,
        cycle: &BillingCycle,
    ) -> Option<UsageCost> {
        if usage_hours <= 0.0 {
            return None;
        }
        let reference = last_used.unwrap_or(cycle.start);
        let days_since_start = ceil_days(reference - cycle.start).max(1);

        Some(UsageCost {
            usage_hours,
            hourly_cost: price / usage_hours,
            days_since_start,
            daily_used_cost: price / days_since_start as f64,
        })
    }

    /// Run the full cost model over one record.
    pub fn analyze(record: &SubscriptionRecord) -> Result<CostBreakdown, RecordError> {
        let priced = Self::validate(record)?;
        let cycle = CycleCalculator::cycle(priced.due_date)?;
        let daily_cost = Self::daily_cost(priced.price, &cycle);
        let usage = Self::usage_cost(priced.price, priced.usage_hours, record.last_used, &cycle);

        Ok(CostBreakdown {
            record_id: record.id.clone(),
            name: record.name.clone(),
            user_id: record.user_id.clone(),
            price: priced.price,
            cycle,
            daily_cost,
            usage,
        })
    }

    /// Portfolio daily cost: the sum of every breakdown's `daily_cost`.
    pub fn total_daily_cost(breakdowns: &[CostBreakdown]) -> f64 {
        breakdowns.iter().map(|b| b.daily_cost).sum()
    }
}

fn check_amount(field: &str, value: f64) -> Result<(), RecordError> {
    if !value.is_finite() {
        return Err(RecordError::invalid(field, format!("{value} is not a finite number")));
    }
    if value < 0.0 {
        return Err(RecordError::invalid(
            field,
            format!("must not be negative (got {value})"),
        ));
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
