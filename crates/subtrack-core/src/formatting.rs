//! Presentation helpers for the reporting sinks.
//!
//! Cost figures stay unrounded inside the core; these helpers are applied
//! only where values leave it.

/// Round `value` to `decimals` places, half away from zero.
///
/// A tiny relative epsilon is added before rounding so values such as
/// `1.005`, stored as `1.00499999…`, still round up.
///
/// # Examples
///
/// ```
/// use subtrack_core::formatting::round_to;
///
/// assert_eq!(round_to(9.677419, 2), 9.68);
/// assert_eq!(round_to(-2.345, 1), -2.3);
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10_f64.powi(decimals as i32);
    let scaled = value.abs() * factor;
    let rounded = (scaled + f64::EPSILON * scaled).round() / factor;
    rounded.copysign(value)
}

/// Format a number with thousands separators and a fixed number of decimals.
///
/// # Examples
///
/// ```
/// use subtrack_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 0), "-9,877");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let rounded = round_to(value, decimals);
    let negative = rounded < 0.0;
    let fixed = format!("{:.prec$}", rounded.abs(), prec = decimals as usize);

    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(f) = frac_part {
        out.push('.');
        out.push_str(f);
    }
    out
}

/// Format a monetary amount with `symbol` and two decimals.
///
/// # Examples
///
/// ```
/// use subtrack_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.567, "₹"), "₹1,234.57");
/// assert_eq!(format_currency(-9.99, "$"), "-$9.99");
/// ```
pub fn format_currency(amount: f64, symbol: &str) -> String {
    let body = format_number(amount.abs(), 2);
    if round_to(amount, 2) < 0.0 {
        format!("-{symbol}{body}")
    } else {
        format!("{symbol}{body}")
    }
}

/// `"1 day"` / `"5 days"`.
pub fn format_days(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

/// Hours with at most two decimals and no trailing zeros, e.g. `"12.5 hrs"`.
pub fn format_hours(hours: f64) -> String {
    let rounded = round_to(hours, 2);
    let mut s = format!("{rounded:.2}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    let unit = if s == "1" { "hr" } else { "hrs" };
    format!("{s} {unit}")
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    let len = s.len();
    let mut result = String::with_capacity(len + len / 3);
    for (i, c) in s.chars().enumerate() {
        if i != 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
