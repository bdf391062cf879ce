//! Cadence resolution and calendar stepping
//!
//! Turns free-text cadence strings ("monthly", "every 2 weeks", "bi-weekly",
//! "semi-monthly") into a concrete calendar step, and advances dates by that
//! step with month-end clamping (Jan 31 + 1 month = Feb 28/29).
//!
//! Two of the mappings are documented approximations rather than exact
//! calendar rules: "semi-monthly"/"twice a month" maps to 15 days, and
//! "bi-monthly"/"every other month" without an explicit number maps to
//! 2 months.

use std::sync::OnceLock;

use chrono::{Duration, Months, NaiveDate};
use regex::Regex;

/// A calendar step; exactly one field is non-zero in the common case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceStep {
    pub years: u32,
    pub months: u32,
    pub weeks: i64,
    pub days: i64,
}

impl CadenceStep {
    pub fn years(n: u32) -> Self {
        Self { years: n, months: 0, weeks: 0, days: 0 }
    }

    pub fn months(n: u32) -> Self {
        Self { years: 0, months: n, weeks: 0, days: 0 }
    }

    pub fn weeks(n: i64) -> Self {
        Self { years: 0, months: 0, weeks: n, days: 0 }
    }

    pub fn days(n: i64) -> Self {
        Self { years: 0, months: 0, weeks: 0, days: n }
    }
}

fn magnitude_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("valid magnitude pattern"))
}

/// Resolve a free-text cadence into a calendar step
///
/// Returns None for unrecognized text. Callers must treat None as "cannot
/// project forward" and fall back to window-membership-only logic, not as an
/// error.
pub fn resolve(text: &str) -> Option<CadenceStep> {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    let explicit = magnitude_pattern()
        .find(&normalized)
        .and_then(|m| m.as_str().parse::<u32>().ok());
    let magnitude = explicit.unwrap_or(1);

    let has = |needle: &str| normalized.contains(needle);

    if has("quarter") {
        return Some(CadenceStep::months(magnitude.saturating_mul(3)));
    }
    if has("year") || has("annual") {
        return Some(CadenceStep::years(magnitude));
    }
    if has("month") {
        if explicit.is_none() {
            if has("other") || has("bi") {
                return Some(CadenceStep::months(2));
            }
            if has("semi") || has("twice") {
                // Semi-monthly billing approximated as a 15-day step
                return Some(CadenceStep::days(15));
            }
        }
        return Some(CadenceStep::months(magnitude));
    }
    if has("week") {
        if explicit.is_none() && has("bi") {
            return Some(CadenceStep::weeks(2));
        }
        return Some(CadenceStep::weeks(i64::from(magnitude)));
    }
    // "daily" does not contain "day", so both spellings are matched
    if has("day") || has("daily") {
        if explicit.is_none() && has("bi") {
            return Some(CadenceStep::days(2));
        }
        return Some(CadenceStep::days(i64::from(magnitude)));
    }

    None
}

/// Advance a date by one cadence step
///
/// Month and year components clamp to the target month's last valid day;
/// week and day components are exact.
pub fn add_step(date: NaiveDate, step: &CadenceStep) -> NaiveDate {
    let mut result = date;
    let months = step.years.saturating_mul(12).saturating_add(step.months);
    if months > 0 {
        result = result
            .checked_add_months(Months::new(months))
            .unwrap_or(result);
    }
    let days = step.weeks * 7 + step.days;
    if days != 0 {
        result = result
            .checked_add_signed(Duration::days(days))
            .unwrap_or(result);
    }
    result
}
