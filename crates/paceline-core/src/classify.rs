//! Budget status classification
//!
//! The single classifier shared by the foreground aggregator and the
//! background worker, so the two execution contexts cannot drift. A
//! `BudgetProgress.status` is always derived here from
//! `(consumed, budgeted, elapsed, warn_at)`; callers never set it directly.
//!
//! Sign convention: `consumed` is a non-negative magnitude of budget
//! consumption. Income summaries are negated exactly once, in
//! [`consumed_amount`], before reaching the classifier.

use crate::models::{BudgetStatus, CategorySummary, PeriodTotals};

/// Default ratio at which a category is flagged at-risk
pub const DEFAULT_WARN_RATIO: f64 = 0.85;

/// How far ahead of the elapsed fraction spending may run before pacing
/// flags the category
const PACING_MARGIN: f64 = 0.10;

/// Floating tolerance when comparing the consumed ratio against 1.0
const OVER_TOLERANCE: f64 = 0.005;

/// Classify consumption against a budget and the elapsed period fraction
///
/// - no budget (`budgeted <= 0`): on-track;
/// - ratio at or past 1.0 (within tolerance): over;
/// - ratio past `warn_at`, or running more than [`PACING_MARGIN`] ahead of
///   the elapsed fraction: at-risk;
/// - otherwise on-track.
pub fn classify(consumed: f64, budgeted: f64, elapsed: f64, warn_at: f64) -> BudgetStatus {
    if budgeted <= 0.0 {
        return BudgetStatus::OnTrack;
    }
    let ratio = consumed / budgeted;
    if ratio >= 1.0 - OVER_TOLERANCE {
        return BudgetStatus::Over;
    }
    if ratio >= warn_at || ratio >= elapsed + PACING_MARGIN {
        return BudgetStatus::AtRisk;
    }
    BudgetStatus::OnTrack
}

/// Classify with known recurring activity still expected before period end
///
/// Both call sites fold the recurring total identically: it is added to the
/// consumed figure before the status call, never passed separately.
pub fn classify_with_recurring(
    consumed: f64,
    recurring_total: f64,
    budgeted: f64,
    elapsed: f64,
    warn_at: f64,
) -> BudgetStatus {
    classify(consumed + recurring_total.max(0.0), budgeted, elapsed, warn_at)
}

/// 0..1 clamp of consumed/budgeted for display
pub fn progress_ratio(consumed: f64, budgeted: f64) -> f64 {
    if budgeted <= 0.0 {
        return 0.0;
    }
    (consumed / budgeted).clamp(0.0, 1.0)
}

/// Canonical consumed magnitude for a summary's period totals
///
/// Expenses report positive spend; income categories report received money
/// as negative spend and are negated here, once, for both contexts.
pub fn consumed_amount(summary: &CategorySummary, totals: &PeriodTotals) -> f64 {
    if summary.is_income {
        -totals.spent
    } else {
        totals.spent
    }
}
