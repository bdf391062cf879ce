//! Occurrence projection for recurring expenses
//!
//! Answers "what is the single next billing date still pending, given what
//! already happened" for a recurring expense inside a reporting window. This
//! is a forgiving heuristic, not RFC-5545 recurrence evaluation: when the
//! cadence is unrecognized the projector degrades to window-membership
//! checks, and all forward-stepping loops are bounded so malformed input can
//! never spin.

use chrono::{Datelike, NaiveDate};

use crate::cadence::{add_step, CadenceStep};
use crate::models::{RecurringExpense, RecurringInstance, ReportingWindow};

/// Hard bound on forward-stepping loops; guarantees termination regardless
/// of cadence/date input
pub const MAX_PROJECTION_STEPS: usize = 60;

/// Project the next pending occurrence from an anchor date
///
/// Rules, in order:
/// 1. anchor strictly after the window end: no occurrence;
/// 2. anchor before the window start: step forward by the cadence into the
///    window, or re-anchor the day-of-month onto the window's month (clamped
///    to its last valid day) when stepping is unavailable or misses;
/// 3. candidate before the reference date: step forward past the reference,
///    rejecting anything beyond the window end; without a cadence the
///    candidate survives only if it was window-aligned in step 2.
pub fn next_occurrence(
    anchor: NaiveDate,
    step: Option<&CadenceStep>,
    window: Option<ReportingWindow>,
    reference: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let mut candidate = anchor;
    let mut window_aligned = false;

    if let Some(window) = window {
        if candidate > window.end {
            return None;
        }
        if candidate < window.start {
            let mut adjusted = None;
            if let Some(step) = step {
                let mut cursor = candidate;
                for _ in 0..MAX_PROJECTION_STEPS {
                    cursor = add_step(cursor, step);
                    if cursor >= window.start {
                        break;
                    }
                }
                if window.contains(cursor) {
                    adjusted = Some(cursor);
                }
            }
            if adjusted.is_none() {
                let aligned = align_to_month(candidate, window.start);
                if window.contains(aligned) {
                    adjusted = Some(aligned);
                    window_aligned = true;
                }
            }
            candidate = adjusted?;
        }
    }

    if let Some(reference) = reference {
        if candidate < reference {
            match step {
                Some(step) => {
                    let mut cursor = candidate;
                    let mut found = None;
                    for _ in 0..MAX_PROJECTION_STEPS {
                        cursor = add_step(cursor, step);
                        if let Some(window) = window {
                            if cursor > window.end {
                                return None;
                            }
                        }
                        if cursor >= reference {
                            found = Some(cursor);
                            break;
                        }
                    }
                    candidate = found?;
                }
                None => {
                    // A window-aligned candidate is kept even though its day
                    // already passed; anything else cannot be projected
                    if !window_aligned {
                        return None;
                    }
                }
            }
        }
    }

    Some(candidate)
}

/// Re-anchor a date's day-of-month onto the month containing `target`,
/// clamped to that month's last valid day
fn align_to_month(date: NaiveDate, target: NaiveDate) -> NaiveDate {
    let day = date.day().min(days_in_month(target.year(), target.month()));
    NaiveDate::from_ymd_opt(target.year(), target.month(), day).unwrap_or(target)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    for day in (28..=31).rev() {
        if NaiveDate::from_ymd_opt(year, month, day).is_some() {
            return day;
        }
    }
    28
}

/// Project a recurring expense into a window as of `reference`
///
/// Returns None when no anchor date is known, the expense's lifecycle has
/// ended before the window, or no pending occurrence lands inside it.
pub fn project_expense(
    expense: &RecurringExpense,
    window: ReportingWindow,
    reference: NaiveDate,
) -> Option<RecurringInstance> {
    let anchor = expense.projection_anchor()?;
    if expense.end_date.is_some_and(|end| end < window.start) {
        return None;
    }
    let step = expense.cadence.as_deref().and_then(crate::cadence::resolve);
    let occurs_on = next_occurrence(anchor, step.as_ref(), Some(window), Some(reference))?;
    Some(RecurringInstance {
        expense: expense.clone(),
        occurs_on,
    })
}
