//! Alert composition and delivery
//!
//! Violating categories collapse into one notification per wake. A sorted
//! signature over the violating set dedupes repeat alerts: the same set of
//! categories in the same states never notifies twice in a row, and an empty
//! set clears the stored signature so the next violation alerts again.

use paceline_core::models::{BudgetProgress, BudgetStatus};
use tracing::info;

/// Stable tag so a new alert replaces the previous one at the OS level
pub const NOTIFICATION_TAG: &str = "paceline-budget-alert";

/// A composed, ready-to-deliver alert
#[derive(Debug, Clone, PartialEq)]
pub struct AlertNotification {
    pub title: String,
    pub body: String,
    pub tag: String,
}

/// Delivery sink for composed alerts
///
/// The daemon core stays platform-neutral; hosts plug in a desktop or
/// mobile bridge here.
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &AlertNotification);
}

/// Default sink: structured log lines instead of OS notifications
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: &AlertNotification) {
        info!(title = %alert.title, body = %alert.body, "Budget alert");
    }
}

/// Order-independent identity of a violating set
///
/// Sorted `{id}:{status}` pairs joined with `|`; identical sets on
/// consecutive wakes produce identical signatures.
pub fn alert_signature(violations: &[&BudgetProgress]) -> String {
    let mut parts: Vec<String> = violations
        .iter()
        .map(|p| format!("{}:{}", p.signature_id(), p.status.as_str()))
        .collect();
    parts.sort();
    parts.join("|")
}

fn status_phrase(status: BudgetStatus) -> &'static str {
    match status {
        BudgetStatus::Over => "over budget",
        BudgetStatus::AtRisk => "at risk",
        BudgetStatus::OnTrack => "on track",
    }
}

/// Collapse the violating set into a single notification
///
/// Returns None when nothing is violating.
pub fn compose(violations: &[&BudgetProgress]) -> Option<AlertNotification> {
    match violations {
        [] => None,
        [single] => {
            let mut body = format!(
                "{:.2} spent of {:.2} {}",
                single.spent, single.budgeted, single.currency
            );
            if single.recurring_total > 0.0 {
                body.push_str(&format!(
                    ", {:.2} recurring still due",
                    single.recurring_total
                ));
            }
            Some(AlertNotification {
                title: format!("{} is {}", single.name, status_phrase(single.status)),
                body,
                tag: NOTIFICATION_TAG.to_string(),
            })
        }
        many => {
            let names: Vec<String> = many
                .iter()
                .map(|p| format!("{} ({})", p.name, status_phrase(p.status)))
                .collect();
            Some(AlertNotification {
                title: format!("Budget alerts: {} categories", many.len()),
                body: names.join(", "),
                tag: NOTIFICATION_TAG.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(id: i64, name: &str, status: BudgetStatus) -> BudgetProgress {
        BudgetProgress {
            category_id: Some(id),
            name: name.to_string(),
            group_name: None,
            is_income: false,
            budgeted: 100.0,
            currency: "USD".to_string(),
            spent: 110.0,
            remaining: -10.0,
            num_transactions: 3,
            is_automated: false,
            recurring_total: 0.0,
            status,
            progress_ratio: 1.0,
        }
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = progress(4, "Groceries", BudgetStatus::Over);
        let b = progress(7, "Dining Out", BudgetStatus::AtRisk);
        assert_eq!(alert_signature(&[&a, &b]), alert_signature(&[&b, &a]));
        assert_eq!(alert_signature(&[&a, &b]), "4:over|7:at-risk");
    }

    #[test]
    fn test_signature_changes_with_status() {
        let over = progress(4, "Groceries", BudgetStatus::Over);
        let risky = progress(4, "Groceries", BudgetStatus::AtRisk);
        assert_ne!(alert_signature(&[&over]), alert_signature(&[&risky]));
    }

    #[test]
    fn test_unbudgeted_record_signs_by_name() {
        let mut p = progress(0, "Uncategorised Expenses", BudgetStatus::Over);
        p.category_id = None;
        assert_eq!(alert_signature(&[&p]), "Uncategorised Expenses:over");
    }

    #[test]
    fn test_compose_empty_is_none() {
        assert!(compose(&[]).is_none());
    }

    #[test]
    fn test_compose_single_over() {
        let p = progress(4, "Groceries", BudgetStatus::Over);
        let alert = compose(&[&p]).unwrap();
        assert_eq!(alert.title, "Groceries is over budget");
        assert_eq!(alert.body, "110.00 spent of 100.00 USD");
        assert_eq!(alert.tag, NOTIFICATION_TAG);
    }

    #[test]
    fn test_compose_single_with_recurring() {
        let mut p = progress(4, "Groceries", BudgetStatus::AtRisk);
        p.recurring_total = 25.5;
        let alert = compose(&[&p]).unwrap();
        assert_eq!(alert.title, "Groceries is at risk");
        assert!(alert.body.ends_with("25.50 recurring still due"));
    }

    #[test]
    fn test_compose_multiple_collapses() {
        let a = progress(4, "Groceries", BudgetStatus::Over);
        let b = progress(7, "Dining Out", BudgetStatus::AtRisk);
        let alert = compose(&[&a, &b]).unwrap();
        assert_eq!(alert.title, "Budget alerts: 2 categories");
        assert_eq!(alert.body, "Groceries (over budget), Dining Out (at risk)");
    }
}
