//! Budget aggregation
//!
//! Combines category summaries, transaction lists, the occurrence projector,
//! and the classifier into per-category `BudgetProgress` records. Two passes
//! share every pure building block:
//!
//! - the full pass (foreground) splits the uncategorized bucket by
//!   transaction sign and folds pending recurring occurrences into each
//!   category's classification;
//! - the reduced pass (background) classifies straight off summary totals.
//!
//! Only the summary fetch is fatal. Transaction and recurring fetches
//! degrade with a warning: the pass then falls back to summary totals and
//! skips recurring matching rather than failing outright.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::warn;

use crate::api::BudgetApi;
use crate::classify::{
    classify_with_recurring, consumed_amount, progress_ratio,
};
use crate::error::Result;
use crate::models::{
    BudgetProgress, CategorySummary, Preferences, RecurringExpense, ReportingWindow, Transaction,
};
use crate::projector::project_expense;

/// Display names for the sign-split uncategorized records
const UNCATEGORISED_EXPENSES: &str = "Uncategorised Expenses";
const UNCATEGORISED_INCOME: &str = "Uncategorised Income";

/// A progress record plus the summary flags the merge step still needs
struct Candidate {
    progress: BudgetProgress,
    /// Consumed magnitude used for (re)classification
    consumed: f64,
    is_group: bool,
    exclude_from_budget: bool,
}

/// Budget aggregation over the API client
#[derive(Clone)]
pub struct Aggregator {
    api: BudgetApi,
}

impl Aggregator {
    pub fn new(api: BudgetApi) -> Self {
        Self { api }
    }

    /// Full foreground pass over a reporting window
    pub async fn budget_progress(
        &self,
        window: ReportingWindow,
        today: NaiveDate,
        prefs: &Preferences,
    ) -> Result<Vec<BudgetProgress>> {
        let elapsed = window.elapsed_fraction(today);
        let warn_at = prefs.warn_at_ratio;

        // Summary fetch failure fails the whole pass; the caller keeps its
        // previous successful result until a new one fully succeeds
        let summaries = self.api.budget_summaries(window).await?;

        // Lazily-fetched unfiltered window transactions, shared between the
        // uncategorized split and recurring matching
        let mut window_transactions: Option<Vec<Transaction>> = None;

        let mut candidates: Vec<Candidate> = Vec::new();
        for summary in &summaries {
            if summary.is_uncategorized() {
                let split = self
                    .split_uncategorized(summary, window, elapsed, prefs, &mut window_transactions)
                    .await;
                candidates.extend(split);
            } else {
                candidates.push(build_candidate(summary, window, elapsed, warn_at, prefs));
            }
        }

        let mut candidates = apply_group_precedence(candidates);
        candidates.retain(|c| !c.exclude_from_budget);

        self.apply_recurring(&mut candidates, window, today, prefs, &mut window_transactions)
            .await;

        Ok(candidates.into_iter().map(|c| c.progress).collect())
    }

    /// Reduced background pass: summary totals only, no transaction split
    ///
    /// Filters income categories, group rollups, and budget-excluded
    /// categories before classification.
    pub async fn summary_progress(
        &self,
        window: ReportingWindow,
        today: NaiveDate,
        prefs: &Preferences,
    ) -> Result<Vec<BudgetProgress>> {
        let elapsed = window.elapsed_fraction(today);
        let summaries = self.api.budget_summaries(window).await?;

        Ok(summaries
            .iter()
            .filter(|s| !s.is_income && !s.is_group && !s.exclude_from_budget)
            .map(|s| build_candidate(s, window, elapsed, prefs.warn_at_ratio, prefs).progress)
            .collect())
    }

    /// Sign-split the uncategorized bucket's transactions
    ///
    /// Falls back to a single summary-totals record when the transaction
    /// fetch fails or yields no qualifying transactions.
    async fn split_uncategorized(
        &self,
        summary: &CategorySummary,
        window: ReportingWindow,
        elapsed: f64,
        prefs: &Preferences,
        window_transactions: &mut Option<Vec<Transaction>>,
    ) -> Vec<Candidate> {
        let warn_at = prefs.warn_at_ratio;
        let fallback = || vec![build_candidate(summary, window, elapsed, warn_at, prefs)];

        let transactions = match summary.category_id {
            Some(id) => match self.api.transactions(Some(id), window).await {
                Ok(transactions) => transactions,
                Err(err) => {
                    warn!(error = %err, "Uncategorized transaction fetch failed, using summary totals");
                    return fallback();
                }
            },
            None => match self
                .fetch_window_transactions(window, window_transactions)
                .await
            {
                Some(all) => all
                    .iter()
                    .filter(|t| t.category_id.is_none())
                    .cloned()
                    .collect(),
                None => return fallback(),
            },
        };

        // Positive = money leaving the account
        let expenses: Vec<&Transaction> = transactions.iter().filter(|t| t.amount > 0.0).collect();
        let income: Vec<&Transaction> = transactions.iter().filter(|t| t.amount < 0.0).collect();

        if expenses.is_empty() && income.is_empty() {
            return fallback();
        }

        let currency = summary.currency_or(&prefs.currency).to_string();
        let mut records = Vec::new();
        if !expenses.is_empty() {
            records.push(sign_split_candidate(
                summary,
                UNCATEGORISED_EXPENSES,
                false,
                &expenses,
                &currency,
                elapsed,
                warn_at,
            ));
        }
        if !income.is_empty() {
            records.push(sign_split_candidate(
                summary,
                UNCATEGORISED_INCOME,
                true,
                &income,
                &currency,
                elapsed,
                warn_at,
            ));
        }
        records
    }

    /// Fold pending recurring occurrences into matching records
    ///
    /// Both fetches degrade to "nothing pending" on failure; a recurring
    /// expense already represented by a transaction (matched by recurring
    /// id) does not count again.
    async fn apply_recurring(
        &self,
        candidates: &mut [Candidate],
        window: ReportingWindow,
        today: NaiveDate,
        prefs: &Preferences,
        window_transactions: &mut Option<Vec<Transaction>>,
    ) {
        let expenses: Vec<RecurringExpense> = match self.api.recurring_expenses(window.start).await
        {
            Ok(expenses) => expenses,
            Err(err) => {
                warn!(error = %err, "Recurring expense fetch failed, skipping recurring totals");
                return;
            }
        };

        let category_ids: HashSet<i64> = candidates
            .iter()
            .filter_map(|c| c.progress.category_id)
            .collect();
        if !expenses
            .iter()
            .any(|e| e.category_id.is_some_and(|id| category_ids.contains(&id)))
        {
            return;
        }

        let posted: HashSet<i64> = self
            .fetch_window_transactions(window, window_transactions)
            .await
            .map(|all| all.iter().filter_map(|t| t.recurring_id).collect())
            .unwrap_or_default();

        let elapsed = window.elapsed_fraction(today);
        for candidate in candidates.iter_mut() {
            let Some(category_id) = candidate.progress.category_id else {
                continue;
            };
            let pending: f64 = expenses
                .iter()
                .filter(|e| e.category_id == Some(category_id) && !posted.contains(&e.id))
                .filter_map(|e| project_expense(e, window, today))
                .map(|instance| instance.expense.amount.abs())
                .sum();
            if pending <= 0.0 {
                continue;
            }

            let progress = &mut candidate.progress;
            progress.recurring_total = pending;
            progress.status = classify_with_recurring(
                candidate.consumed,
                pending,
                progress.budgeted,
                elapsed,
                prefs.warn_at_ratio,
            );
            progress.remaining = progress.budgeted - candidate.consumed - pending;
        }
    }

    async fn fetch_window_transactions<'a>(
        &self,
        window: ReportingWindow,
        cache: &'a mut Option<Vec<Transaction>>,
    ) -> Option<&'a Vec<Transaction>> {
        if cache.is_none() {
            match self.api.transactions(None, window).await {
                Ok(transactions) => *cache = Some(transactions),
                Err(err) => {
                    warn!(error = %err, "Window transaction fetch failed");
                    return None;
                }
            }
        }
        cache.as_ref()
    }
}

/// Build a progress record straight from a summary's period totals
fn build_candidate(
    summary: &CategorySummary,
    window: ReportingWindow,
    elapsed: f64,
    warn_at: f64,
    prefs: &Preferences,
) -> Candidate {
    let totals = summary.totals_for(&window.period_key());
    let budgeted = totals.budgeted.unwrap_or(0.0);
    let consumed = consumed_amount(summary, &totals);
    let recurring_hint = summary.recurring_total.unwrap_or(0.0).max(0.0);

    let status = classify_with_recurring(consumed, recurring_hint, budgeted, elapsed, warn_at);

    Candidate {
        progress: BudgetProgress {
            category_id: summary.category_id,
            name: summary.category_name.clone(),
            group_name: summary.category_group_name.clone(),
            is_income: summary.is_income,
            budgeted,
            currency: summary.currency_or(&prefs.currency).to_string(),
            spent: totals.spent,
            remaining: budgeted - consumed - recurring_hint,
            num_transactions: totals.num_transactions,
            is_automated: totals.is_automated,
            recurring_total: recurring_hint,
            status,
            progress_ratio: progress_ratio(consumed, budgeted),
        },
        consumed,
        is_group: summary.is_group,
        exclude_from_budget: summary.exclude_from_budget,
    }
}

/// One side of the uncategorized sign split
fn sign_split_candidate(
    summary: &CategorySummary,
    name: &str,
    is_income: bool,
    transactions: &[&Transaction],
    currency: &str,
    elapsed: f64,
    warn_at: f64,
) -> Candidate {
    let spent: f64 = transactions.iter().map(|t| t.amount).sum();
    let consumed = spent.abs();

    // The raw bucket carries no budget of its own
    let status = classify_with_recurring(consumed, 0.0, 0.0, elapsed, warn_at);

    Candidate {
        progress: BudgetProgress {
            category_id: summary.category_id,
            name: name.to_string(),
            group_name: summary.category_group_name.clone(),
            is_income,
            budgeted: 0.0,
            currency: currency.to_string(),
            spent,
            remaining: -consumed,
            num_transactions: transactions.len() as i64,
            is_automated: false,
            recurring_total: 0.0,
            status,
            progress_ratio: 0.0,
        },
        consumed,
        is_group: false,
        exclude_from_budget: false,
    }
}

/// Leaf categories take precedence over their parent group rollups
///
/// When any leaf-level record exists, every group rollup is dropped; with no
/// leaf budgets configured the rollups are all that remains, so they stay.
fn apply_group_precedence(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let has_leaf = candidates
        .iter()
        .any(|c| c.progress.category_id.is_some() && !c.is_group);
    if !has_leaf {
        return candidates;
    }
    candidates.into_iter().filter(|c| !c.is_group).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheGateway;
    use crate::db::Database;

    fn api_for(server: &mockito::Server) -> BudgetApi {
        let gateway = CacheGateway::new(Database::in_memory().unwrap());
        BudgetApi::new(gateway, &server.url(), Some("token".to_string()))
    }

    fn window() -> ReportingWindow {
        ReportingWindow::from_period("2025-10").unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 16).unwrap()
    }

    async fn mock_budgets(server: &mut mockito::Server, body: &str) -> mockito::Mock {
        server
            .mock("GET", "/budgets?start_date=2025-10-01&end_date=2025-10-31")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    async fn mock_recurring(server: &mut mockito::Server, body: &str) -> mockito::Mock {
        server
            .mock("GET", "/recurring_expenses?start_date=2025-10-01")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    async fn mock_transactions(server: &mut mockito::Server, query: &str, body: &str) -> mockito::Mock {
        server
            .mock("GET", format!("/transactions?{}", query).as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    const GROCERIES: &str = r#"{
        "category_id": 12,
        "category_name": "Groceries",
        "data": {"2025-10-01": {"budgeted": 400.0, "spent": 180.0, "num_transactions": 9}}
    }"#;

    #[tokio::test]
    async fn test_regular_summary_classifies_from_totals() {
        let mut server = mockito::Server::new_async().await;
        mock_budgets(&mut server, &format!("[{}]", GROCERIES)).await;
        mock_recurring(&mut server, r#"{"recurring_expenses":[]}"#).await;

        let aggregator = Aggregator::new(api_for(&server));
        let records = aggregator
            .budget_progress(window(), today(), &Preferences::default())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "Groceries");
        assert_eq!(record.budgeted, 400.0);
        // 45% consumed at ~52% elapsed is on pace
        assert_eq!(record.status, crate::models::BudgetStatus::OnTrack);
        assert!((record.progress_ratio - 0.45).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_uncategorized_income_only_split() {
        let mut server = mockito::Server::new_async().await;
        mock_budgets(
            &mut server,
            r#"[{
                "category_id": null,
                "category_name": "Uncategorized",
                "data": {"2025-10-01": {"spent": -171.25, "num_transactions": 2}}
            }]"#,
        ).await;
        mock_transactions(
            &mut server,
            "start_date=2025-10-01&end_date=2025-10-31&limit=500&offset=0",
            r#"{"transactions":[
                {"id": 1, "date": "2025-10-03", "amount": -120.50},
                {"id": 2, "date": "2025-10-09", "amount": -50.75}
            ]}"#,
        ).await;
        mock_recurring(&mut server, r#"{"recurring_expenses":[]}"#).await;

        let aggregator = Aggregator::new(api_for(&server));
        let records = aggregator
            .budget_progress(window(), today(), &Preferences::default())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "Uncategorised Income");
        assert!(record.is_income);
        assert!((record.spent - -171.25).abs() < 1e-9);
        assert_eq!(record.num_transactions, 2);
    }

    #[tokio::test]
    async fn test_uncategorized_mixed_signs_split_into_two() {
        let mut server = mockito::Server::new_async().await;
        mock_budgets(
            &mut server,
            r#"[{
                "category_id": null,
                "category_name": "Uncategorized",
                "data": {"2025-10-01": {"spent": 10.0, "num_transactions": 3}}
            }]"#,
        ).await;
        mock_transactions(
            &mut server,
            "start_date=2025-10-01&end_date=2025-10-31&limit=500&offset=0",
            r#"{"transactions":[
                {"id": 1, "date": "2025-10-03", "amount": 60.0},
                {"id": 2, "date": "2025-10-05", "amount": 15.0},
                {"id": 3, "date": "2025-10-09", "amount": -65.0}
            ]}"#,
        ).await;
        mock_recurring(&mut server, r#"{"recurring_expenses":[]}"#).await;

        let aggregator = Aggregator::new(api_for(&server));
        let records = aggregator
            .budget_progress(window(), today(), &Preferences::default())
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        let expenses = records.iter().find(|r| r.name == "Uncategorised Expenses").unwrap();
        let income = records.iter().find(|r| r.name == "Uncategorised Income").unwrap();
        assert!((expenses.spent - 75.0).abs() < 1e-9);
        assert_eq!(expenses.num_transactions, 2);
        assert!((income.spent - -65.0).abs() < 1e-9);
        assert_eq!(income.num_transactions, 1);
    }

    #[tokio::test]
    async fn test_uncategorized_fetch_failure_falls_back_to_summary() {
        let mut server = mockito::Server::new_async().await;
        mock_budgets(
            &mut server,
            r#"[{
                "category_id": null,
                "category_name": "Uncategorized",
                "data": {"2025-10-01": {"spent": 42.0, "num_transactions": 1}}
            }]"#,
        ).await;
        server
            .mock(
                "GET",
                "/transactions?start_date=2025-10-01&end_date=2025-10-31&limit=500&offset=0",
            )
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        mock_recurring(&mut server, r#"{"recurring_expenses":[]}"#).await;

        let aggregator = Aggregator::new(api_for(&server));
        let records = aggregator
            .budget_progress(window(), today(), &Preferences::default())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Uncategorized");
        assert!((records[0].spent - 42.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_group_rollups_dropped_when_leaf_budgets_exist() {
        let mut server = mockito::Server::new_async().await;
        mock_budgets(
            &mut server,
            r#"[
                {
                    "category_id": 12,
                    "category_name": "Groceries",
                    "category_group_name": "Essentials",
                    "data": {"2025-10-01": {"budgeted": 400.0, "spent": 180.0}}
                },
                {
                    "category_id": 90,
                    "category_name": "Essentials",
                    "is_group": true,
                    "data": {"2025-10-01": {"budgeted": 900.0, "spent": 300.0}}
                },
                {
                    "category_id": 13,
                    "category_name": "Work Lunches",
                    "exclude_from_budget": true,
                    "data": {"2025-10-01": {"budgeted": 100.0, "spent": 10.0}}
                }
            ]"#,
        ).await;
        mock_recurring(&mut server, r#"{"recurring_expenses":[]}"#).await;

        let aggregator = Aggregator::new(api_for(&server));
        let records = aggregator
            .budget_progress(window(), today(), &Preferences::default())
            .await
            .unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Groceries"]);
    }

    #[tokio::test]
    async fn test_group_rollups_kept_without_leaf_budgets() {
        let mut server = mockito::Server::new_async().await;
        mock_budgets(
            &mut server,
            r#"[{
                "category_id": 90,
                "category_name": "Essentials",
                "is_group": true,
                "data": {"2025-10-01": {"budgeted": 900.0, "spent": 300.0}}
            }]"#,
        ).await;
        mock_recurring(&mut server, r#"{"recurring_expenses":[]}"#).await;

        let aggregator = Aggregator::new(api_for(&server));
        let records = aggregator
            .budget_progress(window(), today(), &Preferences::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Essentials");
    }

    #[tokio::test]
    async fn test_recurring_fold_escalates_status() {
        let mut server = mockito::Server::new_async().await;
        mock_budgets(&mut server, &format!("[{}]", GROCERIES)).await;
        // 250 pending on top of 180 spent blows the 400 budget
        mock_recurring(
            &mut server,
            r#"{"recurring_expenses":[{
                "id": 31,
                "payee": "Meal Kit",
                "amount": 250.0,
                "cadence": "monthly",
                "billing_date": "2025-10-20",
                "category_id": 12
            }]}"#,
        ).await;
        mock_transactions(
            &mut server,
            "start_date=2025-10-01&end_date=2025-10-31&limit=500&offset=0",
            r#"{"transactions":[]}"#,
        ).await;

        let aggregator = Aggregator::new(api_for(&server));
        let records = aggregator
            .budget_progress(window(), today(), &Preferences::default())
            .await
            .unwrap();

        let record = &records[0];
        assert_eq!(record.recurring_total, 250.0);
        assert_eq!(record.status, crate::models::BudgetStatus::Over);
        assert!((record.remaining - (400.0 - 180.0 - 250.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_recurring_already_posted_is_not_counted() {
        let mut server = mockito::Server::new_async().await;
        mock_budgets(&mut server, &format!("[{}]", GROCERIES)).await;
        mock_recurring(
            &mut server,
            r#"{"recurring_expenses":[{
                "id": 31,
                "payee": "Meal Kit",
                "amount": 250.0,
                "cadence": "monthly",
                "billing_date": "2025-10-20",
                "category_id": 12
            }]}"#,
        ).await;
        // The recurring charge already posted as a transaction
        mock_transactions(
            &mut server,
            "start_date=2025-10-01&end_date=2025-10-31&limit=500&offset=0",
            r#"{"transactions":[
                {"id": 900, "date": "2025-10-08", "amount": 250.0, "category_id": 12, "recurring_id": 31}
            ]}"#,
        ).await;

        let aggregator = Aggregator::new(api_for(&server));
        let records = aggregator
            .budget_progress(window(), today(), &Preferences::default())
            .await
            .unwrap();

        assert_eq!(records[0].recurring_total, 0.0);
        assert_eq!(records[0].status, crate::models::BudgetStatus::OnTrack);
    }

    #[tokio::test]
    async fn test_summary_fetch_failure_fails_the_pass() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/budgets?start_date=2025-10-01&end_date=2025-10-31")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let aggregator = Aggregator::new(api_for(&server));
        let result = aggregator
            .budget_progress(window(), today(), &Preferences::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_summary_progress_filters_and_classifies() {
        let mut server = mockito::Server::new_async().await;
        mock_budgets(
            &mut server,
            r#"[
                {
                    "category_id": 12,
                    "category_name": "Groceries",
                    "data": {"2025-10-01": {"budgeted": 100.0, "spent": 95.0}}
                },
                {
                    "category_id": 20,
                    "category_name": "Salary",
                    "is_income": true,
                    "data": {"2025-10-01": {"budgeted": 5000.0, "spent": -2000.0}}
                },
                {
                    "category_id": 90,
                    "category_name": "Essentials",
                    "is_group": true,
                    "data": {"2025-10-01": {"budgeted": 900.0, "spent": 300.0}}
                },
                {
                    "category_id": 13,
                    "category_name": "Reimbursed",
                    "exclude_from_budget": true,
                    "data": {"2025-10-01": {"budgeted": 100.0, "spent": 99.0}}
                }
            ]"#,
        ).await;

        let aggregator = Aggregator::new(api_for(&server));
        let records = aggregator
            .summary_progress(window(), today(), &Preferences::default())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Groceries");
        assert_eq!(records[0].status, crate::models::BudgetStatus::AtRisk);
    }
}
