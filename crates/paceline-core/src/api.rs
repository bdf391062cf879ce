//! Budget API client
//!
//! Thin typed layer over the offline cache gateway for the four read
//! endpoints the core consumes: `/categories`, `/budgets`,
//! `/recurring_expenses`, and the paged `/transactions`. Authentication is a
//! bearer credential supplied by the host; this client never persists it.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::cache::{CacheGateway, ResponseSource, SYNTHETIC_TIMEOUT_BODY};
use crate::error::{Error, Result};
use crate::models::{Category, CategorySummary, Config, RecurringExpense, ReportingWindow, Transaction};

/// Transactions fetched per page
const DEFAULT_PAGE_LIMIT: usize = 500;

/// Bound on pagination; terminates even against a misbehaving upstream
const MAX_PAGES: usize = 40;

#[derive(Debug, Deserialize)]
struct CategoriesEnvelope {
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct RecurringEnvelope {
    recurring_expenses: Vec<RecurringExpense>,
}

#[derive(Debug, Deserialize)]
struct TransactionsEnvelope {
    transactions: Vec<Transaction>,
}

/// Typed client for the Budget API
#[derive(Clone)]
pub struct BudgetApi {
    gateway: CacheGateway,
    base_url: String,
    api_key: Option<String>,
    page_limit: usize,
}

impl BudgetApi {
    pub fn new(gateway: CacheGateway, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            gateway,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn from_config(gateway: CacheGateway, config: &Config) -> Self {
        Self::new(gateway, &config.api_base_url, config.api_key.clone())
    }

    /// Override the transaction page size (tests and tight hosts)
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let response = self.gateway.get(&url, self.api_key.as_deref()).await?;

        if response.is_success() {
            return Ok(serde_json::from_str(&response.body)?);
        }
        if response.source == ResponseSource::Synthetic {
            if response.body == SYNTHETIC_TIMEOUT_BODY {
                return Err(Error::Timeout(url));
            }
            return Err(Error::Offline(url));
        }
        Err(Error::Upstream {
            status: response.status,
            message: truncate_body(&response.body),
        })
    }

    /// `GET /categories` - category metadata
    pub async fn categories(&self) -> Result<Vec<Category>> {
        let envelope: CategoriesEnvelope = self.get_json("/categories").await?;
        Ok(envelope.categories)
    }

    /// `GET /budgets` - per-category summaries for a reporting window
    pub async fn budget_summaries(&self, window: ReportingWindow) -> Result<Vec<CategorySummary>> {
        self.get_json(&format!(
            "/budgets?start_date={}&end_date={}",
            window.start, window.end
        ))
        .await
    }

    /// `GET /recurring_expenses` - recurring expense snapshots
    pub async fn recurring_expenses(&self, start: NaiveDate) -> Result<Vec<RecurringExpense>> {
        let envelope: RecurringEnvelope = self
            .get_json(&format!("/recurring_expenses?start_date={}", start))
            .await?;
        Ok(envelope.recurring_expenses)
    }

    /// `GET /transactions` - full (paged) transaction list for a window,
    /// optionally restricted to one category
    pub async fn transactions(
        &self,
        category_id: Option<i64>,
        window: ReportingWindow,
    ) -> Result<Vec<Transaction>> {
        let mut all = Vec::new();
        let mut offset = 0usize;

        for _ in 0..MAX_PAGES {
            let mut path = format!(
                "/transactions?start_date={}&end_date={}&limit={}&offset={}",
                window.start, window.end, self.page_limit, offset
            );
            if let Some(id) = category_id {
                path.push_str(&format!("&category_id={}", id));
            }

            let envelope: TransactionsEnvelope = self.get_json(&path).await?;
            let count = envelope.transactions.len();
            all.extend(envelope.transactions);

            if count < self.page_limit {
                break;
            }
            offset += count;
        }

        Ok(all)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn api_for(server: &mockito::Server) -> BudgetApi {
        let gateway = CacheGateway::new(Database::in_memory().unwrap());
        BudgetApi::new(gateway, &server.url(), Some("token".to_string()))
    }

    fn window() -> ReportingWindow {
        ReportingWindow::from_period("2025-10").unwrap()
    }

    #[tokio::test]
    async fn test_budget_summaries_parse() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "GET",
                "/budgets?start_date=2025-10-01&end_date=2025-10-31",
            )
            .with_status(200)
            .with_body(
                r#"[{
                    "category_id": 12,
                    "category_name": "Groceries",
                    "is_income": false,
                    "data": {"2025-10-01": {"budgeted": 400.0, "spent": 120.5, "num_transactions": 9}}
                }]"#,
            )
            .create_async()
            .await;

        let api = api_for(&server);
        let summaries = api.budget_summaries(window()).await.unwrap();
        assert_eq!(summaries.len(), 1);
        let totals = summaries[0].totals_for("2025-10-01");
        assert_eq!(totals.budgeted, Some(400.0));
        assert_eq!(totals.num_transactions, 9);
    }

    #[tokio::test]
    async fn test_transactions_paginate_until_short_page() {
        let mut server = mockito::Server::new_async().await;
        let page = |ids: &[i64]| {
            let txns: Vec<String> = ids
                .iter()
                .map(|id| format!(r#"{{"id":{},"date":"2025-10-02","amount":5.0}}"#, id))
                .collect();
            format!(r#"{{"transactions":[{}]}}"#, txns.join(","))
        };

        server
            .mock(
                "GET",
                "/transactions?start_date=2025-10-01&end_date=2025-10-31&limit=2&offset=0&category_id=7",
            )
            .with_status(200)
            .with_body(page(&[1, 2]))
            .create_async()
            .await;
        server
            .mock(
                "GET",
                "/transactions?start_date=2025-10-01&end_date=2025-10-31&limit=2&offset=2&category_id=7",
            )
            .with_status(200)
            .with_body(page(&[3]))
            .create_async()
            .await;

        let api = api_for(&server).with_page_limit(2);
        let transactions = api.transactions(Some(7), window()).await.unwrap();
        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions[2].id, 3);
    }

    #[tokio::test]
    async fn test_upstream_error_maps_to_error_kind() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/categories")
            .with_status(401)
            .with_body(r#"{"error":"bad token"}"#)
            .create_async()
            .await;

        let api = api_for(&server);
        match api.categories().await {
            Err(Error::Upstream { status, .. }) => assert_eq!(status, 401),
            other => panic!("expected upstream error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_offline_without_cache_maps_to_offline_error() {
        let gateway = CacheGateway::new(Database::in_memory().unwrap());
        let api = BudgetApi::new(gateway, "http://127.0.0.1:9", Some("token".to_string()));
        match api.categories().await {
            Err(Error::Offline(_)) => {}
            other => panic!("expected offline error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/categories")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let api = api_for(&server);
        assert!(matches!(api.categories().await, Err(Error::Json(_))));
    }
}
