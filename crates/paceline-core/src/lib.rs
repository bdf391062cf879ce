//! Paceline Core Library
//!
//! Shared functionality for the Paceline budget watchdog:
//! - Cadence parsing and recurring occurrence projection
//! - Budget status classification and pacing
//! - Per-category budget aggregation (full and summary passes)
//! - Offline-first response cache over the Budget API
//! - SQLite-backed config, sync state, and response storage

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod cadence;
pub mod classify;
pub mod db;
pub mod error;
pub mod models;
pub mod projector;

pub use aggregate::Aggregator;
pub use api::BudgetApi;
pub use cache::{CacheGateway, GatewayResponse, ResponseSource};
pub use cadence::CadenceStep;
pub use classify::{classify, classify_with_recurring, DEFAULT_WARN_RATIO};
pub use db::Database;
pub use error::{Error, Result};
pub use models::{
    BudgetProgress, BudgetStatus, Category, CategorySummary, Config, Preferences, PeriodTotals,
    RecurringExpense, RecurringInstance, ReportingWindow, SyncState, Transaction,
};
pub use projector::{next_occurrence, project_expense, MAX_PROJECTION_STEPS};
