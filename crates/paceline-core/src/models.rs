//! Domain models for Paceline

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Classification of a category's spending against its budget and pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetStatus {
    Over,
    AtRisk,
    OnTrack,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Over => "over",
            Self::AtRisk => "at-risk",
            Self::OnTrack => "on-track",
        }
    }

    /// Whether this status warrants an alert
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Over | Self::AtRisk)
    }
}

impl std::str::FromStr for BudgetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "over" => Ok(Self::Over),
            "at-risk" | "at_risk" => Ok(Self::AtRisk),
            "on-track" | "on_track" => Ok(Self::OnTrack),
            _ => Err(format!("Unknown budget status: {}", s)),
        }
    }
}

impl std::fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category metadata from `GET /categories`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub is_income: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub exclude_from_budget: bool,
    #[serde(default)]
    pub exclude_from_totals: bool,
}

/// Per-period totals inside a category summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodTotals {
    /// Budgeted amount for the period; None or <= 0 means no budget set
    #[serde(default)]
    pub budgeted: Option<f64>,
    /// Signed spend for the period (positive = money leaving the account)
    #[serde(default)]
    pub spent: f64,
    #[serde(default)]
    pub num_transactions: i64,
    #[serde(default)]
    pub is_automated: bool,
}

/// Budget configuration attached to a category by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default)]
    pub cadence: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// A per-category budget summary from `GET /budgets`
///
/// Read-only to the core; produced by the Budget API. The `data` map is keyed
/// by period key (the ISO start date of the reporting window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    /// None for the synthetic "uncategorized" bucket
    pub category_id: Option<i64>,
    pub category_name: String,
    #[serde(default)]
    pub category_group_name: Option<String>,
    #[serde(default)]
    pub is_income: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub exclude_from_budget: bool,
    #[serde(default)]
    pub exclude_from_totals: bool,
    #[serde(default)]
    pub data: BTreeMap<String, PeriodTotals>,
    /// Optional hint of recurring activity already known to the API
    #[serde(default)]
    pub recurring_total: Option<f64>,
    #[serde(default)]
    pub config: Option<BudgetConfig>,
}

impl CategorySummary {
    /// Totals for a given period key, defaulting to zeros when absent
    pub fn totals_for(&self, period_key: &str) -> PeriodTotals {
        self.data.get(period_key).cloned().unwrap_or_default()
    }

    /// Whether this summary is the raw uncategorized bucket
    ///
    /// True when the category id is null, or the name is exactly
    /// "uncategorized"/"uncategorised" without an income/expense qualifier.
    pub fn is_uncategorized(&self) -> bool {
        if self.category_id.is_none() {
            return true;
        }
        let normalized = self.category_name.trim().to_lowercase();
        normalized == "uncategorized" || normalized == "uncategorised"
    }

    /// Currency for this category, falling back to the given default
    pub fn currency_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.config
            .as_ref()
            .and_then(|c| c.currency.as_deref())
            .unwrap_or(fallback)
    }
}

/// A recurring expense snapshot from `GET /recurring_expenses`
///
/// Immutable per fetch. The various optional dates feed the occurrence
/// projector's anchor priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringExpense {
    pub id: i64,
    pub payee: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Positive magnitude of each occurrence
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    /// Free-text cadence, e.g. "monthly", "every 2 weeks"
    #[serde(default)]
    pub cadence: Option<String>,
    #[serde(default)]
    pub next_occurrence: Option<NaiveDate>,
    #[serde(default)]
    pub billing_date: Option<NaiveDate>,
    #[serde(default)]
    pub anchor_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

impl RecurringExpense {
    /// First known date to project from: explicit next occurrence, then
    /// billing date, then anchor date, then start date
    pub fn projection_anchor(&self) -> Option<NaiveDate> {
        self.next_occurrence
            .or(self.billing_date)
            .or(self.anchor_date)
            .or(self.start_date)
    }
}

/// A projected occurrence of a recurring expense
///
/// Derived and ephemeral; recomputed on every aggregation pass.
#[derive(Debug, Clone, Serialize)]
pub struct RecurringInstance {
    pub expense: RecurringExpense,
    pub occurs_on: NaiveDate,
}

/// A transaction from `GET /transactions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    /// Signed amount; positive = money leaving the account
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payee: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    /// Set when the transaction was posted by a known recurring expense
    #[serde(default)]
    pub recurring_id: Option<i64>,
}

/// Per-category budget progress, the primary output of an aggregation pass
///
/// Created fresh each pass and replaced wholesale; `status` is always derived
/// by the classifier, never set directly.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetProgress {
    pub category_id: Option<i64>,
    pub name: String,
    pub group_name: Option<String>,
    pub is_income: bool,
    pub budgeted: f64,
    pub currency: String,
    /// Signed total for the period (income stays negative for display)
    pub spent: f64,
    pub remaining: f64,
    pub num_transactions: i64,
    pub is_automated: bool,
    /// Projected recurring amounts not yet represented by a transaction
    pub recurring_total: f64,
    pub status: BudgetStatus,
    /// 0..1 clamp of consumed/budgeted
    pub progress_ratio: f64,
}

impl BudgetProgress {
    /// Stable identity token used in alert signatures
    pub fn signature_id(&self) -> String {
        match self.category_id {
            Some(id) => id.to_string(),
            None => self.name.clone(),
        }
    }
}

/// An inclusive `[start, end]` date range over which budgets are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The calendar month containing `today`
    pub fn current_month(today: NaiveDate) -> Self {
        let start = today.with_day(1).unwrap_or(today);
        let end = Self::last_day_of_month(today.year(), today.month());
        Self { start, end }
    }

    /// Parse a "YYYY-MM" period into its calendar-month window
    pub fn from_period(period: &str) -> Option<Self> {
        let first = NaiveDate::parse_from_str(&format!("{}-01", period), "%Y-%m-%d").ok()?;
        Some(Self {
            start: first,
            end: Self::last_day_of_month(first.year(), first.month()),
        })
    }

    fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        next.map(|d| d - Duration::days(1))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Key under which the API reports this window's totals
    pub fn period_key(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// Fraction of the window that has passed as of `today`, clamped to 0..1
    ///
    /// Day-granular and inclusive: on the last day of the window the whole
    /// period counts as elapsed.
    pub fn elapsed_fraction(&self, today: NaiveDate) -> f64 {
        if today < self.start {
            return 0.0;
        }
        if today >= self.end {
            return 1.0;
        }
        let total = (self.end - self.start).num_days() + 1;
        let elapsed = (today - self.start).num_days() + 1;
        (elapsed as f64 / total as f64).clamp(0.0, 1.0)
    }
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_warn_at_ratio() -> f64 {
    crate::classify::DEFAULT_WARN_RATIO
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_api_base_url() -> String {
    "https://budget.paceline.dev/v1".to_string()
}

/// User preferences shared by both execution contexts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub hidden_category_ids: Vec<i64>,
    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,
    #[serde(default = "default_warn_at_ratio")]
    pub warn_at_ratio: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            hidden_category_ids: vec![],
            notifications_enabled: true,
            warn_at_ratio: default_warn_at_ratio(),
            currency: default_currency(),
        }
    }
}

impl Preferences {
    pub fn is_hidden(&self, category_id: Option<i64>) -> bool {
        category_id.is_some_and(|id| self.hidden_category_ids.contains(&id))
    }
}

/// Stored configuration; last-write-wins across contexts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub preferences: Preferences,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: default_api_base_url(),
            preferences: Preferences::default(),
        }
    }
}

impl Config {
    /// Overlay `PACELINE_API_KEY` / `PACELINE_API_URL` onto a config
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("PACELINE_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("PACELINE_API_URL") {
            if !url.is_empty() {
                self.api_base_url = url;
            }
        }
        self
    }
}

/// Background-context bookkeeping persisted across wakes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// Epoch millis of the last completed background pass
    #[serde(default)]
    pub last_run_ms: Option<i64>,
    /// Fingerprint of the most recently delivered alert set
    #[serde(default)]
    pub last_alert_signature: Option<String>,
}
