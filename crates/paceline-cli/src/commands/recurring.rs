//! Projected recurring charges for a month

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use tracing::warn;

use paceline_core::projector::project_expense;
use paceline_core::{BudgetApi, CacheGateway, RecurringInstance};

use super::{load_config, open_db, resolve_window, today};

pub async fn cmd_recurring(db_path: &Path, period: Option<&str>) -> Result<()> {
    let db = open_db(db_path)?;
    let config = load_config(&db)?;
    let today = today();
    let window = resolve_window(period, today)?;

    let api = BudgetApi::from_config(CacheGateway::new(db.clone()), &config);
    let expenses = api.recurring_expenses(window.start).await?;

    // Category names are cosmetic here; a failed lookup only drops them
    let category_names: HashMap<i64, String> = match api.categories().await {
        Ok(categories) => categories.into_iter().map(|c| (c.id, c.name)).collect(),
        Err(err) => {
            warn!(error = %err, "Category fetch failed, listing without category names");
            HashMap::new()
        }
    };

    let mut instances: Vec<RecurringInstance> = expenses
        .iter()
        .filter_map(|e| project_expense(e, window, today))
        .collect();
    instances.sort_by_key(|i| (i.occurs_on, i.expense.payee.clone()));

    println!();
    println!(
        "🔁 Recurring charges in {}",
        window.period_key().get(..7).unwrap_or("")
    );
    println!("   ─────────────────────────────────────────────────────────────");

    if instances.is_empty() {
        println!("   Nothing pending in this window.");
        println!();
        return Ok(());
    }

    let fallback = config.preferences.currency.clone();
    let mut total = 0.0;
    for instance in &instances {
        let expense = &instance.expense;
        let currency = expense.currency.as_deref().unwrap_or(&fallback);
        let category = expense
            .category_id
            .and_then(|id| category_names.get(&id))
            .map(|name| format!("  [{}]", name))
            .unwrap_or_default();
        println!(
            "   {}  {:<28} {:>10.2} {}{}",
            instance.occurs_on, expense.payee, expense.amount, currency, category
        );
        total += expense.amount.abs();
    }

    println!();
    println!("   Total still due: {:.2} {}", total, fallback);
    println!();
    Ok(())
}
