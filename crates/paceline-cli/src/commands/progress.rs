//! Budget progress table

use std::path::Path;

use anyhow::Result;

use paceline_core::models::{BudgetProgress, BudgetStatus};

use super::{aggregator_for, load_config, open_db, resolve_window, today};

pub async fn cmd_progress(
    db_path: &Path,
    period: Option<&str>,
    json: bool,
    all: bool,
) -> Result<()> {
    let db = open_db(db_path)?;
    let config = load_config(&db)?;
    let today = today();
    let window = resolve_window(period, today)?;

    let records = aggregator_for(&db, &config)
        .budget_progress(window, today, &config.preferences)
        .await?;

    let visible: Vec<&BudgetProgress> = records
        .iter()
        .filter(|r| all || !config.preferences.is_hidden(r.category_id))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&visible)?);
        return Ok(());
    }

    println!();
    println!(
        "📊 Budget progress for {} ({:.0}% of the month elapsed)",
        window.period_key().get(..7).unwrap_or(""),
        window.elapsed_fraction(today) * 100.0
    );
    println!("   ─────────────────────────────────────────────────────────────");

    if visible.is_empty() {
        println!("   No budgeted categories for this period.");
        println!();
        return Ok(());
    }

    for record in &visible {
        let marker = status_marker(record.status);
        let mut line = format!(
            "   {} {:<28} {:>10.2} / {:>10.2} {}",
            marker, record.name, record.spent, record.budgeted, record.currency
        );
        if record.recurring_total > 0.0 {
            line.push_str(&format!("  (+{:.2} recurring due)", record.recurring_total));
        }
        println!("{}", line);
    }

    let violations = visible.iter().filter(|r| r.status.is_violation()).count();
    println!();
    if violations > 0 {
        println!("   ⚠️  {} of {} categories need attention", violations, visible.len());
    } else {
        println!("   ✅ All {} categories on track", visible.len());
    }
    println!();
    Ok(())
}

fn status_marker(status: BudgetStatus) -> &'static str {
    match status {
        BudgetStatus::Over => "🔴",
        BudgetStatus::AtRisk => "🟡",
        BudgetStatus::OnTrack => "🟢",
    }
}
