//! Configuration commands

use std::path::Path;

use anyhow::{bail, Result};

use crate::cli::ConfigAction;

use super::open_db;

pub fn cmd_config(db_path: &Path, action: ConfigAction) -> Result<()> {
    let db = open_db(db_path)?;
    let mut config = db.load_config()?;

    match action {
        ConfigAction::Show => {
            println!();
            println!("⚙️  Paceline configuration");
            println!("   ─────────────────────────────────────────────────────────────");
            match &config.api_key {
                Some(_) => println!("   API key: set (***)"),
                None => println!("   API key: not set (run 'paceline config set-key')"),
            }
            println!("   API URL: {}", config.api_base_url);
            println!("   Currency: {}", config.preferences.currency);
            println!("   Warn at: {:.0}%", config.preferences.warn_at_ratio * 100.0);
            println!(
                "   Notifications: {}",
                if config.preferences.notifications_enabled {
                    "on"
                } else {
                    "off"
                }
            );
            if config.preferences.hidden_category_ids.is_empty() {
                println!("   Hidden categories: none");
            } else {
                let ids: Vec<String> = config
                    .preferences
                    .hidden_category_ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect();
                println!("   Hidden categories: {}", ids.join(", "));
            }
            println!();
            return Ok(());
        }
        ConfigAction::SetKey { key } => {
            config.api_key = Some(key);
            println!("✅ API key stored");
        }
        ConfigAction::SetUrl { url } => {
            config.api_base_url = url.trim_end_matches('/').to_string();
            println!("✅ API URL set to {}", config.api_base_url);
        }
        ConfigAction::SetCurrency { currency } => {
            config.preferences.currency = currency.to_uppercase();
            println!("✅ Fallback currency set to {}", config.preferences.currency);
        }
        ConfigAction::SetWarnAt { ratio } => {
            if !(0.0..=1.0).contains(&ratio) {
                bail!("Warn ratio must be between 0 and 1, got {}", ratio);
            }
            config.preferences.warn_at_ratio = ratio;
            println!("✅ Warning at {:.0}% of budget", ratio * 100.0);
        }
        ConfigAction::Notifications { state } => match state.as_str() {
            "on" => {
                config.preferences.notifications_enabled = true;
                println!("✅ Notifications enabled");
            }
            "off" => {
                config.preferences.notifications_enabled = false;
                println!("✅ Notifications disabled");
            }
            other => bail!("Expected 'on' or 'off', got '{}'", other),
        },
        ConfigAction::Hide { category_id } => {
            if !config.preferences.hidden_category_ids.contains(&category_id) {
                config.preferences.hidden_category_ids.push(category_id);
            }
            println!("✅ Category {} hidden from alerts", category_id);
        }
        ConfigAction::Unhide { category_id } => {
            config.preferences.hidden_category_ids.retain(|id| *id != category_id);
            println!("✅ Category {} unhidden", category_id);
        }
    }

    db.save_config(&config)?;
    Ok(())
}
