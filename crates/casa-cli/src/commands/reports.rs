//! Report command implementations

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};

use casa_core::chat::reports::{progress_line, resolve_period, summary_text};
use casa_core::config::ChatConfig;
use casa_core::db::Database;
use casa_core::intent::{PeriodRequest, ReportQuery};

use super::household_member;

/// Parse an optional `YYYY-MM-DD` argument
pub fn parse_date_arg(value: Option<&str>, flag: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .with_context(|| format!("Invalid --{} date '{}' (use YYYY-MM-DD)", flag, s))
        })
        .transpose()
}

/// Period summary, worded the way the chat assistant answers it
pub fn cmd_report(
    db: &Database,
    config: &ChatConfig,
    email: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let (_, household_id) = household_member(db, email)?;
    let start_date = parse_date_arg(from, "from")?;
    let end_date = parse_date_arg(to, "to")?;

    let query = ReportQuery {
        period: (start_date.is_some() || end_date.is_some()).then_some(PeriodRequest {
            start_date,
            end_date,
        }),
        ..ReportQuery::default()
    };
    let today = config.today();
    let period = resolve_period(&query, today);

    let ledger = db.ledger(household_id);
    let summary = ledger.period_summary(period, None, None)?;

    println!();
    println!("📊 {} → {}", period.from, period.to);
    println!("   ─────────────────────────────");
    for line in summary_text(&summary, &query).lines() {
        println!("   {}", line);
    }

    let goals = ledger.goal_progress(today.month(), today.year())?;
    if !goals.is_empty() {
        println!();
        println!("🎯 Metas do mês");
        for progress in &goals {
            println!("   {}", progress_line(progress));
        }
    }

    Ok(())
}
