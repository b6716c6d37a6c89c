//! Report and goal intents

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::replies::{format_brl, format_date, plural, transaction_preview};
use super::ChatResponse;
use crate::db::Ledger;
use crate::error::Result;
use crate::intent::{GoalRequest, ReportQuery, SummaryType};
use crate::models::{
    is_valid_amount, GoalProgress, GoalType, NewGoal, PeriodSummary, ReportPeriod,
    TransactionType,
};

/// Transactions listed for a `list_transactions` query
const LISTED_TRANSACTIONS: usize = 10;

/// Rows scanned when a listing is narrowed by category
const LISTING_SCAN: i64 = 200;

/// Date range of a query: explicit bounds, else the current month
pub fn resolve_period(query: &ReportQuery, today: NaiveDate) -> ReportPeriod {
    let bounds = query.period.as_ref().map(|p| (p.start_date, p.end_date));
    match bounds {
        Some((Some(a), Some(b))) => ReportPeriod {
            from: a.min(b),
            to: a.max(b),
        },
        Some((Some(from), None)) => ReportPeriod {
            from,
            to: today.max(from),
        },
        Some((None, Some(to))) => ReportPeriod {
            from: ReportPeriod::month_of(to).from,
            to,
        },
        _ => ReportPeriod::month_of(today),
    }
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value).replace('.', ",")
}

fn month_label(month: u32, year: i32) -> String {
    format!("{:02}/{}", month, year)
}

/// Multi-line summary text
pub fn summary_text(summary: &PeriodSummary, query: &ReportQuery) -> String {
    let mut lines = vec![format!(
        "📊 Resumo de {} a {}",
        format_date(summary.period.from),
        format_date(summary.period.to)
    )];
    if let Some(category) = &query.category {
        lines[0].push_str(&format!(" · categoria \"{}\"", category));
    }

    let show_income = query.kind != Some(TransactionType::Expense);
    let show_expense = query.kind != Some(TransactionType::Income);
    if show_income {
        lines.push(format!(
            "💰 Receitas: {} ({} {})",
            format_brl(summary.income_total),
            summary.income_count,
            plural(summary.income_count as usize, "lançamento", "lançamentos")
        ));
    }
    if show_expense {
        lines.push(format!(
            "💸 Despesas: {} ({} {})",
            format_brl(summary.expense_total),
            summary.expense_count,
            plural(summary.expense_count as usize, "lançamento", "lançamentos")
        ));
    }

    // A type filter balances only the side that was shown
    let balance = match (show_income, show_expense) {
        (true, true) => summary.balance,
        (true, false) => summary.income_total,
        _ => -summary.expense_total,
    };
    lines.push(if balance > 0.0 {
        format!("✅ Saldo positivo de {}.", format_brl(balance))
    } else if balance < 0.0 {
        format!("⚠️ Saldo negativo de {}.", format_brl(balance.abs()))
    } else {
        "⚖️ Receitas e despesas equilibradas.".to_string()
    });

    if show_income && show_expense {
        if let Some(ratio) = summary.expense_ratio() {
            lines.push(format!(
                "Suas despesas consumiram {} das receitas.",
                percent(ratio)
            ));
        }
    }

    if show_expense && !summary.top_expense_categories.is_empty() {
        lines.push("Principais categorias de despesa:".to_string());
        for c in &summary.top_expense_categories {
            lines.push(format!("• {}: {}", c.category, format_brl(c.total)));
        }
    }
    lines.join("\n")
}

/// Handle a `query_summary` intent
pub(super) fn query_summary(
    ledger: Ledger<'_>,
    today: NaiveDate,
    query: &ReportQuery,
    response: &mut ChatResponse,
) -> Result<()> {
    let period = resolve_period(query, today);
    debug!(from = %period.from, to = %period.to, "Building chat summary");

    let summary = ledger.period_summary(period, query.category.as_deref(), query.kind)?;
    let mut text = summary_text(&summary, query);

    if query.summary_type == Some(SummaryType::ListTransactions) {
        let needle = query.category.as_deref().map(str::to_lowercase);
        let filter = ledger
            .filter()
            .date_range(Some(period.from), Some(period.to))
            .kind(query.kind);
        let listed: Vec<_> = ledger
            .list_transactions(filter, LISTING_SCAN, 0)?
            .transactions
            .into_iter()
            .filter(|t| {
                needle
                    .as_deref()
                    .map_or(true, |n| t.category_name.to_lowercase().contains(n))
            })
            .take(LISTED_TRANSACTIONS)
            .collect();

        if listed.is_empty() {
            text.push_str("\n\nNenhum lançamento encontrado nesse período.");
        } else {
            text.push_str("\n\nLançamentos:");
            for t in &listed {
                text.push('\n');
                text.push_str(&transaction_preview(t));
            }
        }
    }

    response.report_generated = Some(true);
    response.assistant_message = text;
    Ok(())
}

fn goal_label(goal_type: GoalType, category: Option<&str>) -> String {
    match (goal_type, category) {
        (GoalType::SpendingCap, _) => "Limite de gastos".to_string(),
        (GoalType::SavingsTarget, _) => "Meta de economia".to_string(),
        (GoalType::CategoryCap, Some(name)) => format!("Limite para {}", name),
        (GoalType::CategoryCap, None) => "Limite por categoria".to_string(),
    }
}

/// One line of goal progress
pub fn progress_line(p: &GoalProgress) -> String {
    let label = goal_label(p.goal.goal_type, p.goal.category_name.as_deref());
    let figures = format!(
        "{} de {} ({})",
        format_brl(p.current),
        format_brl(p.goal.amount),
        percent(p.percent)
    );
    match p.goal.goal_type {
        GoalType::SavingsTarget if p.reached => {
            format!("🎉 {}: {} · meta atingida!", label, figures)
        }
        GoalType::SavingsTarget => format!(
            "💪 {}: {} · faltam {}",
            label,
            figures,
            format_brl(p.remaining)
        ),
        _ if p.over_limit => format!(
            "🚨 {}: {} · estourou em {}",
            label,
            figures,
            format_brl(-p.remaining)
        ),
        _ => format!(
            "✅ {}: {} · restam {}",
            label,
            figures,
            format_brl(p.remaining)
        ),
    }
}

fn goal_month(request: &GoalRequest, today: NaiveDate) -> (u32, i32) {
    (
        request.period.month.unwrap_or_else(|| today.month()),
        request.period.year.unwrap_or_else(|| today.year()),
    )
}

/// Handle a `set_goal` intent
pub(super) fn set_goal(
    ledger: Ledger<'_>,
    today: NaiveDate,
    request: &GoalRequest,
    response: &mut ChatResponse,
) -> Result<()> {
    if response.clarification_needed {
        return Ok(());
    }
    let Some(amount) = request.amount.filter(|a| is_valid_amount(*a)) else {
        response.clarification_needed = true;
        response.assistant_message = "Qual é o valor da meta?".to_string();
        return Ok(());
    };

    let goal_type = request.goal_type.unwrap_or(if request.category.is_some() {
        GoalType::CategoryCap
    } else {
        GoalType::SpendingCap
    });
    let category = match (goal_type, &request.category) {
        (GoalType::CategoryCap, Some(name)) => {
            Some(ledger.get_or_create_category(name, TransactionType::Expense)?)
        }
        (GoalType::CategoryCap, None) => {
            response.clarification_needed = true;
            response.assistant_message = "Para qual categoria é esse limite?".to_string();
            return Ok(());
        }
        _ => None,
    };

    let (month, year) = goal_month(request, today);
    let goal = ledger.upsert_goal(&NewGoal {
        goal_type,
        category_id: category.as_ref().map(|c| c.id),
        amount,
        month,
        year,
    })?;

    response.goal_set = Some(true);
    response.assistant_message = format!(
        "🎯 Meta definida: {} de {} para {}.",
        goal_label(goal.goal_type, goal.category_name.as_deref()).to_lowercase(),
        format_brl(goal.amount),
        month_label(goal.month, goal.year)
    );
    Ok(())
}

/// Handle a `check_goal` intent
pub(super) fn check_goal(
    ledger: Ledger<'_>,
    today: NaiveDate,
    request: &GoalRequest,
    response: &mut ChatResponse,
) -> Result<()> {
    let (month, year) = goal_month(request, today);
    let needle = request.category.as_deref().map(str::to_lowercase);
    let progress: Vec<GoalProgress> = ledger
        .goal_progress(month, year)?
        .into_iter()
        .filter(|p| request.goal_type.map_or(true, |t| p.goal.goal_type == t))
        .filter(|p| match (&needle, &p.goal.category_name) {
            (Some(n), Some(name)) => name.to_lowercase().contains(n.as_str()),
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect();

    response.goal_checked = Some(true);
    response.assistant_message = if progress.is_empty() {
        format!(
            "Você ainda não tem metas para {}. Que tal definir uma? \
             Ex: \"meu limite de gastos este mês é R$ 2.000\".",
            month_label(month, year)
        )
    } else {
        let mut lines = vec![format!("🎯 Metas de {}:", month_label(month, year))];
        lines.extend(progress.iter().map(progress_line));
        lines.join("\n")
    };
    Ok(())
}
