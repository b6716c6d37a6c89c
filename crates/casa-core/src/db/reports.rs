//! Period summaries, dashboard and trailing overview
//!
//! Only `paid` transactions count; pending drafts and cancelled entries are
//! left out of every total here.

use chrono::{Datelike, Months, NaiveDate};
use rusqlite::params;

use super::{parse_enum, Ledger};
use crate::error::{Error, Result};
use crate::models::*;

/// How many expense categories a period summary lists
pub const TOP_CATEGORY_COUNT: usize = 5;

/// How many expense categories the dashboard lists
const DASHBOARD_CATEGORY_COUNT: usize = 10;

/// How many recent transactions the dashboard lists
const DASHBOARD_RECENT_COUNT: i64 = 10;

/// Paid income and expense for a period, in cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaidTotals {
    pub income_cents: i64,
    pub expense_cents: i64,
}

impl PaidTotals {
    pub fn balance_cents(&self) -> i64 {
        self.income_cents - self.expense_cents
    }
}

impl Ledger<'_> {
    /// Paid totals per category for a period, largest first
    pub fn category_totals(&self, period: ReportPeriod) -> Result<Vec<CategoryTotal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.name, c.color, t.kind, SUM(t.amount_cents), COUNT(*)
             FROM transactions t
             JOIN categories c ON c.id = t.category_id
             WHERE t.household_id = ? AND t.status = 'paid' AND t.date BETWEEN ? AND ?
             GROUP BY c.id
             ORDER BY SUM(t.amount_cents) DESC, c.name",
        )?;
        let totals = stmt
            .query_map(
                params![
                    self.household_id,
                    period.from.to_string(),
                    period.to.to_string()
                ],
                |row| {
                    let kind: String = row.get(2)?;
                    Ok(CategoryTotal {
                        category: row.get(0)?,
                        color: row.get(1)?,
                        kind: parse_enum(2, &kind)?,
                        total: from_cents(row.get(3)?),
                        count: row.get(4)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(totals)
    }

    /// Paid income and expense for a period, optionally for one category
    pub fn paid_totals(&self, period: ReportPeriod, category_id: Option<i64>) -> Result<PaidTotals> {
        let conn = self.conn()?;
        let (income_cents, expense_cents) = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN kind = 'income' THEN amount_cents END), 0),
                COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount_cents END), 0)
             FROM transactions
             WHERE household_id = ?1 AND status = 'paid' AND date BETWEEN ?2 AND ?3
               AND (?4 IS NULL OR category_id = ?4)",
            params![
                self.household_id,
                period.from.to_string(),
                period.to.to_string(),
                category_id
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(PaidTotals {
            income_cents,
            expense_cents,
        })
    }

    /// Summarize a period, optionally narrowed to a category substring and a type
    pub fn period_summary(
        &self,
        period: ReportPeriod,
        category: Option<&str>,
        kind: Option<TransactionType>,
    ) -> Result<PeriodSummary> {
        if period.from > period.to {
            return Err(Error::Validation(format!(
                "Report start {} is after end {}",
                period.from, period.to
            )));
        }

        let needle = category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        let rows: Vec<CategoryTotal> = self
            .category_totals(period)?
            .into_iter()
            .filter(|c| kind.map_or(true, |k| c.kind == k))
            .filter(|c| {
                needle
                    .as_deref()
                    .map_or(true, |n| c.category.to_lowercase().contains(n))
            })
            .collect();

        let sum = |k: TransactionType| -> (i64, i64) {
            rows.iter()
                .filter(|c| c.kind == k)
                .fold((0, 0), |(cents, count), c| {
                    (cents + to_cents(c.total), count + c.count)
                })
        };
        let (income_cents, income_count) = sum(TransactionType::Income);
        let (expense_cents, expense_count) = sum(TransactionType::Expense);

        let top_expense_categories = rows
            .iter()
            .filter(|c| c.kind == TransactionType::Expense)
            .take(TOP_CATEGORY_COUNT)
            .cloned()
            .collect();

        Ok(PeriodSummary {
            period,
            income_total: from_cents(income_cents),
            income_count,
            expense_total: from_cents(expense_cents),
            expense_count,
            balance: from_cents(income_cents - expense_cents),
            top_expense_categories,
        })
    }

    /// Landing page figures for the household
    pub fn dashboard(&self, today: NaiveDate) -> Result<Dashboard> {
        let household = self
            .db
            .get_household(self.household_id)?
            .ok_or_else(|| Error::NotFound(format!("Household {}", self.household_id)))?;

        let accounts = self.list_accounts()?;
        let total_balance_cents: i64 = accounts.iter().map(|a| to_cents(a.current_balance)).sum();

        let conn = self.conn()?;
        let (income_cents, expense_cents): (i64, i64) = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN kind = 'income' THEN amount_cents END), 0),
                COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount_cents END), 0)
             FROM transactions WHERE household_id = ? AND status = 'paid'",
            [self.household_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        drop(conn);

        let month = ReportPeriod::month_of(today);
        let month_totals = self.paid_totals(month, None)?;

        let month_expense_categories = self
            .category_totals(month)?
            .into_iter()
            .filter(|c| c.kind == TransactionType::Expense)
            .take(DASHBOARD_CATEGORY_COUNT)
            .collect();

        Ok(Dashboard {
            household,
            total_balance: from_cents(total_balance_cents),
            income_total: from_cents(income_cents),
            expense_total: from_cents(expense_cents),
            month_income: from_cents(month_totals.income_cents),
            month_expense: from_cents(month_totals.expense_cents),
            month_balance: from_cents(month_totals.balance_cents()),
            recent_transactions: self.recent_transactions(DASHBOARD_RECENT_COUNT)?,
            accounts: accounts
                .into_iter()
                .filter(|a| a.active)
                .map(|a| AccountBalance {
                    id: a.id,
                    name: a.name,
                    color: a.color,
                    balance: a.current_balance,
                })
                .collect(),
            month_expense_categories,
        })
    }

    /// Trailing twelve months ending with the month of `today`
    pub fn overview(&self, today: NaiveDate) -> Result<Overview> {
        let current = ReportPeriod::month_of(today);
        let first_month = current
            .from
            .checked_sub_months(Months::new(11))
            .ok_or_else(|| Error::InvalidData(format!("Cannot go back a year from {}", today)))?;
        let period = ReportPeriod {
            from: first_month,
            to: current.to,
        };

        let by_category = self.category_totals(period)?;
        let (expense_by_category, income_by_category): (Vec<_>, Vec<_>) = by_category
            .into_iter()
            .partition(|c| c.kind == TransactionType::Expense);

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT a.name, SUM(t.amount_cents)
             FROM transactions t
             JOIN accounts a ON a.id = t.account_id
             WHERE t.household_id = ? AND t.status = 'paid' AND t.kind = 'expense'
               AND t.date BETWEEN ? AND ?
             GROUP BY a.id
             ORDER BY SUM(t.amount_cents) DESC, a.name",
        )?;
        let expense_by_account = stmt
            .query_map(
                params![
                    self.household_id,
                    period.from.to_string(),
                    period.to.to_string()
                ],
                |row| {
                    Ok(NamedTotal {
                        name: row.get(0)?,
                        total: from_cents(row.get(1)?),
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        let monthly = (0..12)
            .map(|offset| {
                let start = first_month
                    .checked_add_months(Months::new(offset))
                    .and_then(|d| ReportPeriod::month(d.year(), d.month()))
                    .ok_or_else(|| Error::InvalidData(format!("Invalid month after {}", first_month)))?;
                let totals = self.paid_totals(start, None)?;
                Ok(MonthlyTotals {
                    month: start.from,
                    income: from_cents(totals.income_cents),
                    expense: from_cents(totals.expense_cents),
                    balance: from_cents(totals.balance_cents()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Overview {
            period,
            expense_by_category,
            income_by_category,
            expense_by_account,
            monthly,
        })
    }
}
