//! Monthly goal operations

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{parse_datetime, parse_enum, Ledger};
use crate::error::{Error, Result};
use crate::models::{
    from_cents, to_cents, Goal, GoalProgress, GoalType, NewGoal, ReportPeriod, TransactionType,
    MAX_AMOUNT_CENTS,
};

const GOAL_SELECT: &str = "SELECT g.id, g.household_id, g.goal_type, g.category_id, c.name,
        g.amount_cents, g.month, g.year, g.created_at, g.updated_at
    FROM goals g
    LEFT JOIN categories c ON c.id = g.category_id";

fn row_to_goal(row: &rusqlite::Row) -> rusqlite::Result<Goal> {
    let goal_type: String = row.get(2)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    Ok(Goal {
        id: row.get(0)?,
        household_id: row.get(1)?,
        goal_type: parse_enum(2, &goal_type)?,
        category_id: row.get(3)?,
        category_name: row.get(4)?,
        amount: from_cents(row.get(5)?),
        month: row.get(6)?,
        year: row.get(7)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

/// Progress of one goal given its month's paid totals (in cents)
fn progress_for(goal: Goal, current_cents: i64) -> GoalProgress {
    let target_cents = to_cents(goal.amount);
    let percent = if target_cents > 0 {
        current_cents as f64 / target_cents as f64 * 100.0
    } else {
        0.0
    };
    let remaining = from_cents(target_cents - current_cents);

    let (over_limit, reached) = match goal.goal_type {
        GoalType::SavingsTarget => (false, current_cents >= target_cents),
        GoalType::SpendingCap | GoalType::CategoryCap => (current_cents > target_cents, false),
    };

    GoalProgress {
        goal,
        current: from_cents(current_cents),
        percent: (percent * 10.0).round() / 10.0,
        remaining,
        over_limit,
        reached,
    }
}

impl Ledger<'_> {
    /// Define a goal, replacing the amount of an existing goal with the same key
    ///
    /// The key is (type, category-or-none, month, year). Only category caps
    /// carry a category, and it must be an expense category of the household.
    pub fn upsert_goal(&self, goal: &NewGoal) -> Result<Goal> {
        let amount_cents = to_cents(goal.amount);
        if amount_cents <= 0 {
            return Err(Error::Validation(
                "Goal amount must be greater than zero".to_string(),
            ));
        }
        if amount_cents > MAX_AMOUNT_CENTS {
            return Err(Error::Validation(format!(
                "Goal amount must not exceed {}",
                from_cents(MAX_AMOUNT_CENTS)
            )));
        }
        if ReportPeriod::month(goal.year, goal.month).is_none() {
            return Err(Error::Validation(format!(
                "Invalid goal period {}-{:02}",
                goal.year, goal.month
            )));
        }

        let category_id = match goal.goal_type {
            GoalType::CategoryCap => {
                let id = goal.category_id.ok_or_else(|| {
                    Error::Validation("A category cap needs a category".to_string())
                })?;
                let category = self
                    .get_category(id)?
                    .ok_or_else(|| Error::Validation(format!("Unknown category {}", id)))?;
                if category.kind != TransactionType::Expense {
                    return Err(Error::Validation(format!(
                        "'{}' is not an expense category",
                        category.name
                    )));
                }
                Some(id)
            }
            GoalType::SpendingCap | GoalType::SavingsTarget => None,
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM goals
                 WHERE household_id = ? AND goal_type = ? AND IFNULL(category_id, 0) = IFNULL(?, 0)
                   AND month = ? AND year = ?",
                params![
                    self.household_id,
                    goal.goal_type.as_str(),
                    category_id,
                    goal.month,
                    goal.year
                ],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE goals SET amount_cents = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                    params![amount_cents, id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO goals (household_id, goal_type, category_id, amount_cents, month, year)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        self.household_id,
                        goal.goal_type.as_str(),
                        category_id,
                        amount_cents,
                        goal.month,
                        goal.year
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };
        tx.commit()?;

        info!(
            goal_id = id,
            goal_type = %goal.goal_type,
            replaced = existing.is_some(),
            "Goal saved"
        );
        self.get_goal(id)?
            .ok_or_else(|| Error::NotFound(format!("Goal {}", id)))
    }

    /// Get a goal by ID
    pub fn get_goal(&self, id: i64) -> Result<Option<Goal>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE g.id = ? AND g.household_id = ?", GOAL_SELECT);
        Ok(conn
            .query_row(&sql, params![id, self.household_id], row_to_goal)
            .optional()?)
    }

    /// Goals defined for a month
    pub fn list_goals(&self, month: u32, year: i32) -> Result<Vec<Goal>> {
        let conn = self.conn()?;
        let sql = format!(
            "{} WHERE g.household_id = ? AND g.month = ? AND g.year = ?
             ORDER BY g.goal_type, c.name",
            GOAL_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let goals = stmt
            .query_map(params![self.household_id, month, year], row_to_goal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    /// Progress of every goal of a month
    pub fn goal_progress(&self, month: u32, year: i32) -> Result<Vec<GoalProgress>> {
        let period = ReportPeriod::month(year, month).ok_or_else(|| {
            Error::Validation(format!("Invalid goal period {}-{:02}", year, month))
        })?;

        let overall = self.paid_totals(period, None)?;
        let mut progress = Vec::new();
        for goal in self.list_goals(month, year)? {
            let current_cents = match (goal.goal_type, goal.category_id) {
                (GoalType::SavingsTarget, _) => overall.balance_cents(),
                (GoalType::CategoryCap, Some(category_id)) => {
                    self.paid_totals(period, Some(category_id))?.expense_cents
                }
                _ => overall.expense_cents,
            };
            progress.push(progress_for(goal, current_cents));
        }
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn goal(goal_type: GoalType, amount: f64) -> Goal {
        Goal {
            id: 1,
            household_id: 1,
            goal_type,
            category_id: None,
            category_name: None,
            amount,
            month: 5,
            year: 2024,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cap_over_limit() {
        let p = progress_for(goal(GoalType::SpendingCap, 1000.0), 125_000);
        assert!(p.over_limit);
        assert!(!p.reached);
        assert_eq!(p.percent, 125.0);
        assert_eq!(p.remaining, -250.0);
    }

    #[test]
    fn test_savings_reached_not_over() {
        let p = progress_for(goal(GoalType::SavingsTarget, 500.0), 60_000);
        assert!(p.reached);
        assert!(!p.over_limit);
    }

    #[test]
    fn test_cap_on_track() {
        let p = progress_for(goal(GoalType::CategoryCap, 400.0), 10_000);
        assert!(!p.over_limit);
        assert_eq!(p.percent, 25.0);
        assert_eq!(p.remaining, 300.0);
    }
}
