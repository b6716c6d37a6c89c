//! Account operations

use regex::Regex;
use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{parse_datetime, parse_enum, Ledger};
use crate::error::{Error, Result};
use crate::models::{
    from_cents, to_cents, Account, AccountKind, NewAccount, DEFAULT_ACCOUNT_COLOR,
};

const ACCOUNT_COLUMNS: &str = "a.id, a.household_id, a.name, a.kind, a.opening_balance_cents,
    a.color, a.active, a.created_at,
    a.opening_balance_cents + COALESCE((
        SELECT SUM(CASE WHEN t.kind = 'income' THEN t.amount_cents ELSE -t.amount_cents END)
        FROM transactions t
        WHERE t.account_id = a.id AND t.status != 'cancelled'
    ), 0)";

fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    let kind: String = row.get(3)?;
    let created_at: String = row.get(7)?;
    Ok(Account {
        id: row.get(0)?,
        household_id: row.get(1)?,
        name: row.get(2)?,
        kind: parse_enum(3, &kind)?,
        opening_balance: from_cents(row.get(4)?),
        color: row.get(5)?,
        active: row.get(6)?,
        created_at: parse_datetime(&created_at),
        current_balance: from_cents(row.get(8)?),
    })
}

/// Check a `#rrggbb` color tag
pub(super) fn validate_color(color: &str) -> Result<()> {
    let pattern = Regex::new(r"^#[0-9a-fA-F]{6}$")?;
    if pattern.is_match(color) {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid color: {}", color)))
    }
}

fn validate_account(account: &NewAccount) -> Result<()> {
    if account.name.trim().is_empty() {
        return Err(Error::Validation("Account name is required".to_string()));
    }
    if account.opening_balance < 0.0 {
        return Err(Error::Validation(
            "Opening balance cannot be negative".to_string(),
        ));
    }
    if let Some(color) = &account.color {
        validate_color(color)?;
    }
    Ok(())
}

impl Ledger<'_> {
    /// List accounts, active first, then by name
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM accounts a WHERE a.household_id = ?
             ORDER BY a.active DESC, a.name COLLATE NOCASE",
            ACCOUNT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let accounts = stmt
            .query_map([self.household_id], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Get an account by ID
    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM accounts a WHERE a.id = ? AND a.household_id = ?",
            ACCOUNT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![id, self.household_id], row_to_account)
            .optional()?)
    }

    /// Create an account
    pub fn create_account(&self, account: &NewAccount) -> Result<Account> {
        validate_account(account)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO accounts (household_id, name, kind, opening_balance_cents, color, active)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                self.household_id,
                account.name.trim(),
                account.kind.as_str(),
                to_cents(account.opening_balance),
                account.color.as_deref().unwrap_or(DEFAULT_ACCOUNT_COLOR),
                account.active.unwrap_or(true),
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(account_id = id, household_id = self.household_id, "Created account");

        self.get_account(id)?
            .ok_or_else(|| Error::NotFound(format!("Account {}", id)))
    }

    /// Update an account
    pub fn update_account(&self, id: i64, account: &NewAccount) -> Result<Account> {
        validate_account(account)?;

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE accounts
             SET name = ?, kind = ?, opening_balance_cents = ?,
                 color = COALESCE(?, color), active = COALESCE(?, active)
             WHERE id = ? AND household_id = ?",
            params![
                account.name.trim(),
                account.kind.as_str(),
                to_cents(account.opening_balance),
                account.color,
                account.active,
                id,
                self.household_id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Account {}", id)));
        }

        self.get_account(id)?
            .ok_or_else(|| Error::NotFound(format!("Account {}", id)))
    }

    /// Delete an account; fails with a conflict while transactions reference it
    pub fn delete_account(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let in_use: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ? AND household_id = ?",
            params![id, self.household_id],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(Error::Conflict(format!(
                "Account is used by {} transaction(s)",
                in_use
            )));
        }

        let changed = conn.execute(
            "DELETE FROM accounts WHERE id = ? AND household_id = ?",
            params![id, self.household_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Account {}", id)));
        }
        info!(account_id = id, "Deleted account");
        Ok(())
    }

    /// Find an account by name (case-insensitive), creating it if missing
    pub fn get_or_create_account(&self, name: &str) -> Result<Account> {
        let wanted = name.trim().to_lowercase();
        if let Some(existing) = self
            .list_accounts()?
            .into_iter()
            .find(|a| a.name.to_lowercase() == wanted)
        {
            return Ok(existing);
        }

        self.create_account(&NewAccount {
            name: name.trim().to_string(),
            kind: AccountKind::Checking,
            opening_balance: 0.0,
            color: None,
            active: None,
        })
    }
}
