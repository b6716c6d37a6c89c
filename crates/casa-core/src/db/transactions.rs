//! Transaction operations
//!
//! Every write copies the transaction type from its category, and checks that
//! the account, category, payer and split members belong to the household.

use chrono::{Duration, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use super::{parse_date, parse_datetime, parse_enum, Ledger, TransactionFilter};
use crate::error::{Error, Result};
use crate::models::{
    from_cents, to_cents, NewTransaction, TitleSuggestion, Transaction, TransactionCriteria,
    TransactionPatch, TransactionStatus, TransactionType, MAX_AMOUNT_CENTS,
};

/// Maximum number of rows an edit-by-criteria search returns
pub const CRITERIA_MATCH_LIMIT: usize = 10;

/// Maximum number of title suggestions
const SUGGESTION_LIMIT: i64 = 50;

const TRANSACTION_SELECT: &str = "SELECT t.id, t.household_id, t.account_id, a.name,
        t.category_id, c.name, t.kind, t.title, t.amount_cents, t.date, t.status, t.note,
        t.payer_id,
        (SELECT group_concat(s.member_id) FROM transaction_splits s WHERE s.transaction_id = t.id),
        t.recurrence, t.attachment, t.created_at, t.updated_at
    FROM transactions t
    JOIN accounts a ON a.id = t.account_id
    JOIN categories c ON c.id = t.category_id";

const TRANSACTION_ORDER: &str = "ORDER BY t.date DESC, t.created_at DESC, t.id DESC";

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let kind: String = row.get(6)?;
    let date: String = row.get(9)?;
    let status: String = row.get(10)?;
    let splits: Option<String> = row.get(13)?;
    let recurrence: Option<String> = row.get(14)?;
    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;

    let mut split_with: Vec<i64> = splits
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    split_with.sort_unstable();

    Ok(Transaction {
        id: row.get(0)?,
        household_id: row.get(1)?,
        account_id: row.get(2)?,
        account_name: row.get(3)?,
        category_id: row.get(4)?,
        category_name: row.get(5)?,
        kind: parse_enum(6, &kind)?,
        title: row.get(7)?,
        amount: from_cents(row.get(8)?),
        date: parse_date(9, &date)?,
        status: parse_enum(10, &status)?,
        note: row.get(11)?,
        payer_id: row.get(12)?,
        split_with,
        recurrence: recurrence.as_deref().map(|r| parse_enum(14, r)).transpose()?,
        attachment: row.get(15)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

/// How to look up a pending draft to promote
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DraftLookup {
    /// The draft the client says it is resolving
    Explicit(i64),
    /// Any draft with this amount and date
    AmountDate { amount: f64, date: NaiveDate },
}

/// One page of a filtered transaction listing
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub total_count: i64,
    /// Paid income over the whole filter, not just this page
    pub income_total: f64,
    /// Paid expenses over the whole filter, not just this page
    pub expense_total: f64,
    pub balance: f64,
}

/// Resolved, validated fields for a write
struct WriteFields {
    kind: TransactionType,
    amount_cents: i64,
}

fn window_modifier(window: Duration) -> String {
    format!("-{} seconds", window.num_seconds().max(0))
}

fn household_member(conn: &Connection, household_id: i64, member_id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM members WHERE id = ? AND household_id = ?)",
        params![member_id, household_id],
        |row| row.get(0),
    )?)
}

/// Validate references and copy the type from the category
#[allow(clippy::too_many_arguments)]
fn check_write(
    conn: &Connection,
    household_id: i64,
    account_id: i64,
    category_id: i64,
    title: &str,
    amount: f64,
    payer_id: Option<i64>,
    split_with: &[i64],
) -> Result<WriteFields> {
    if title.trim().is_empty() {
        return Err(Error::Validation("Title is required".to_string()));
    }

    let amount_cents = to_cents(amount);
    if amount_cents <= 0 {
        return Err(Error::Validation(
            "Amount must be greater than zero".to_string(),
        ));
    }
    if amount_cents > MAX_AMOUNT_CENTS {
        return Err(Error::Validation(format!(
            "Amount must not exceed {}",
            from_cents(MAX_AMOUNT_CENTS)
        )));
    }

    let account_ok: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE id = ? AND household_id = ?)",
        params![account_id, household_id],
        |row| row.get(0),
    )?;
    if !account_ok {
        return Err(Error::Validation(format!(
            "Account {} does not belong to this household",
            account_id
        )));
    }

    let kind: String = conn
        .query_row(
            "SELECT kind FROM categories WHERE id = ? AND household_id = ?",
            params![category_id, household_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| {
            Error::Validation(format!(
                "Category {} does not belong to this household",
                category_id
            ))
        })?;
    let kind: TransactionType = kind.parse().map_err(Error::InvalidData)?;

    if let Some(payer) = payer_id {
        if !household_member(conn, household_id, payer)? {
            return Err(Error::Validation(format!(
                "Member {} is not part of this household",
                payer
            )));
        }
    }
    for member in split_with {
        if !household_member(conn, household_id, *member)? {
            return Err(Error::Validation(format!(
                "Member {} is not part of this household",
                member
            )));
        }
    }

    Ok(WriteFields { kind, amount_cents })
}

fn replace_splits(
    conn: &Connection,
    transaction_id: i64,
    payer_id: Option<i64>,
    split_with: &[i64],
) -> Result<()> {
    conn.execute(
        "DELETE FROM transaction_splits WHERE transaction_id = ?",
        [transaction_id],
    )?;
    for member in split_with {
        if Some(*member) == payer_id {
            continue;
        }
        conn.execute(
            "INSERT OR IGNORE INTO transaction_splits (transaction_id, member_id) VALUES (?, ?)",
            params![transaction_id, member],
        )?;
    }
    Ok(())
}

/// Case-insensitive substring match, Unicode aware
fn contains_ci(haystack: &str, needle: &Option<String>) -> bool {
    match needle.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

impl Ledger<'_> {
    /// A filter bound to this household
    pub fn filter<'query>(&self) -> TransactionFilter<'query> {
        TransactionFilter::new(self.household_id)
    }

    /// Insert a transaction
    pub fn insert_transaction(&self, new: &NewTransaction) -> Result<Transaction> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let fields = check_write(
            &tx,
            self.household_id,
            new.account_id,
            new.category_id,
            &new.title,
            new.amount,
            new.payer_id,
            &new.split_with,
        )?;

        tx.execute(
            "INSERT INTO transactions
                (household_id, account_id, category_id, kind, title, amount_cents, date, status,
                 note, payer_id, recurrence, attachment)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                self.household_id,
                new.account_id,
                new.category_id,
                fields.kind.as_str(),
                new.title.trim(),
                fields.amount_cents,
                new.date.to_string(),
                new.status.as_str(),
                new.note,
                new.payer_id,
                new.recurrence.map(|r| r.as_str()),
                new.attachment,
            ],
        )?;
        let id = tx.last_insert_rowid();
        replace_splits(&tx, id, new.payer_id, &new.split_with)?;
        tx.commit()?;

        debug!(
            transaction_id = id,
            household_id = self.household_id,
            status = %new.status,
            "Inserted transaction"
        );
        self.get_transaction(id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE t.id = ? AND t.household_id = ?", TRANSACTION_SELECT);
        Ok(conn
            .query_row(&sql, params![id, self.household_id], row_to_transaction)
            .optional()?)
    }

    /// Apply a partial update; fields left `None` are untouched
    pub fn update_transaction(&self, id: i64, patch: &TransactionPatch) -> Result<Transaction> {
        let current = self
            .get_transaction(id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;

        let account_id = patch.account_id.unwrap_or(current.account_id);
        let category_id = patch.category_id.unwrap_or(current.category_id);
        let title = patch.title.clone().unwrap_or(current.title);
        let amount = patch.amount.unwrap_or(current.amount);
        let date = patch.date.unwrap_or(current.date);
        let status = patch.status.unwrap_or(current.status);
        let note = patch.note.clone().unwrap_or(current.note);
        let recurrence = patch.recurrence.or(current.recurrence);
        let split_with = patch.split_with.clone().unwrap_or(current.split_with);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let fields = check_write(
            &tx,
            self.household_id,
            account_id,
            category_id,
            &title,
            amount,
            current.payer_id,
            &split_with,
        )?;

        tx.execute(
            "UPDATE transactions
             SET account_id = ?, category_id = ?, kind = ?, title = ?, amount_cents = ?,
                 date = ?, status = ?, note = ?, recurrence = ?,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND household_id = ?",
            params![
                account_id,
                category_id,
                fields.kind.as_str(),
                title.trim(),
                fields.amount_cents,
                date.to_string(),
                status.as_str(),
                note,
                recurrence.map(|r| r.as_str()),
                id,
                self.household_id,
            ],
        )?;
        if patch.split_with.is_some() {
            replace_splits(&tx, id, current.payer_id, &split_with)?;
        }
        tx.commit()?;

        self.get_transaction(id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))
    }

    /// Delete a transaction
    pub fn delete_transaction(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM transactions WHERE id = ? AND household_id = ?",
            params![id, self.household_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        info!(transaction_id = id, "Deleted transaction");
        Ok(())
    }

    /// List one page of transactions matching a filter, newest first
    ///
    /// The filter is always re-bound to this household.
    pub fn list_transactions(
        &self,
        mut filter: TransactionFilter<'_>,
        limit: i64,
        offset: i64,
    ) -> Result<TransactionPage> {
        filter.household_id = self.household_id;
        let conn = self.conn()?;
        let filter = filter.build();

        let total_count: i64 = conn.query_row(
            &filter.build_count_query(),
            filter.params_refs().as_slice(),
            |row| row.get(0),
        )?;
        let (income_cents, expense_cents): (i64, i64) = conn.query_row(
            &filter.build_totals_query(),
            filter.params_refs().as_slice(),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let sql = format!(
            "{} {} {} LIMIT ? OFFSET ?",
            TRANSACTION_SELECT, filter.where_clause, TRANSACTION_ORDER
        );
        let mut params = filter.into_params();
        params.push(Box::new(limit));
        params.push(Box::new(offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(param_refs.as_slice(), row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(TransactionPage {
            transactions,
            total_count,
            income_total: from_cents(income_cents),
            expense_total: from_cents(expense_cents),
            balance: from_cents(income_cents - expense_cents),
        })
    }

    /// Most recent transactions of the household
    pub fn recent_transactions(&self, limit: i64) -> Result<Vec<Transaction>> {
        Ok(self.list_transactions(self.filter(), limit, 0)?.transactions)
    }

    /// Find edit candidates, newest first, at most ten
    ///
    /// Text criteria are case-insensitive substrings; the date is exact and the
    /// amount bounds are inclusive.
    pub fn search_by_criteria(&self, criteria: &TransactionCriteria) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "{} WHERE t.household_id = ?1
               AND (?2 IS NULL OR t.date = ?2)
               AND (?3 IS NULL OR t.amount_cents >= ?3)
               AND (?4 IS NULL OR t.amount_cents <= ?4)
             {}",
            TRANSACTION_SELECT, TRANSACTION_ORDER
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                self.household_id,
                criteria.date.map(|d| d.to_string()),
                criteria.min_amount.map(to_cents),
                criteria.max_amount.map(to_cents),
            ],
            row_to_transaction,
        )?;

        let mut matches = Vec::new();
        for row in rows {
            let t = row?;
            if contains_ci(&t.category_name, &criteria.category)
                && contains_ci(&t.account_name, &criteria.account)
                && contains_ci(&t.title, &criteria.title_contains)
            {
                matches.push(t);
                if matches.len() == CRITERIA_MATCH_LIMIT {
                    break;
                }
            }
        }
        Ok(matches)
    }

    /// Find the pending draft a resolving message refers to
    ///
    /// Only `pending` drafts of this household created within `window` are
    /// candidates. When several match, the most recently created wins.
    pub fn find_pending_draft(
        &self,
        lookup: DraftLookup,
        window: Duration,
    ) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let base = format!(
            "{} WHERE t.household_id = ? AND t.status = 'pending'
               AND t.created_at >= datetime('now', ?)",
            TRANSACTION_SELECT
        );

        let found = match lookup {
            DraftLookup::Explicit(id) => {
                let sql = format!("{} AND t.id = ?", base);
                conn.query_row(
                    &sql,
                    params![self.household_id, window_modifier(window), id],
                    row_to_transaction,
                )
                .optional()?
            }
            DraftLookup::AmountDate { amount, date } => {
                let sql = format!(
                    "{} AND t.amount_cents = ? AND t.date = ?
                     ORDER BY t.created_at DESC, t.id DESC LIMIT 1",
                    base
                );
                conn.query_row(
                    &sql,
                    params![
                        self.household_id,
                        window_modifier(window),
                        to_cents(amount),
                        date.to_string()
                    ],
                    row_to_transaction,
                )
                .optional()?
            }
        };
        Ok(found)
    }

    /// Finalize a pending draft in place with the resolved fields
    ///
    /// Runs in one SQLite transaction that re-checks the draft is still
    /// pending and inside the window. Returns `None` when it no longer is,
    /// so the caller can insert instead.
    pub fn promote_draft(
        &self,
        draft_id: i64,
        new: &NewTransaction,
        window: Duration,
    ) -> Result<Option<Transaction>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let fields = check_write(
            &tx,
            self.household_id,
            new.account_id,
            new.category_id,
            &new.title,
            new.amount,
            new.payer_id,
            &new.split_with,
        )?;

        let changed = tx.execute(
            "UPDATE transactions
             SET account_id = ?, category_id = ?, kind = ?, title = ?, amount_cents = ?,
                 date = ?, status = 'paid', note = ?, payer_id = COALESCE(?, payer_id),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND household_id = ? AND status = 'pending'
               AND created_at >= datetime('now', ?)",
            params![
                new.account_id,
                new.category_id,
                fields.kind.as_str(),
                new.title.trim(),
                fields.amount_cents,
                new.date.to_string(),
                new.note,
                new.payer_id,
                draft_id,
                self.household_id,
                window_modifier(window),
            ],
        )?;
        if changed != 1 {
            debug!(draft_id, "Draft no longer promotable");
            return Ok(None);
        }
        tx.commit()?;

        info!(transaction_id = draft_id, "Promoted draft to paid");
        self.get_transaction(draft_id)
    }

    /// Previously used titles of one type, most used first
    pub fn title_suggestions(&self, kind: TransactionType) -> Result<Vec<TitleSuggestion>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT title, category_id, AVG(amount_cents), COUNT(*)
             FROM transactions
             WHERE household_id = ? AND kind = ? AND status != ?
             GROUP BY title, category_id
             ORDER BY COUNT(*) DESC, MAX(date) DESC
             LIMIT ?",
        )?;
        let suggestions = stmt
            .query_map(
                params![
                    self.household_id,
                    kind.as_str(),
                    TransactionStatus::Cancelled.as_str(),
                    SUGGESTION_LIMIT
                ],
                |row| {
                    let average: f64 = row.get(2)?;
                    Ok(TitleSuggestion {
                        title: row.get(0)?,
                        category_id: row.get(1)?,
                        average_amount: (average.round()) / 100.0,
                        count: row.get(3)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(suggestions)
    }
}
