//! Transaction filter builder for constructing dynamic SQL queries
//!
//! The list endpoint and its totals query share one WHERE clause, so both are
//! built here. The household condition is always emitted first.

use chrono::NaiveDate;

use crate::models::{TransactionStatus, TransactionType};

/// Builder for constructing household-scoped transaction filters
#[derive(Default)]
pub struct TransactionFilter<'query> {
    pub household_id: i64,
    pub account_id: Option<i64>,
    pub category_id: Option<i64>,
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub search: Option<&'query str>,
    pub date_range: (Option<NaiveDate>, Option<NaiveDate>),
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> TransactionFilter<'query> {
    /// Create a filter bound to one household
    pub fn new(household_id: i64) -> Self {
        Self {
            household_id,
            ..Self::default()
        }
    }

    pub fn account_id(mut self, id: Option<i64>) -> Self {
        self.account_id = id;
        self
    }

    pub fn category_id(mut self, id: Option<i64>) -> Self {
        self.category_id = id;
        self
    }

    pub fn kind(mut self, kind: Option<TransactionType>) -> Self {
        self.kind = kind;
        self
    }

    pub fn status(mut self, status: Option<TransactionStatus>) -> Self {
        self.status = status;
        self
    }

    /// Set search query (matches the title)
    pub fn search(mut self, query: Option<&'query str>) -> Self {
        self.search = query;
        self
    }

    /// Set date range filter; either end may be open
    pub fn date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_range = (from, to);
        self
    }

    /// Build the filter components
    pub fn build(self) -> FilterResult {
        let mut conditions = vec!["t.household_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(self.household_id)];

        if let Some(aid) = self.account_id {
            conditions.push("t.account_id = ?".to_string());
            params.push(Box::new(aid));
        }

        if let Some(cid) = self.category_id {
            conditions.push("t.category_id = ?".to_string());
            params.push(Box::new(cid));
        }

        if let Some(kind) = self.kind {
            conditions.push("t.kind = ?".to_string());
            params.push(Box::new(kind.as_str()));
        }

        if let Some(status) = self.status {
            conditions.push("t.status = ?".to_string());
            params.push(Box::new(status.as_str()));
        }

        if let Some(q) = self.search {
            if !q.trim().is_empty() {
                conditions.push("t.title LIKE ? COLLATE NOCASE".to_string());
                params.push(Box::new(format!("%{}%", q.trim())));
            }
        }

        let (from, to) = self.date_range;
        if let Some(from) = from {
            conditions.push("t.date >= ?".to_string());
            params.push(Box::new(from.to_string()));
        }
        if let Some(to) = to {
            conditions.push("t.date <= ?".to_string());
            params.push(Box::new(to.to_string()));
        }

        FilterResult {
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            params,
        }
    }
}

impl FilterResult {
    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM transactions t {}", self.where_clause)
    }

    /// Build the paid income/expense totals query for the same filter
    pub fn build_totals_query(&self) -> String {
        format!(
            "SELECT
                COALESCE(SUM(CASE WHEN t.kind = 'income' AND t.status = 'paid' THEN t.amount_cents END), 0),
                COALESCE(SUM(CASE WHEN t.kind = 'expense' AND t.status = 'paid' THEN t.amount_cents END), 0)
             FROM transactions t {}",
            self.where_clause
        )
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }

    /// Get the parameter vector to append pagination params
    pub fn into_params(self) -> Vec<Box<dyn rusqlite::ToSql>> {
        self.params
    }
}
