//! Category operations

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::accounts::validate_color;
use super::{parse_enum, Ledger};
use crate::error::{Error, Result};
use crate::models::{
    Category, NewCategory, TransactionType, DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_ICON,
};

/// Icon given to categories created from chat
pub const CHAT_CATEGORY_ICON: &str = "💰";

const CATEGORY_COLUMNS: &str = "id, household_id, name, kind, icon, color, active";

fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    let kind: String = row.get(3)?;
    Ok(Category {
        id: row.get(0)?,
        household_id: row.get(1)?,
        name: row.get(2)?,
        kind: parse_enum(3, &kind)?,
        icon: row.get(4)?,
        color: row.get(5)?,
        active: row.get(6)?,
    })
}

impl Ledger<'_> {
    /// List categories, optionally only one type
    pub fn list_categories(&self, kind: Option<TransactionType>) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM categories
             WHERE household_id = ?1 AND (?2 IS NULL OR kind = ?2)
             ORDER BY kind, name COLLATE NOCASE",
            CATEGORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let categories = stmt
            .query_map(
                params![self.household_id, kind.map(|k| k.as_str())],
                row_to_category,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Get a category by ID
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM categories WHERE id = ? AND household_id = ?",
            CATEGORY_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![id, self.household_id], row_to_category)
            .optional()?)
    }

    /// Find a category by (name, type), comparing names case-insensitively
    pub fn find_category(&self, name: &str, kind: TransactionType) -> Result<Option<Category>> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .list_categories(Some(kind))?
            .into_iter()
            .find(|c| c.name.to_lowercase() == wanted))
    }

    /// Create a category; (name, type) must be unused in the household
    pub fn create_category(&self, category: &NewCategory) -> Result<Category> {
        let name = category.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Category name is required".to_string()));
        }
        if let Some(color) = &category.color {
            validate_color(color)?;
        }
        if self.find_category(name, category.kind)?.is_some() {
            return Err(Error::Conflict(format!(
                "Category '{}' ({}) already exists",
                name, category.kind
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (household_id, name, kind, icon, color, active)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                self.household_id,
                name,
                category.kind.as_str(),
                category.icon.as_deref().unwrap_or(DEFAULT_CATEGORY_ICON),
                category.color.as_deref().unwrap_or(DEFAULT_CATEGORY_COLOR),
                category.active.unwrap_or(true),
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(category_id = id, household_id = self.household_id, "Created category");

        self.get_category(id)?
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))
    }

    /// Update a category
    ///
    /// A type change is copied onto every transaction of the category.
    pub fn update_category(&self, id: i64, category: &NewCategory) -> Result<Category> {
        let name = category.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Category name is required".to_string()));
        }
        if let Some(color) = &category.color {
            validate_color(color)?;
        }
        if let Some(other) = self.find_category(name, category.kind)? {
            if other.id != id {
                return Err(Error::Conflict(format!(
                    "Category '{}' ({}) already exists",
                    name, category.kind
                )));
            }
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE categories
             SET name = ?, kind = ?, icon = COALESCE(?, icon), color = COALESCE(?, color),
                 active = COALESCE(?, active)
             WHERE id = ? AND household_id = ?",
            params![
                name,
                category.kind.as_str(),
                category.icon,
                category.color,
                category.active,
                id,
                self.household_id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Category {}", id)));
        }
        tx.execute(
            "UPDATE transactions SET kind = ?, updated_at = CURRENT_TIMESTAMP
             WHERE category_id = ? AND kind != ?",
            params![category.kind.as_str(), id, category.kind.as_str()],
        )?;
        tx.commit()?;

        self.get_category(id)?
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))
    }

    /// Delete a category; fails with a conflict while transactions reference it
    pub fn delete_category(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let in_use: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE category_id = ? AND household_id = ?",
            params![id, self.household_id],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(Error::Conflict(format!(
                "Category is used by {} transaction(s)",
                in_use
            )));
        }

        let changed = conn.execute(
            "DELETE FROM categories WHERE id = ? AND household_id = ?",
            params![id, self.household_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Category {}", id)));
        }
        info!(category_id = id, "Deleted category");
        Ok(())
    }

    /// Find a category by (name, type), creating it with chat defaults if missing
    pub fn get_or_create_category(&self, name: &str, kind: TransactionType) -> Result<Category> {
        if let Some(existing) = self.find_category(name, kind)? {
            return Ok(existing);
        }
        self.create_category(&NewCategory {
            name: name.trim().to_string(),
            kind,
            icon: Some(CHAT_CATEGORY_ICON.to_string()),
            color: Some(DEFAULT_CATEGORY_COLOR.to_string()),
            active: None,
        })
    }
}
