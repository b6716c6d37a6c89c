//! Household and member operations

use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::info;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Household, Member, MAX_HOUSEHOLD_MEMBERS};

const INVITE_CODE_LEN: usize = 8;
const INVITE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const HOUSEHOLD_COLUMNS: &str = "h.id, h.name, h.invite_code, h.created_at,
    (SELECT COUNT(*) FROM members m WHERE m.household_id = h.id)";

const MEMBER_COLUMNS: &str =
    "id, household_id, email, display_name, phone, biometric_enabled, created_at";

fn row_to_household(row: &rusqlite::Row) -> rusqlite::Result<Household> {
    let created_at: String = row.get(3)?;
    Ok(Household {
        id: row.get(0)?,
        name: row.get(1)?,
        invite_code: row.get(2)?,
        created_at: parse_datetime(&created_at),
        member_count: row.get(4)?,
    })
}

fn row_to_member(row: &rusqlite::Row) -> rusqlite::Result<Member> {
    let created_at: String = row.get(6)?;
    Ok(Member {
        id: row.get(0)?,
        household_id: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        phone: row.get(4)?,
        biometric_enabled: row.get(5)?,
        created_at: parse_datetime(&created_at),
    })
}

/// Derive an 8-character invite code from a seed
fn invite_code_from_seed(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    digest
        .iter()
        .take(INVITE_CODE_LEN)
        .map(|b| INVITE_ALPHABET[*b as usize % INVITE_ALPHABET.len()] as char)
        .collect()
}

/// Generate an invite code not used by any household
///
/// The seed mixes 128 bits from SQLite's OS-seeded `randomblob`, so a code
/// cannot be guessed from the household name and creation time.
fn unique_invite_code(conn: &Connection, name: &str) -> Result<String> {
    let mut attempt: u32 = 0;
    loop {
        let entropy: String = conn.query_row("SELECT hex(randomblob(16))", [], |row| row.get(0))?;
        let code = invite_code_from_seed(&format!("{}:{}:{}", name, entropy, attempt));
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM households WHERE invite_code = ?)",
            [&code],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(code);
        }
        attempt += 1;
    }
}

/// Normalize a user-typed invite code, rejecting malformed input
fn normalize_invite_code(code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    let pattern = Regex::new(r"^[A-Z0-9]{8}$")?;
    if !pattern.is_match(&code) {
        return Err(Error::Validation(
            "Invite code must be 8 letters or digits".to_string(),
        ));
    }
    Ok(code)
}

/// Delete a household and everything it owns
///
/// Transactions go before accounts and categories, which they restrict.
fn purge_household(conn: &Connection, household_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM transactions WHERE household_id = ?",
        [household_id],
    )?;
    conn.execute("DELETE FROM goals WHERE household_id = ?", [household_id])?;
    conn.execute(
        "DELETE FROM categories WHERE household_id = ?",
        [household_id],
    )?;
    conn.execute("DELETE FROM accounts WHERE household_id = ?", [household_id])?;
    conn.execute("DELETE FROM households WHERE id = ?", [household_id])?;
    info!(household_id, "Household deleted with its last member");
    Ok(())
}

fn purge_if_empty(conn: &Connection, household_id: i64) -> Result<bool> {
    let remaining: i64 = conn.query_row(
        "SELECT COUNT(*) FROM members WHERE household_id = ?",
        [household_id],
        |row| row.get(0),
    )?;
    if remaining == 0 {
        purge_household(conn, household_id)?;
        return Ok(true);
    }
    Ok(false)
}

impl Database {
    /// Register a member by email, or return the existing one
    pub fn register_member(
        &self,
        email: &str,
        display_name: &str,
        phone: Option<&str>,
    ) -> Result<Member> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::Validation(format!("Invalid email: {}", email)));
        }

        if let Some(existing) = self.get_member_by_email(email)? {
            return Ok(existing);
        }

        let display_name = match display_name.trim() {
            "" => email.split('@').next().unwrap_or(email),
            name => name,
        };

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO members (email, display_name, phone) VALUES (?, ?, ?)",
            params![email, display_name, phone],
        )?;
        let id = conn.last_insert_rowid();
        info!(member_id = id, "Registered member");

        self.get_member(id)?
            .ok_or_else(|| Error::NotFound(format!("Member {}", id)))
    }

    /// Get a member by ID
    pub fn get_member(&self, id: i64) -> Result<Option<Member>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM members WHERE id = ?", MEMBER_COLUMNS);
        Ok(conn.query_row(&sql, [id], row_to_member).optional()?)
    }

    /// Get a member by email (case-insensitive)
    pub fn get_member_by_email(&self, email: &str) -> Result<Option<Member>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM members WHERE email = ?", MEMBER_COLUMNS);
        Ok(conn
            .query_row(&sql, [email.trim()], row_to_member)
            .optional()?)
    }

    /// List the members of a household
    pub fn list_household_members(&self, household_id: i64) -> Result<Vec<Member>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM members WHERE household_id = ? ORDER BY id",
            MEMBER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let members = stmt
            .query_map([household_id], row_to_member)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// Get a household by ID
    pub fn get_household(&self, id: i64) -> Result<Option<Household>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM households h WHERE h.id = ?", HOUSEHOLD_COLUMNS);
        Ok(conn.query_row(&sql, [id], row_to_household).optional()?)
    }

    /// Find a household by invite code (case-insensitive)
    pub fn get_household_by_code(&self, code: &str) -> Result<Option<Household>> {
        let code = normalize_invite_code(code)?;
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM households h WHERE h.invite_code = ?",
            HOUSEHOLD_COLUMNS
        );
        Ok(conn.query_row(&sql, [code], row_to_household).optional()?)
    }

    /// Create a household with the given member as its first member
    pub fn create_household(&self, member_id: i64, name: &str) -> Result<Household> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Household name is required".to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let current: Option<Option<i64>> = tx
            .query_row(
                "SELECT household_id FROM members WHERE id = ?",
                [member_id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            None => return Err(Error::NotFound(format!("Member {}", member_id))),
            Some(Some(_)) => {
                return Err(Error::Conflict(
                    "Member already belongs to a household".to_string(),
                ))
            }
            Some(None) => {}
        }

        let code = unique_invite_code(&tx, name)?;
        tx.execute(
            "INSERT INTO households (name, invite_code) VALUES (?, ?)",
            params![name, code],
        )?;
        let household_id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE members SET household_id = ? WHERE id = ?",
            params![household_id, member_id],
        )?;
        tx.commit()?;

        info!(household_id, member_id, "Created household");
        self.get_household(household_id)?
            .ok_or_else(|| Error::NotFound(format!("Household {}", household_id)))
    }

    /// Join a household by invite code
    ///
    /// Fails with a validation error when the household is already full.
    pub fn join_household(&self, member_id: i64, code: &str) -> Result<Household> {
        let code = normalize_invite_code(code)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let household_id: i64 = tx
            .query_row(
                "SELECT id FROM households WHERE invite_code = ?",
                [&code],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("No household with invite code {}", code)))?;

        let current: Option<i64> = tx
            .query_row(
                "SELECT household_id FROM members WHERE id = ?",
                [member_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Member {}", member_id)))?;

        if current == Some(household_id) {
            drop(tx);
            return self
                .get_household(household_id)?
                .ok_or_else(|| Error::NotFound(format!("Household {}", household_id)));
        }
        if current.is_some() {
            return Err(Error::Conflict(
                "Member already belongs to a household".to_string(),
            ));
        }

        let members: i64 = tx.query_row(
            "SELECT COUNT(*) FROM members WHERE household_id = ?",
            [household_id],
            |row| row.get(0),
        )?;
        if members >= MAX_HOUSEHOLD_MEMBERS {
            return Err(Error::Validation(format!(
                "Household is full (max {} members)",
                MAX_HOUSEHOLD_MEMBERS
            )));
        }

        tx.execute(
            "UPDATE members SET household_id = ? WHERE id = ?",
            params![household_id, member_id],
        )?;
        tx.commit()?;

        info!(household_id, member_id, "Member joined household");
        self.get_household(household_id)?
            .ok_or_else(|| Error::NotFound(format!("Household {}", household_id)))
    }

    /// Leave the current household; the household is deleted once empty
    ///
    /// Returns true when the household was deleted.
    pub fn leave_household(&self, member_id: i64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let household_id: Option<i64> = tx
            .query_row(
                "SELECT household_id FROM members WHERE id = ?",
                [member_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Member {}", member_id)))?;

        let Some(household_id) = household_id else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE members SET household_id = NULL WHERE id = ?",
            [member_id],
        )?;
        tx.execute(
            "UPDATE transactions SET payer_id = NULL WHERE payer_id = ?",
            [member_id],
        )?;
        tx.execute(
            "DELETE FROM transaction_splits WHERE member_id = ?",
            [member_id],
        )?;
        let purged = purge_if_empty(&tx, household_id)?;
        tx.commit()?;
        Ok(purged)
    }

    /// Delete a member, their chat log, and the household if they were its last member
    pub fn delete_member(&self, member_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let household_id: Option<i64> = tx
            .query_row(
                "SELECT household_id FROM members WHERE id = ?",
                [member_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Member {}", member_id)))?;

        tx.execute("DELETE FROM members WHERE id = ?", [member_id])?;
        if let Some(household_id) = household_id {
            purge_if_empty(&tx, household_id)?;
        }
        tx.commit()?;

        info!(member_id, "Deleted member");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_code_shape() {
        let code = invite_code_from_seed("Casa Silva:1:0");
        assert_eq!(code.len(), 8);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_invite_code_not_derived_from_name_alone() {
        let db = crate::db::Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let first = unique_invite_code(&conn, "Casa Silva").unwrap();
        let second = unique_invite_code(&conn, "Casa Silva").unwrap();
        assert_ne!(first, second);
        assert_ne!(first, invite_code_from_seed("Casa Silva:0:0"));
    }

    #[test]
    fn test_normalize_invite_code() {
        assert_eq!(normalize_invite_code(" ab12cd34 ").unwrap(), "AB12CD34");
        assert!(matches!(
            normalize_invite_code("short"),
            Err(Error::Validation(_))
        ));
        assert!(normalize_invite_code("AB12-D34").is_err());
    }
}
