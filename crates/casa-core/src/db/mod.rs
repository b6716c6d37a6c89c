//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `households` - Households, members and invite codes
//! - `accounts` - Money containers and derived balances
//! - `categories` - Typed labels with get-or-create resolution
//! - `transactions` - Transaction CRUD, drafts and criteria search
//! - `goals` - Monthly goal upsert and progress
//! - `reports` - Period summaries, dashboard and overview
//! - `conversation` - Append-only chat log
//!
//! Everything that belongs to a household is reached through [`Ledger`],
//! obtained with [`Database::ledger`]. Every query it runs is bound to that
//! household's id.

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod accounts;
mod categories;
mod conversation;
mod goals;
mod households;
mod reports;
mod transaction_filter;
mod transactions;

pub use conversation::MAX_HISTORY_LIMIT;
pub use reports::{PaidTotals, TOP_CATEGORY_COUNT};
pub use transaction_filter::{FilterResult, TransactionFilter};
pub use transactions::{DraftLookup, TransactionPage, CRITERIA_MATCH_LIMIT};
pub use categories::CHAT_CATEGORY_ICON;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "CASA_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path. This allows moving/renaming/restoring the database freely.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"casa-salt-v1-fix";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored ISO date, mapping failures to a rusqlite conversion error
pub(crate) fn parse_date(idx: usize, s: &str) -> rusqlite::Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse a stored enum value via `FromStr`, mapping failures to a conversion error
pub(crate) fn parse_enum<T>(idx: usize, s: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    s.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(Error::InvalidData(e)),
        )
    })
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

/// Household-scoped handle to the ledger
///
/// Accounts, categories, transactions, goals and reports are only reachable
/// through this type, so a query can never forget its household filter.
#[derive(Clone, Copy)]
pub struct Ledger<'db> {
    db: &'db Database,
    household_id: i64,
}

impl<'db> Ledger<'db> {
    /// The household every query of this handle is bound to
    pub fn household_id(&self) -> i64 {
        self.household_id
    }

    fn conn(&self) -> Result<DbConn> {
        self.db.conn()
    }
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `CASA_DB_KEY` environment variable to be set.
    /// The database will be encrypted using SQLCipher with a key derived
    /// from the passphrase via Argon2.
    ///
    /// Returns an error if `CASA_DB_KEY` is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: This creates an unencrypted database. Only use for development
    /// or testing. For production, use `new()` with `CASA_DB_KEY` set.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Use with_init to set the key on every new connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            let manager = manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("casa_test_")
            .suffix(".db")
            .tempfile()?
            .into_temp_path()
            .keep()
            .map_err(|e| Error::Io(e.error))?;

        let path = path
            .to_str()
            .ok_or_else(|| Error::InvalidData("Temp path is not UTF-8".into()))?
            .to_string();
        Self::new_unencrypted(&path)
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Household-scoped access to accounts, categories, transactions and goals
    pub fn ledger(&self, household_id: i64) -> Ledger<'_> {
        Ledger {
            db: self,
            household_id,
        }
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Households (shared budget units, at most 2 members)
            CREATE TABLE IF NOT EXISTS households (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                invite_code TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Members (identity comes from the upstream proxy, keyed by email)
            CREATE TABLE IF NOT EXISTS members (
                id INTEGER PRIMARY KEY,
                household_id INTEGER REFERENCES households(id) ON DELETE SET NULL,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                display_name TEXT NOT NULL,
                phone TEXT,
                biometric_enabled BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_members_household ON members(household_id);

            -- Accounts
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                household_id INTEGER NOT NULL REFERENCES households(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'checking',
                opening_balance_cents INTEGER NOT NULL DEFAULT 0 CHECK (opening_balance_cents >= 0),
                color TEXT NOT NULL DEFAULT '#007bff',
                active BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_household ON accounts(household_id);

            -- Categories ((household, name, type) is unique)
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                household_id INTEGER NOT NULL REFERENCES households(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('expense', 'income')),
                icon TEXT NOT NULL DEFAULT 'bi-tag',
                color TEXT NOT NULL DEFAULT '#6c757d',
                active BOOLEAN NOT NULL DEFAULT 1,
                UNIQUE(household_id, name, kind)
            );

            -- Transactions (amounts in integer cents, type copied from category)
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                household_id INTEGER NOT NULL REFERENCES households(id) ON DELETE CASCADE,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE RESTRICT,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE RESTRICT,
                kind TEXT NOT NULL CHECK (kind IN ('expense', 'income')),
                title TEXT NOT NULL,
                amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
                date DATE NOT NULL,
                status TEXT NOT NULL DEFAULT 'paid' CHECK (status IN ('pending', 'paid', 'cancelled')),
                note TEXT NOT NULL DEFAULT '',
                payer_id INTEGER REFERENCES members(id) ON DELETE SET NULL,
                recurrence TEXT,                           -- weekly, monthly, yearly
                attachment TEXT,                           -- external file reference
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_household_date ON transactions(household_id, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_drafts ON transactions(household_id, status, amount_cents, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id);

            -- Members splitting a transaction with its payer
            CREATE TABLE IF NOT EXISTS transaction_splits (
                transaction_id INTEGER NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
                member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
                PRIMARY KEY (transaction_id, member_id)
            );

            -- Monthly goals, upserted by (household, type, category-or-none, month, year)
            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY,
                household_id INTEGER NOT NULL REFERENCES households(id) ON DELETE CASCADE,
                goal_type TEXT NOT NULL,
                category_id INTEGER REFERENCES categories(id) ON DELETE CASCADE,
                amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
                month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
                year INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_goals_key
                ON goals(household_id, goal_type, IFNULL(category_id, 0), month, year);

            -- Chat conversation log (append-only)
            CREATE TABLE IF NOT EXISTS conversation_log (
                id INTEGER PRIMARY KEY,
                member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
                user_message TEXT NOT NULL,
                assistant_reply TEXT NOT NULL,
                intent TEXT,
                transcribed_text TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_conversation_member ON conversation_log(member_id, created_at);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
