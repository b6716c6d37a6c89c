//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `household_member` - Resolve an email to a member with a household
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use casa_core::db::Database;
use casa_core::models::Member;
use tracing::debug;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    debug!(path = path_str, encrypted = !no_encrypt, "Opening database");
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// The registered member behind an email, with their household id
pub fn household_member(db: &Database, email: &str) -> Result<(Member, i64)> {
    let email = email.trim().to_lowercase();
    let member = db
        .get_member_by_email(&email)?
        .with_context(|| format!("No member registered as {}", email))?;
    match member.household_id {
        Some(household_id) => Ok((member, household_id)),
        None => bail!(
            "{} has no household yet. Run 'casa household create' or 'casa household join'",
            email
        ),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }
    if db.is_encrypted()? {
        println!("   SQLCipher: active");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create a household: casa household create --name \"Casa\" --email you@example.com");
    println!("  2. Start web UI: casa serve");

    Ok(())
}
