//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Database setup (init) and shared utilities (open_db, member lookup)
//! - `household` - Household commands (create, join, show)
//! - `transactions` - Account and transaction listings
//! - `reports` - Period summary
//! - `chat` - One-shot chat and history
//! - `serve` - Web server command

pub mod chat;
pub mod core;
pub mod household;
pub mod reports;
pub mod serve;
pub mod transactions;

// Re-export command functions for main.rs
pub use chat::*;
pub use core::*;
pub use household::*;
pub use reports::*;
pub use serve::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
