//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Casa - Household expenses, by hand or by chat
#[derive(Parser)]
#[command(name = "casa")]
#[command(about = "Self-hosted household expense tracker with a Portuguese chat assistant", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "casa.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set CASA_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Create or join a household
    Household {
        #[command(subcommand)]
        action: HouseholdAction,
    },

    /// List a household's accounts with balances
    Accounts {
        /// Email of a household member
        #[arg(short, long)]
        email: String,
    },

    /// List recent transactions
    Transactions {
        /// Email of a household member
        #[arg(short, long)]
        email: String,

        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Income and expense summary over a period (current month by default)
    Report {
        /// Email of a household member
        #[arg(short, long)]
        email: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },

    /// Send one message to the chat assistant
    ///
    /// Example: casa chat --email ana@example.com "gastei 45 no almoço"
    Chat {
        /// Email of the member talking (omit to only classify)
        #[arg(short, long)]
        email: Option<String>,

        /// Message, in Portuguese
        message: String,

        /// Draft transaction this message answers
        #[arg(long)]
        pending: Option<i64>,
    },

    /// Show a member's recent chat exchanges
    History {
        /// Email of the member
        #[arg(short, long)]
        email: String,

        /// Number of exchanges to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum HouseholdAction {
    /// Register a member and create a new household
    Create {
        /// Household name
        #[arg(short, long)]
        name: String,

        /// Member email
        #[arg(short, long)]
        email: String,

        /// Member display name (defaults to the email's local part)
        #[arg(long, default_value = "")]
        display_name: String,
    },

    /// Register a member and join a household by invite code
    Join {
        /// 8-character invite code
        #[arg(short, long)]
        code: String,

        /// Member email
        #[arg(short, long)]
        email: String,

        /// Member display name (defaults to the email's local part)
        #[arg(long, default_value = "")]
        display_name: String,
    },

    /// Show a member's household, members and invite code
    Show {
        /// Member email
        #[arg(short, long)]
        email: String,
    },
}
