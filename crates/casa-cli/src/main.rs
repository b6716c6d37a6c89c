//! Casa CLI - Household expense tracker
//!
//! Usage:
//!   casa init                                         Initialize database
//!   casa household create --name Casa --email EMAIL   Create a household
//!   casa chat --email EMAIL "gastei 45 no almoço"     Talk to the assistant
//!   casa serve --port 3000                            Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use casa_core::ai::AIClient;
use casa_core::chat::ChatService;
use casa_core::config::ChatConfig;
use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Household { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                HouseholdAction::Create {
                    name,
                    email,
                    display_name,
                } => commands::cmd_household_create(&db, &name, &email, &display_name),
                HouseholdAction::Join {
                    code,
                    email,
                    display_name,
                } => commands::cmd_household_join(&db, &code, &email, &display_name),
                HouseholdAction::Show { email } => commands::cmd_household_show(&db, &email),
            }
        }
        Commands::Accounts { email } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_accounts(&db, &email)
        }
        Commands::Transactions { email, limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_transactions_list(&db, &email, limit)
        }
        Commands::Report { email, from, to } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = ChatConfig::from_env();
            commands::cmd_report(&db, &config, &email, from.as_deref(), to.as_deref())
        }
        Commands::Chat {
            email,
            message,
            pending,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let chat = ChatService::new(db.clone(), AIClient::from_env(), ChatConfig::from_env())?;
            commands::cmd_chat(&db, &chat, email.as_deref(), &message, pending)
                .await
                .map(|_| ())
        }
        Commands::History { email, limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let chat = ChatService::new(db.clone(), None, ChatConfig::from_env())?;
            commands::cmd_history(&db, &chat, &email, limit)
        }
        Commands::Serve {
            port,
            host,
            static_dir,
        } => {
            commands::cmd_serve(&cli.db, &host, port, cli.no_encrypt, static_dir.as_deref()).await
        }
    }
}
