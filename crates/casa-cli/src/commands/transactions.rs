//! Account and transaction command implementations

use anyhow::Result;
use casa_core::chat::replies::format_brl;
use casa_core::db::Database;
use casa_core::models::{TransactionStatus, TransactionType};

use super::{household_member, truncate};

pub fn cmd_accounts(db: &Database, email: &str) -> Result<()> {
    let (_, household_id) = household_member(db, email)?;
    let accounts = db.ledger(household_id).list_accounts()?;

    if accounts.is_empty() {
        println!("No accounts yet. Chat entries create a default one:");
        println!("  casa chat --email {} \"gastei 20 no café\"", email);
        return Ok(());
    }

    println!();
    println!("🏦 Accounts");
    println!("   ─────────────────────────────────────────────");

    for account in accounts {
        println!(
            "   [{}] {:<20} │ {:>14} │ {}{}",
            account.id,
            truncate(&account.name, 20),
            format_brl(account.current_balance),
            account.kind,
            if account.active { "" } else { " (inactive)" }
        );
    }

    Ok(())
}

pub fn cmd_transactions_list(db: &Database, email: &str, limit: i64) -> Result<()> {
    let (_, household_id) = household_member(db, email)?;
    let transactions = db.ledger(household_id).recent_transactions(limit)?;

    if transactions.is_empty() {
        println!("No transactions found. Add one with:");
        println!("  casa chat --email {} \"gastei 45 no almoço\"", email);
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let amount_str = match tx.kind {
            TransactionType::Expense => format!("\x1b[31m-{}\x1b[0m", format_brl(tx.amount)), // Red for expenses
            TransactionType::Income => format!("\x1b[32m+{}\x1b[0m", format_brl(tx.amount)), // Green for income
        };
        let status = match tx.status {
            TransactionStatus::Paid => "",
            TransactionStatus::Pending => " ⏳",
            TransactionStatus::Cancelled => " ✖",
        };

        println!(
            "   [{}] {} │ {:>14} │ {:<14} │ {}{}",
            tx.id,
            tx.date,
            amount_str,
            truncate(&tx.category_name, 14),
            truncate(&tx.title, 40),
            status
        );
    }

    Ok(())
}
