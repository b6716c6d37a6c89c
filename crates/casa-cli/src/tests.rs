//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use casa_core::ai::{AIClient, MockBackend};
use casa_core::chat::ChatService;
use casa_core::config::ChatConfig;
use casa_core::db::Database;
use casa_core::models::{TransactionStatus, TransactionType};
use serde_json::json;

use crate::commands::{self, truncate};

fn setup_test_db() -> Database {
    let db = Database::in_memory().unwrap();
    commands::cmd_household_create(&db, "Casa Silva", "Ana@Example.com", "Ana").unwrap();
    db
}

fn setup_chat(db: &Database) -> (ChatService, MockBackend) {
    let mock = MockBackend::new();
    let chat = ChatService::new(
        db.clone(),
        Some(AIClient::Mock(mock.clone())),
        ChatConfig::default(),
    )
    .unwrap();
    (chat, mock)
}

fn household_id(db: &Database) -> i64 {
    commands::household_member(db, "ana@example.com").unwrap().1
}

// ========== Core Command Tests ==========

#[test]
fn test_cmd_init_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("casa.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());
    assert!(commands::open_db(&path, true).is_ok());
}

#[test]
fn test_household_member_lookup_is_case_insensitive() {
    let db = setup_test_db();

    let (member, _) = commands::household_member(&db, "  ANA@example.com").unwrap();
    assert_eq!(member.display_name, "Ana");
}

#[test]
fn test_household_member_errors() {
    let db = setup_test_db();

    let err = commands::household_member(&db, "nobody@example.com").unwrap_err();
    assert!(err.to_string().contains("No member registered"));

    db.register_member("solo@example.com", "Solo", None).unwrap();
    let err = commands::household_member(&db, "solo@example.com").unwrap_err();
    assert!(err.to_string().contains("no household"));
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("Feira", 10), "Feira");
    assert_eq!(truncate("Almoço no restaurante", 10), "Almoço ...");
    // Multi-byte characters count once
    assert_eq!(truncate("çççççç", 5), "çç...");
}

// ========== Household Command Tests ==========

#[test]
fn test_cmd_household_join() {
    let db = setup_test_db();
    let code = db.get_household(household_id(&db)).unwrap().unwrap().invite_code;

    commands::cmd_household_join(&db, &code.to_lowercase(), "bruno@example.com", "").unwrap();

    let (bruno, id) = commands::household_member(&db, "bruno@example.com").unwrap();
    assert_eq!(id, household_id(&db));
    assert_eq!(bruno.display_name, "bruno");
    assert!(commands::cmd_household_show(&db, "bruno@example.com").is_ok());
}

#[test]
fn test_cmd_household_join_full() {
    let db = setup_test_db();
    let code = db.get_household(household_id(&db)).unwrap().unwrap().invite_code;
    commands::cmd_household_join(&db, &code, "bruno@example.com", "Bruno").unwrap();

    let result = commands::cmd_household_join(&db, &code, "carla@example.com", "Carla");
    assert!(result.is_err());
}

#[test]
fn test_cmd_household_create_twice_fails() {
    let db = setup_test_db();

    let result = commands::cmd_household_create(&db, "Outra", "ana@example.com", "Ana");
    assert!(result.is_err());
}

// ========== Listing Command Tests ==========

#[test]
fn test_cmd_accounts_and_transactions_empty() {
    let db = setup_test_db();

    assert!(commands::cmd_accounts(&db, "ana@example.com").is_ok());
    assert!(commands::cmd_transactions_list(&db, "ana@example.com", 20).is_ok());
}

#[test]
fn test_cmd_listings_require_household() {
    let db = setup_test_db();

    assert!(commands::cmd_accounts(&db, "nobody@example.com").is_err());
    assert!(commands::cmd_transactions_list(&db, "nobody@example.com", 20).is_err());
}

// ========== Report Command Tests ==========

#[test]
fn test_parse_date_arg() {
    let date = commands::parse_date_arg(Some("2026-01-31"), "to").unwrap();
    assert_eq!(date.unwrap().to_string(), "2026-01-31");
    assert!(commands::parse_date_arg(None, "to").unwrap().is_none());

    let err = commands::parse_date_arg(Some("31/01/2026"), "to").unwrap_err();
    assert!(err.to_string().contains("--to"));
}

#[test]
fn test_cmd_report() {
    let db = setup_test_db();
    let ledger = db.ledger(household_id(&db));
    let account = ledger.get_or_create_account("Carteira").unwrap();
    let category = ledger
        .get_or_create_category("Mercado", TransactionType::Expense)
        .unwrap();
    ledger
        .insert_transaction(&casa_core::models::NewTransaction {
            account_id: account.id,
            category_id: category.id,
            title: "Feira".to_string(),
            amount: 80.0,
            date: chrono::NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            status: TransactionStatus::Paid,
            note: String::new(),
            payer_id: None,
            split_with: vec![],
            recurrence: None,
            attachment: None,
        })
        .unwrap();

    let config = ChatConfig::default();
    let result = commands::cmd_report(
        &db,
        &config,
        "ana@example.com",
        Some("2026-01-01"),
        Some("2026-01-31"),
    );
    assert!(result.is_ok());
    assert!(commands::cmd_transactions_list(&db, "ana@example.com", 5).is_ok());
    assert!(commands::cmd_accounts(&db, "ana@example.com").is_ok());

    let result = commands::cmd_report(&db, &config, "ana@example.com", Some("ontem"), None);
    assert!(result.is_err());
}

// ========== Chat Command Tests ==========

#[tokio::test]
async fn test_cmd_chat_saves_transaction() {
    let db = setup_test_db();
    let (chat, mock) = setup_chat(&db);
    mock.push_json(json!({
        "intent": "create_transaction",
        "clarification_needed": false,
        "assistant_message": "Anotado!",
        "transaction": {"type": "despesa", "amount": 45.0, "title": "Almoço", "category": "Alimentação"}
    }));

    let response = commands::cmd_chat(&db, &chat, Some("ana@example.com"), "gastei 45 no almoço", None)
        .await
        .unwrap();
    assert_eq!(response.transaction_saved, Some(true));

    let saved = db.ledger(household_id(&db)).recent_transactions(10).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].title, "Almoço");

    assert!(commands::cmd_history(&db, &chat, "ana@example.com", 10).is_ok());
    assert_eq!(chat.history(saved[0].payer_id.unwrap(), None).unwrap().len(), 2);
}

#[tokio::test]
async fn test_cmd_chat_without_email_only_classifies() {
    let db = setup_test_db();
    let (chat, mock) = setup_chat(&db);
    mock.push_json(json!({
        "intent": "create_transaction",
        "clarification_needed": false,
        "assistant_message": "Anotado!",
        "transaction": {"type": "despesa", "amount": 45.0, "title": "Almoço"}
    }));

    let response = commands::cmd_chat(&db, &chat, None, "gastei 45 no almoço", None)
        .await
        .unwrap();
    assert_eq!(response.intent, "create_transaction");
    assert!(response.transaction_id.is_none());
    assert!(db
        .ledger(household_id(&db))
        .recent_transactions(10)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cmd_chat_unknown_member_fails_before_classifying() {
    let db = setup_test_db();
    let (chat, mock) = setup_chat(&db);

    let result = commands::cmd_chat(&db, &chat, Some("nobody@example.com"), "oi", None).await;
    assert!(result.is_err());
    assert!(mock.calls().is_empty());
}
