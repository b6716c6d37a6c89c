//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// A database with one member in one household
    fn setup() -> (Database, Member, Household) {
        let db = Database::in_memory().unwrap();
        let member = db
            .register_member("ana@example.com", "Ana", None)
            .unwrap();
        let household = db.create_household(member.id, "Casa Silva").unwrap();
        let member = db.get_member(member.id).unwrap().unwrap();
        (db, member, household)
    }

    /// Account, expense category and income category
    fn seed(ledger: &Ledger) -> (Account, Category, Category) {
        let account = ledger.get_or_create_account("Carteira").unwrap();
        let food = ledger
            .get_or_create_category("Alimentação", TransactionType::Expense)
            .unwrap();
        let salary = ledger
            .get_or_create_category("Salário", TransactionType::Income)
            .unwrap();
        (account, food, salary)
    }

    fn new_tx(account_id: i64, category_id: i64, title: &str, amount: f64, on: NaiveDate) -> NewTransaction {
        NewTransaction {
            account_id,
            category_id,
            title: title.to_string(),
            amount,
            date: on,
            status: TransactionStatus::Paid,
            note: String::new(),
            payer_id: None,
            split_with: vec![],
            recurrence: None,
            attachment: None,
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.get_member_by_email("nobody@example.com").unwrap().is_none());
        assert!(db.ledger(1).list_accounts().unwrap().is_empty());
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('households', 'members', 'accounts', 'categories', 'transactions',
                  'transaction_splits', 'goals', 'conversation_log')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 8);
    }

    // ========== Households ==========

    #[test]
    fn test_register_is_idempotent_and_case_insensitive() {
        let db = Database::in_memory().unwrap();
        let first = db.register_member("Bia@Example.com", "Bia", None).unwrap();
        let again = db.register_member("bia@example.com", "Other", None).unwrap();
        assert_eq!(first.id, again.id);
        assert!(first.household_id.is_none());
        assert!(db.register_member("not-an-email", "", None).is_err());
    }

    #[test]
    fn test_join_household_by_code() {
        let (db, _ana, household) = setup();
        assert_eq!(household.invite_code.len(), 8);
        assert_eq!(household.member_count, 1);

        let bia = db.register_member("bia@example.com", "Bia", None).unwrap();
        let joined = db
            .join_household(bia.id, &household.invite_code.to_lowercase())
            .unwrap();
        assert_eq!(joined.id, household.id);
        assert_eq!(joined.member_count, 2);
        assert!(!joined.has_vacancy());

        let carla = db.register_member("carla@example.com", "Carla", None).unwrap();
        let err = db.join_household(carla.id, &household.invite_code).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_join_unknown_code() {
        let (db, _, _) = setup();
        let bia = db.register_member("bia@example.com", "Bia", None).unwrap();
        let err = db.join_household(bia.id, "ZZZZ9999").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_second_household_conflicts() {
        let (db, ana, _) = setup();
        let err = db.create_household(ana.id, "Outra").unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_last_member_leaving_deletes_household_data() {
        let (db, ana, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        ledger
            .insert_transaction(&new_tx(account.id, food.id, "Feira", 80.0, date(2024, 5, 2)))
            .unwrap();

        let bia = db.register_member("bia@example.com", "Bia", None).unwrap();
        db.join_household(bia.id, &household.invite_code).unwrap();

        assert!(!db.leave_household(bia.id).unwrap());
        assert!(db.get_household(household.id).unwrap().is_some());

        db.delete_member(ana.id).unwrap();
        assert!(db.get_household(household.id).unwrap().is_none());

        let conn = db.conn().unwrap();
        let leftover: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM transactions) + (SELECT COUNT(*) FROM accounts)
                      + (SELECT COUNT(*) FROM categories)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leftover, 0);
    }

    // ========== Accounts & categories ==========

    #[test]
    fn test_account_balance_excludes_cancelled() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let account = ledger
            .create_account(&NewAccount {
                name: "Nubank".into(),
                kind: AccountKind::Checking,
                opening_balance: 1000.0,
                color: None,
                active: None,
            })
            .unwrap();
        assert_eq!(account.color, DEFAULT_ACCOUNT_COLOR);
        let (_, food, salary) = seed(&ledger);

        ledger
            .insert_transaction(&new_tx(account.id, salary.id, "Salário", 500.0, date(2024, 5, 1)))
            .unwrap();
        ledger
            .insert_transaction(&new_tx(account.id, food.id, "Mercado", 200.0, date(2024, 5, 2)))
            .unwrap();
        let mut cancelled = new_tx(account.id, food.id, "Estornado", 999.0, date(2024, 5, 3));
        cancelled.status = TransactionStatus::Cancelled;
        ledger.insert_transaction(&cancelled).unwrap();

        let account = ledger.get_account(account.id).unwrap().unwrap();
        assert_eq!(account.current_balance, 1300.0);
    }

    #[test]
    fn test_account_validation() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let bad = NewAccount {
            name: "Poupança".into(),
            kind: AccountKind::Savings,
            opening_balance: -1.0,
            color: None,
            active: None,
        };
        assert!(matches!(ledger.create_account(&bad), Err(Error::Validation(_))));

        let bad_color = NewAccount {
            opening_balance: 0.0,
            color: Some("blue".into()),
            ..bad
        };
        assert!(matches!(ledger.create_account(&bad_color), Err(Error::Validation(_))));
    }

    #[test]
    fn test_referenced_account_and_category_cannot_be_deleted() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, salary) = seed(&ledger);
        ledger
            .insert_transaction(&new_tx(account.id, food.id, "Almoço", 30.0, date(2024, 5, 2)))
            .unwrap();

        assert!(matches!(ledger.delete_account(account.id), Err(Error::Conflict(_))));
        assert!(matches!(ledger.delete_category(food.id), Err(Error::Conflict(_))));
        ledger.delete_category(salary.id).unwrap();
    }

    #[test]
    fn test_duplicate_category_conflicts_per_type() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let new = NewCategory {
            name: "Extra".into(),
            kind: TransactionType::Expense,
            icon: None,
            color: None,
            active: None,
        };
        let created = ledger.create_category(&new).unwrap();
        assert_eq!(created.icon, DEFAULT_CATEGORY_ICON);
        assert!(matches!(
            ledger.create_category(&NewCategory { name: "EXTRA".into(), ..new.clone() }),
            Err(Error::Conflict(_))
        ));
        ledger
            .create_category(&NewCategory {
                kind: TransactionType::Income,
                ..new
            })
            .unwrap();
    }

    #[test]
    fn test_chat_category_defaults() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let created = ledger
            .get_or_create_category("Transporte", TransactionType::Expense)
            .unwrap();
        assert_eq!(created.icon, CHAT_CATEGORY_ICON);
        assert_eq!(created.color, DEFAULT_CATEGORY_COLOR);

        let again = ledger
            .get_or_create_category("transporte", TransactionType::Expense)
            .unwrap();
        assert_eq!(created.id, again.id);
    }

    // ========== Transactions ==========

    #[test]
    fn test_type_always_copied_from_category() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, salary) = seed(&ledger);

        let tx = ledger
            .insert_transaction(&new_tx(account.id, salary.id, "Bônus", 300.0, date(2024, 5, 5)))
            .unwrap();
        assert_eq!(tx.kind, TransactionType::Income);

        let tx = ledger
            .update_transaction(
                tx.id,
                &TransactionPatch {
                    category_id: Some(food.id),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(tx.kind, TransactionType::Expense);

        // Changing the category's type carries over to its transactions
        ledger
            .update_category(
                food.id,
                &NewCategory {
                    name: food.name.clone(),
                    kind: TransactionType::Income,
                    icon: None,
                    color: None,
                    active: None,
                },
            )
            .unwrap();
        let tx = ledger.get_transaction(tx.id).unwrap().unwrap();
        assert_eq!(tx.kind, TransactionType::Income);
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        for amount in [0.0, -5.0, 0.001] {
            let err = ledger
                .insert_transaction(&new_tx(account.id, food.id, "Nada", amount, date(2024, 5, 5)))
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    #[test]
    fn test_amount_above_ceiling_rejected() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        let max = from_cents(MAX_AMOUNT_CENTS);

        assert!(ledger
            .insert_transaction(&new_tx(account.id, food.id, "Casa", max, date(2024, 5, 5)))
            .is_ok());
        for amount in [max + 0.01, 1e17, f64::MAX] {
            let err = ledger
                .insert_transaction(&new_tx(account.id, food.id, "Demais", amount, date(2024, 5, 5)))
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }

        // Sums over the stored ceiling still fit
        let may = ReportPeriod::month(2024, 5).unwrap();
        let summary = ledger.period_summary(may, None, None).unwrap();
        assert_eq!(summary.expense_total, max);
    }

    #[test]
    fn test_references_must_share_household() {
        let (db, _, household) = setup();
        let other_member = db.register_member("joao@example.com", "João", None).unwrap();
        let other = db.create_household(other_member.id, "Casa Souza").unwrap();

        let (account, food, _) = seed(&db.ledger(household.id));
        let (other_account, other_food, _) = seed(&db.ledger(other.id));

        let ledger = db.ledger(household.id);
        assert!(ledger
            .insert_transaction(&new_tx(other_account.id, food.id, "X", 10.0, date(2024, 5, 5)))
            .is_err());
        assert!(ledger
            .insert_transaction(&new_tx(account.id, other_food.id, "X", 10.0, date(2024, 5, 5)))
            .is_err());

        let mut split = new_tx(account.id, food.id, "Jantar", 90.0, date(2024, 5, 5));
        split.split_with = vec![other_member.id];
        assert!(matches!(ledger.insert_transaction(&split), Err(Error::Validation(_))));
    }

    #[test]
    fn test_splits_round_trip_without_payer() {
        let (db, ana, household) = setup();
        let bia = db.register_member("bia@example.com", "Bia", None).unwrap();
        db.join_household(bia.id, &household.invite_code).unwrap();

        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        let mut new = new_tx(account.id, food.id, "Jantar", 90.0, date(2024, 5, 5));
        new.payer_id = Some(ana.id);
        new.split_with = vec![bia.id, ana.id];

        let tx = ledger.insert_transaction(&new).unwrap();
        assert_eq!(tx.split_with, vec![bia.id]);
        assert_eq!(tx.split_amount(), 45.0);
    }

    #[test]
    fn test_update_changes_only_patched_fields() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        let tx = ledger
            .insert_transaction(&new_tx(account.id, food.id, "Almoço", 100.0, date(2024, 5, 5)))
            .unwrap();

        let updated = ledger
            .update_transaction(
                tx.id,
                &TransactionPatch {
                    amount: Some(150.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.amount, 150.0);
        assert_eq!(updated.title, "Almoço");
        assert_eq!(updated.category_id, food.id);
        assert_eq!(updated.account_id, account.id);
        assert_eq!(updated.date, tx.date);
    }

    #[test]
    fn test_list_transactions_order_and_totals() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, salary) = seed(&ledger);

        ledger
            .insert_transaction(&new_tx(account.id, food.id, "Antigo", 10.0, date(2024, 4, 1)))
            .unwrap();
        ledger
            .insert_transaction(&new_tx(account.id, salary.id, "Salário", 200.0, date(2024, 5, 1)))
            .unwrap();
        let mut pending = new_tx(account.id, food.id, "Rascunho", 70.0, date(2024, 5, 3));
        pending.status = TransactionStatus::Pending;
        ledger.insert_transaction(&pending).unwrap();

        let page = ledger.list_transactions(ledger.filter(), 2, 0).unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.transactions.len(), 2);
        assert_eq!(page.transactions[0].title, "Rascunho");
        assert_eq!(page.income_total, 200.0);
        assert_eq!(page.expense_total, 10.0);
        assert_eq!(page.balance, 190.0);

        let filtered = ledger
            .list_transactions(
                ledger
                    .filter()
                    .kind(Some(TransactionType::Expense))
                    .date_range(Some(date(2024, 5, 1)), None),
                50,
                0,
            )
            .unwrap();
        assert_eq!(filtered.total_count, 1);
        assert_eq!(filtered.expense_total, 0.0);
    }

    #[test]
    fn test_search_by_criteria_is_household_scoped_and_unicode_aware() {
        let (db, _, household) = setup();
        let other_member = db.register_member("joao@example.com", "João", None).unwrap();
        let other = db.create_household(other_member.id, "Casa Souza").unwrap();

        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        ledger
            .insert_transaction(&new_tx(account.id, food.id, "Almoço", 100.0, date(2024, 5, 5)))
            .unwrap();

        let other_ledger = db.ledger(other.id);
        let (oa, of, _) = seed(&other_ledger);
        other_ledger
            .insert_transaction(&new_tx(oa.id, of.id, "Almoço", 100.0, date(2024, 5, 5)))
            .unwrap();

        let criteria = TransactionCriteria {
            category: Some("ALIMENTAÇÃO".into()),
            ..Default::default()
        };
        let found = ledger.search_by_criteria(&criteria).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].household_id, household.id);

        let criteria = TransactionCriteria {
            min_amount: Some(100.0),
            max_amount: Some(100.0),
            date: Some(date(2024, 5, 5)),
            ..Default::default()
        };
        assert_eq!(ledger.search_by_criteria(&criteria).unwrap().len(), 1);
    }

    #[test]
    fn test_search_by_criteria_caps_results() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        for day in 1..=12 {
            ledger
                .insert_transaction(&new_tx(account.id, food.id, "Café", 5.0, date(2024, 5, day)))
                .unwrap();
        }
        let found = ledger
            .search_by_criteria(&TransactionCriteria::default())
            .unwrap();
        assert_eq!(found.len(), CRITERIA_MATCH_LIMIT);
        assert_eq!(found[0].date, date(2024, 5, 12));
    }

    // ========== Drafts ==========

    fn backdate(db: &Database, id: i64, days: i64) {
        db.conn()
            .unwrap()
            .execute(
                "UPDATE transactions SET created_at = datetime('now', ?) WHERE id = ?",
                rusqlite::params![format!("-{} days", days), id],
            )
            .unwrap();
    }

    #[test]
    fn test_find_pending_draft_window_and_recency() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        let window = chrono::Duration::days(2);
        let on = date(2024, 5, 5);

        let mut draft = new_tx(account.id, food.id, "Rascunho", 20.0, on);
        draft.status = TransactionStatus::Pending;
        let older = ledger.insert_transaction(&draft).unwrap();
        let newer = ledger.insert_transaction(&draft).unwrap();
        backdate(&db, older.id, 1);

        let lookup = DraftLookup::AmountDate { amount: 20.0, date: on };
        let found = ledger.find_pending_draft(lookup, window).unwrap().unwrap();
        assert_eq!(found.id, newer.id);

        backdate(&db, newer.id, 3);
        let found = ledger.find_pending_draft(lookup, window).unwrap().unwrap();
        assert_eq!(found.id, older.id);

        backdate(&db, older.id, 3);
        assert!(ledger.find_pending_draft(lookup, window).unwrap().is_none());
    }

    #[test]
    fn test_explicit_draft_must_belong_to_household() {
        let (db, _, household) = setup();
        let other_member = db.register_member("joao@example.com", "João", None).unwrap();
        let other = db.create_household(other_member.id, "Casa Souza").unwrap();

        let other_ledger = db.ledger(other.id);
        let (oa, of, _) = seed(&other_ledger);
        let mut draft = new_tx(oa.id, of.id, "Rascunho", 20.0, date(2024, 5, 5));
        draft.status = TransactionStatus::Pending;
        let foreign = other_ledger.insert_transaction(&draft).unwrap();

        let found = db
            .ledger(household.id)
            .find_pending_draft(DraftLookup::Explicit(foreign.id), chrono::Duration::days(2))
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_promote_draft_once() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        let window = chrono::Duration::days(2);

        let mut draft = new_tx(account.id, food.id, "Rascunho", 20.0, date(2024, 5, 5));
        draft.status = TransactionStatus::Pending;
        let draft_row = ledger.insert_transaction(&draft).unwrap();

        let resolved = new_tx(account.id, food.id, "Padaria", 20.0, date(2024, 5, 5));
        let promoted = ledger
            .promote_draft(draft_row.id, &resolved, window)
            .unwrap()
            .unwrap();
        assert_eq!(promoted.id, draft_row.id);
        assert_eq!(promoted.status, TransactionStatus::Paid);
        assert_eq!(promoted.title, "Padaria");

        assert!(ledger
            .promote_draft(draft_row.id, &resolved, window)
            .unwrap()
            .is_none());
        assert_eq!(ledger.list_transactions(ledger.filter(), 10, 0).unwrap().total_count, 1);
    }

    // ========== Reports & goals ==========

    #[test]
    fn test_period_summary_totals() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, salary) = seed(&ledger);
        let transport = ledger
            .get_or_create_category("Transporte", TransactionType::Expense)
            .unwrap();

        ledger
            .insert_transaction(&new_tx(account.id, food.id, "Mercado", 100.0, date(2024, 5, 2)))
            .unwrap();
        ledger
            .insert_transaction(&new_tx(account.id, transport.id, "Uber", 50.0, date(2024, 5, 3)))
            .unwrap();
        ledger
            .insert_transaction(&new_tx(account.id, salary.id, "Salário", 200.0, date(2024, 5, 5)))
            .unwrap();
        let mut pending = new_tx(account.id, food.id, "Rascunho", 999.0, date(2024, 5, 6));
        pending.status = TransactionStatus::Pending;
        ledger.insert_transaction(&pending).unwrap();

        let may = ReportPeriod::month(2024, 5).unwrap();
        let summary = ledger.period_summary(may, None, None).unwrap();
        assert_eq!(summary.expense_total, 150.0);
        assert_eq!(summary.expense_count, 2);
        assert_eq!(summary.income_total, 200.0);
        assert_eq!(summary.balance, 50.0);
        assert_eq!(summary.expense_ratio(), Some(75.0));
        assert_eq!(summary.top_expense_categories[0].category, "Alimentação");

        let only_food = ledger.period_summary(may, Some("aliment"), None).unwrap();
        assert_eq!(only_food.expense_total, 100.0);
        assert_eq!(only_food.income_total, 0.0);
    }

    #[test]
    fn test_reports_are_household_scoped() {
        let (db, _, household) = setup();
        let other_member = db.register_member("joao@example.com", "João", None).unwrap();
        let other = db.create_household(other_member.id, "Casa Souza").unwrap();
        let other_ledger = db.ledger(other.id);
        let (oa, of, _) = seed(&other_ledger);
        other_ledger
            .insert_transaction(&new_tx(oa.id, of.id, "Mercado", 100.0, date(2024, 5, 2)))
            .unwrap();

        let summary = db
            .ledger(household.id)
            .period_summary(ReportPeriod::month(2024, 5).unwrap(), None, None)
            .unwrap();
        assert_eq!(summary.expense_total, 0.0);
    }

    #[test]
    fn test_overview_has_twelve_months() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, _) = seed(&ledger);
        ledger
            .insert_transaction(&new_tx(account.id, food.id, "Mercado", 100.0, date(2024, 1, 10)))
            .unwrap();

        let overview = ledger.overview(date(2024, 5, 15)).unwrap();
        assert_eq!(overview.monthly.len(), 12);
        assert_eq!(overview.monthly[0].month, date(2023, 6, 1));
        assert_eq!(overview.monthly[11].month, date(2024, 5, 1));
        assert_eq!(overview.monthly[7].expense, 100.0);
        assert_eq!(overview.expense_by_account[0].total, 100.0);
    }

    #[test]
    fn test_dashboard_month_figures() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, salary) = seed(&ledger);
        ledger
            .insert_transaction(&new_tx(account.id, salary.id, "Salário", 300.0, date(2024, 4, 30)))
            .unwrap();
        ledger
            .insert_transaction(&new_tx(account.id, food.id, "Mercado", 80.0, date(2024, 5, 2)))
            .unwrap();

        let dashboard = ledger.dashboard(date(2024, 5, 15)).unwrap();
        assert_eq!(dashboard.total_balance, 220.0);
        assert_eq!(dashboard.income_total, 300.0);
        assert_eq!(dashboard.month_income, 0.0);
        assert_eq!(dashboard.month_expense, 80.0);
        assert_eq!(dashboard.month_balance, -80.0);
        assert_eq!(dashboard.recent_transactions.len(), 2);
        assert_eq!(dashboard.accounts.len(), 1);
    }

    #[test]
    fn test_goal_upsert_replaces_amount() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let goal = NewGoal {
            goal_type: GoalType::SpendingCap,
            category_id: None,
            amount: 1000.0,
            month: 5,
            year: 2024,
        };
        let first = ledger.upsert_goal(&goal).unwrap();
        let second = ledger
            .upsert_goal(&NewGoal {
                amount: 1500.0,
                ..goal.clone()
            })
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.amount, 1500.0);
        assert_eq!(ledger.list_goals(5, 2024).unwrap().len(), 1);

        let err = ledger
            .upsert_goal(&NewGoal { amount: 1e17, ..goal.clone() })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_category_cap_requires_expense_category() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (_, food, salary) = seed(&ledger);

        let cap = NewGoal {
            goal_type: GoalType::CategoryCap,
            category_id: None,
            amount: 300.0,
            month: 5,
            year: 2024,
        };
        assert!(matches!(ledger.upsert_goal(&cap), Err(Error::Validation(_))));
        assert!(ledger
            .upsert_goal(&NewGoal {
                category_id: Some(salary.id),
                ..cap.clone()
            })
            .is_err());
        let goal = ledger
            .upsert_goal(&NewGoal {
                category_id: Some(food.id),
                ..cap
            })
            .unwrap();
        assert_eq!(goal.category_name.as_deref(), Some("Alimentação"));
    }

    #[test]
    fn test_goal_progress() {
        let (db, _, household) = setup();
        let ledger = db.ledger(household.id);
        let (account, food, salary) = seed(&ledger);
        ledger
            .insert_transaction(&new_tx(account.id, food.id, "Mercado", 400.0, date(2024, 5, 2)))
            .unwrap();
        ledger
            .insert_transaction(&new_tx(account.id, salary.id, "Salário", 1000.0, date(2024, 5, 5)))
            .unwrap();

        for (goal_type, category_id, amount) in [
            (GoalType::CategoryCap, Some(food.id), 300.0),
            (GoalType::SavingsTarget, None, 500.0),
        ] {
            ledger
                .upsert_goal(&NewGoal {
                    goal_type,
                    category_id,
                    amount,
                    month: 5,
                    year: 2024,
                })
                .unwrap();
        }

        let progress = ledger.goal_progress(5, 2024).unwrap();
        let cap = progress
            .iter()
            .find(|p| p.goal.goal_type == GoalType::CategoryCap)
            .unwrap();
        assert_eq!(cap.current, 400.0);
        assert!(cap.over_limit);

        let savings = progress
            .iter()
            .find(|p| p.goal.goal_type == GoalType::SavingsTarget)
            .unwrap();
        assert_eq!(savings.current, 600.0);
        assert!(savings.reached);
    }

    // ========== Conversation log ==========

    #[test]
    fn test_conversation_history_oldest_first() {
        let (db, ana, _) = setup();
        for i in 0..3 {
            db.append_conversation(
                ana.id,
                &format!("mensagem {}", i),
                "ok",
                Some("greeting"),
                None,
            )
            .unwrap();
        }
        let history = db.recent_conversation(ana.id, 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user_message, "mensagem 1");
        assert_eq!(history[1].user_message, "mensagem 2");
    }
}
