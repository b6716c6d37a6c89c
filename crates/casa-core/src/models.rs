//! Domain models for Casa

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default account color tag
pub const DEFAULT_ACCOUNT_COLOR: &str = "#007bff";

/// Default category color
pub const DEFAULT_CATEGORY_COLOR: &str = "#6c757d";

/// Default category icon (Bootstrap Icons class)
pub const DEFAULT_CATEGORY_ICON: &str = "bi-tag";

/// Maximum number of members in one household
pub const MAX_HOUSEHOLD_MEMBERS: i64 = 2;

/// Largest amount a single transaction or goal may carry, in cents (R$ 1 bilhão)
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

/// Convert a currency amount to integer cents
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Whether an amount is storable: at least one cent after rounding and
/// within [`MAX_AMOUNT_CENTS`]
pub fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && (1..=MAX_AMOUNT_CENTS).contains(&to_cents(amount))
}

/// Convert integer cents back to a currency amount
pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// A shared-finances unit owning all monetary data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Household {
    pub id: i64,
    pub name: String,
    /// 8-character code other members use to join
    pub invite_code: String,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Household {
    /// Whether another member can still join
    pub fn has_vacancy(&self) -> bool {
        self.member_count < MAX_HOUSEHOLD_MEMBERS
    }
}

/// A person using the app, identified by email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub household_id: Option<i64>,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub biometric_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Kind of money container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
    Cash,
    Investment,
    Other,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
            Self::Cash => "cash",
            Self::Investment => "investment",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checking" | "conta_corrente" | "corrente" => Ok(Self::Checking),
            "savings" | "poupanca" => Ok(Self::Savings),
            "credit" | "cartao_credito" => Ok(Self::Credit),
            "cash" | "dinheiro" => Ok(Self::Cash),
            "investment" | "investimento" => Ok(Self::Investment),
            "other" | "outro" => Ok(Self::Other),
            _ => Err(format!("Unknown account kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A money container owned by a household
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub household_id: i64,
    pub name: String,
    pub kind: AccountKind,
    pub opening_balance: f64,
    pub color: String,
    pub active: bool,
    /// Opening balance plus income minus expenses (cancelled entries excluded)
    pub current_balance: f64,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or updating an account
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub opening_balance: f64,
    pub color: Option<String>,
    pub active: Option<bool>,
}

/// Direction of a transaction (and type of a category)
///
/// Accepts the Portuguese names the classifier uses on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    #[serde(rename = "expense", alias = "despesa")]
    Expense,
    #[serde(rename = "income", alias = "receita")]
    Income,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }

    /// Portuguese label used in chat replies
    pub fn label(&self) -> &'static str {
        match self {
            Self::Expense => "Despesa",
            Self::Income => "Receita",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" | "despesa" => Ok(Self::Expense),
            "income" | "receita" => Ok(Self::Income),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed label owned by a household
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub household_id: i64,
    pub name: String,
    pub kind: TransactionType,
    pub icon: String,
    pub color: String,
    pub active: bool,
}

/// Input for creating or updating a category
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub kind: TransactionType,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub active: Option<bool>,
}

/// Lifecycle status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Draft awaiting clarification
    #[serde(rename = "pending", alias = "pendente")]
    Pending,
    #[serde(rename = "paid", alias = "paga")]
    Paid,
    #[serde(rename = "cancelled", alias = "cancelada")]
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "pendente" => Ok(Self::Pending),
            "paid" | "paga" => Ok(Self::Paid),
            "cancelled" | "cancelada" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recurrence frequency of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" | "semanal" => Ok(Self::Weekly),
            "monthly" | "mensal" => Ok(Self::Monthly),
            "yearly" | "anual" => Ok(Self::Yearly),
            _ => Err(format!("Unknown recurrence: {}", s)),
        }
    }
}

/// A ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub household_id: i64,
    pub account_id: i64,
    pub account_name: String,
    pub category_id: i64,
    pub category_name: String,
    /// Always equal to the category's type
    pub kind: TransactionType,
    pub title: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub status: TransactionStatus,
    pub note: String,
    pub payer_id: Option<i64>,
    /// Other members splitting the cost with the payer
    pub split_with: Vec<i64>,
    pub recurrence: Option<Recurrence>,
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Each person's share when the cost is split, otherwise the full amount
    pub fn split_amount(&self) -> f64 {
        if self.split_with.is_empty() {
            self.amount
        } else {
            self.amount / (self.split_with.len() as f64 + 1.0)
        }
    }
}

/// Input for inserting a transaction
///
/// There is no type field: the type is always taken from the category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub account_id: i64,
    pub category_id: i64,
    pub title: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default = "default_status")]
    pub status: TransactionStatus,
    #[serde(default)]
    pub note: String,
    pub payer_id: Option<i64>,
    #[serde(default)]
    pub split_with: Vec<i64>,
    pub recurrence: Option<Recurrence>,
    pub attachment: Option<String>,
}

fn default_status() -> TransactionStatus {
    TransactionStatus::Paid
}

/// Partial update of a transaction; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPatch {
    pub account_id: Option<i64>,
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub status: Option<TransactionStatus>,
    pub note: Option<String>,
    pub split_with: Option<Vec<i64>>,
    pub recurrence: Option<Recurrence>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.account_id.is_none()
            && self.category_id.is_none()
            && self.title.is_none()
            && self.amount.is_none()
            && self.date.is_none()
            && self.status.is_none()
            && self.note.is_none()
            && self.split_with.is_none()
            && self.recurrence.is_none()
    }
}

/// Search criteria used to resolve an edit target
///
/// Text fields match as case-insensitive substrings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionCriteria {
    pub category: Option<String>,
    pub account: Option<String>,
    pub title_contains: Option<String>,
    pub date: Option<NaiveDate>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

impl TransactionCriteria {
    /// True when nothing identifies a transaction
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.account.is_none()
            && self.title_contains.is_none()
            && self.date.is_none()
            && self.min_amount.is_none()
            && self.max_amount.is_none()
    }
}

/// Kind of monthly goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Cap on total monthly expenses
    SpendingCap,
    /// Target for income minus expenses
    SavingsTarget,
    /// Cap on one category's monthly expenses
    CategoryCap,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpendingCap => "spending_cap",
            Self::SavingsTarget => "savings_target",
            Self::CategoryCap => "category_cap",
        }
    }
}

impl std::str::FromStr for GoalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spending_cap" | "spending" | "limite_gastos" => Ok(Self::SpendingCap),
            "savings_target" | "savings" | "economia" => Ok(Self::SavingsTarget),
            "category_cap" | "category" | "limite_categoria" => Ok(Self::CategoryCap),
            _ => Err(format!("Unknown goal type: {}", s)),
        }
    }
}

impl std::fmt::Display for GoalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A per-household monthly target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub household_id: i64,
    pub goal_type: GoalType,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub amount: f64,
    pub month: u32,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for defining a goal (upsert)
#[derive(Debug, Clone, Deserialize)]
pub struct NewGoal {
    pub goal_type: GoalType,
    pub category_id: Option<i64>,
    pub amount: f64,
    pub month: u32,
    pub year: i32,
}

/// Where a goal stands for its month
#[derive(Debug, Clone, Serialize)]
pub struct GoalProgress {
    pub goal: Goal,
    /// Amount spent (caps) or saved (savings target)
    pub current: f64,
    pub percent: f64,
    pub remaining: f64,
    /// Cap exceeded (caps) or target reached (savings)
    pub over_limit: bool,
    pub reached: bool,
}

/// Append-only record of one chat exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: i64,
    pub member_id: i64,
    pub user_message: String,
    pub assistant_reply: String,
    pub intent: Option<String>,
    pub transcribed_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inclusive date range for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportPeriod {
    /// The whole calendar month, or `None` for an invalid month
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let from = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            from,
            to: next.pred_opt()?,
        })
    }

    /// The calendar month containing `day`
    pub fn month_of(day: NaiveDate) -> Self {
        use chrono::Datelike;
        Self::month(day.year(), day.month()).unwrap_or(Self { from: day, to: day })
    }
}

/// Totals for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub color: String,
    pub kind: TransactionType,
    pub total: f64,
    pub count: i64,
}

/// Paid income/expense totals over a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: ReportPeriod,
    pub income_total: f64,
    pub income_count: i64,
    pub expense_total: f64,
    pub expense_count: i64,
    pub balance: f64,
    /// Largest expense categories, at most five
    pub top_expense_categories: Vec<CategoryTotal>,
}

impl PeriodSummary {
    /// Expenses as a percentage of income, when there is income
    pub fn expense_ratio(&self) -> Option<f64> {
        (self.income_total > 0.0).then(|| self.expense_total / self.income_total * 100.0)
    }
}

/// Account with derived balance, for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub balance: f64,
}

/// Household landing page figures
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub household: Household,
    pub total_balance: f64,
    pub income_total: f64,
    pub expense_total: f64,
    pub month_income: f64,
    pub month_expense: f64,
    pub month_balance: f64,
    pub recent_transactions: Vec<Transaction>,
    pub accounts: Vec<AccountBalance>,
    pub month_expense_categories: Vec<CategoryTotal>,
}

/// One month of the trailing overview
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTotals {
    /// First day of the month
    pub month: NaiveDate,
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

/// Named total, used for per-account breakdowns
#[derive(Debug, Clone, Serialize)]
pub struct NamedTotal {
    pub name: String,
    pub total: f64,
}

/// Trailing twelve-month report
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub period: ReportPeriod,
    pub expense_by_category: Vec<CategoryTotal>,
    pub income_by_category: Vec<CategoryTotal>,
    pub expense_by_account: Vec<NamedTotal>,
    /// Oldest month first
    pub monthly: Vec<MonthlyTotals>,
}

/// Previously used title, for entry autocomplete
#[derive(Debug, Clone, Serialize)]
pub struct TitleSuggestion {
    pub title: String,
    pub category_id: i64,
    pub average_amount: f64,
    pub count: i64,
}
