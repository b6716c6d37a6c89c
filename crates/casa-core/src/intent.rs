//! Typed classifier output
//!
//! The classifier answers with a loosely shaped JSON object. This module
//! turns it into a [`Classification`] whose [`Intent`] carries exactly the
//! payload its variant needs. Parsing never fails once an object was
//! received: bad fields become `None`, a missing or unknown intent becomes
//! [`Intent::Unknown`], and every repair is recorded as a deviation.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{is_valid_amount, GoalType, TransactionCriteria, TransactionType};

/// Reply used when the classifier gave no usable message
pub const FALLBACK_ASSISTANT_MESSAGE: &str = "Desculpe, não consegui entender. Pode reformular?";

/// One transaction as described by the user
///
/// Every field is optional: a draft may be incomplete, and in an edit only
/// the fields present are changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    #[serde(rename = "type", default, deserialize_with = "lenient::kind")]
    pub kind: Option<TransactionType>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub account: Option<String>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub notes: Option<String>,
}

impl TransactionDraft {
    /// A draft can be persisted only with an amount that survives rounding
    /// to cents and stays within the storable range
    pub fn has_required_data(&self) -> bool {
        self.amount.is_some_and(is_valid_amount)
    }

    /// Nothing to change
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// The `transaction` payload of a create: one object or a list
#[derive(Debug, Clone, PartialEq)]
pub enum Drafts {
    One(TransactionDraft),
    Many(Vec<TransactionDraft>),
}

/// Kind of report the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    MonthTotal,
    CategoryTotal,
    PeriodTotal,
    ListTransactions,
    Balance,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PeriodRequest {
    #[serde(default, deserialize_with = "lenient::date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub end_date: Option<NaiveDate>,
}

/// Parameters of a `query_summary`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReportQuery {
    #[serde(default, deserialize_with = "lenient::summary_type")]
    pub summary_type: Option<SummaryType>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub category: Option<String>,
    /// `None` also stands for "todas"
    #[serde(rename = "type", default, deserialize_with = "lenient::kind")]
    pub kind: Option<TransactionType>,
    #[serde(default, deserialize_with = "lenient::period")]
    pub period: Option<PeriodRequest>,
}

/// Month a goal applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoalPeriod {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// Parameters of `set_goal` and `check_goal`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GoalRequest {
    #[serde(rename = "type", default, deserialize_with = "lenient::goal_type")]
    pub goal_type: Option<GoalType>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::goal_period")]
    pub period: GoalPeriod,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawCriteria {
    #[serde(default, deserialize_with = "lenient::text")]
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    account: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    title_contains: Option<String>,
    #[serde(default, deserialize_with = "lenient::date")]
    date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::amount")]
    min_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::amount")]
    max_amount: Option<f64>,
}

impl From<RawCriteria> for TransactionCriteria {
    fn from(raw: RawCriteria) -> Self {
        Self {
            category: raw.category,
            account: raw.account,
            title_contains: raw.title_contains,
            date: raw.date,
            min_amount: raw.min_amount,
            max_amount: raw.max_amount,
        }
    }
}

/// What the user wants, with the payload each action needs
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    CreateTransaction(Drafts),
    EditTransaction {
        criteria: TransactionCriteria,
        patch: TransactionDraft,
    },
    QuerySummary(ReportQuery),
    SetGoal(GoalRequest),
    CheckGoal(GoalRequest),
    Greeting,
    Clarification,
    SmallTalk,
    Unknown,
}

impl Intent {
    /// Wire name of the intent
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTransaction(_) => "create_transaction",
            Self::EditTransaction { .. } => "edit_transaction",
            Self::QuerySummary(_) => "query_summary",
            Self::SetGoal(_) => "set_goal",
            Self::CheckGoal(_) => "check_goal",
            Self::Greeting => "greeting",
            Self::Clarification => "clarification",
            Self::SmallTalk => "small_talk",
            Self::Unknown => "unknown",
        }
    }

    /// Intents answered with text only
    pub fn is_conversational(&self) -> bool {
        matches!(
            self,
            Self::Greeting | Self::Clarification | Self::SmallTalk | Self::Unknown
        )
    }
}

/// Parsed classifier answer
#[derive(Debug, Clone)]
pub struct Classification {
    pub intent: Intent,
    pub clarification_needed: bool,
    pub assistant_message: String,
    /// The classifier gave no usable message; `assistant_message` is the fallback
    pub message_repaired: bool,
    pub confidence: Option<f64>,
    /// Repairs made while parsing
    pub deviations: Vec<String>,
    /// The object exactly as received
    pub raw: Value,
}

impl Classification {
    /// Apology used when the classifier could not be reached
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            intent: Intent::Unknown,
            clarification_needed: false,
            assistant_message: message.into(),
            message_repaired: false,
            confidence: None,
            deviations: Vec::new(),
            raw: Value::Null,
        }
    }

    /// Build a classification from the object the model returned
    pub fn from_value(raw: Value) -> Self {
        let mut deviations = Vec::new();

        let intent_name = raw.get("intent").and_then(Value::as_str).map(str::trim);
        let intent = match intent_name {
            Some("create_transaction") => {
                Intent::CreateTransaction(drafts(raw.get("transaction"), &mut deviations))
            }
            Some("edit_transaction") => Intent::EditTransaction {
                criteria: object::<RawCriteria>(
                    raw.get("search_criteria"),
                    "search_criteria",
                    &mut deviations,
                )
                .into(),
                patch: object(raw.get("transaction"), "transaction", &mut deviations),
            },
            Some("query_summary") => {
                Intent::QuerySummary(object(raw.get("query"), "query", &mut deviations))
            }
            Some("set_goal") => Intent::SetGoal(object(raw.get("goal"), "goal", &mut deviations)),
            Some("check_goal") => {
                Intent::CheckGoal(object(raw.get("goal"), "goal", &mut deviations))
            }
            Some("greeting") => Intent::Greeting,
            Some("clarification") => Intent::Clarification,
            Some("small_talk") => Intent::SmallTalk,
            Some("unknown") => Intent::Unknown,
            Some(other) => {
                deviations.push(format!("unknown intent '{}'", other));
                Intent::Unknown
            }
            None => {
                deviations.push("missing intent".to_string());
                Intent::Unknown
            }
        };

        let (assistant_message, message_repaired) = match raw
            .get("assistant_message")
            .and_then(Value::as_str)
            .map(str::trim)
        {
            Some(message) if !message.is_empty() => (message.to_string(), false),
            _ => {
                deviations.push("missing assistant_message".to_string());
                (FALLBACK_ASSISTANT_MESSAGE.to_string(), true)
            }
        };

        let clarification_needed = match raw.get("clarification_needed") {
            None | Some(Value::Null) => false,
            Some(value) => lenient::flag_value(value).unwrap_or_else(|| {
                deviations.push("clarification_needed is not a boolean".to_string());
                false
            }),
        };

        let confidence = raw
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|c| c.clamp(0.0, 1.0));

        Self {
            intent,
            clarification_needed,
            assistant_message,
            message_repaired,
            confidence,
            deviations,
            raw,
        }
    }
}

fn drafts(value: Option<&Value>, deviations: &mut Vec<String>) -> Drafts {
    match value {
        Some(Value::Array(items)) => Drafts::Many(
            items
                .iter()
                .map(|item| object(Some(item), "transaction item", deviations))
                .collect(),
        ),
        other => Drafts::One(object(other, "transaction", deviations)),
    }
}

/// Deserialize an optional sub-object, falling back to its default
fn object<T>(value: Option<&Value>, field: &str, deviations: &mut Vec<String>) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    match value {
        None | Some(Value::Null) => T::default(),
        Some(value @ Value::Object(_)) => {
            serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                deviations.push(format!("{} could not be read: {}", field, e));
                T::default()
            })
        }
        Some(_) => {
            deviations.push(format!("{} is not an object", field));
            T::default()
        }
    }
}

/// Field parsers that never fail: anything unusable becomes `None`
mod lenient {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{GoalPeriod, PeriodRequest, SummaryType};
    use crate::models::{GoalType, TransactionType};

    fn value<'de, D: Deserializer<'de>>(d: D) -> Result<Value, D::Error> {
        Value::deserialize(d)
    }

    pub fn flag_value(value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "sim" => Some(true),
                "false" | "não" | "nao" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_f64().map(|n| n != 0.0),
            _ => None,
        }
    }

    /// Amounts come as numbers or as Brazilian-formatted strings ("R$ 1.234,56")
    pub fn amount_value(value: &Value) -> Option<f64> {
        let amount = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let cleaned: String = s
                    .trim()
                    .trim_start_matches("R$")
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let normalized = if cleaned.contains(',') {
                    cleaned.replace('.', "").replace(',', ".")
                } else {
                    cleaned
                };
                normalized.parse().ok()
            }
            _ => None,
        }?;
        amount.is_finite().then_some(amount)
    }

    pub fn date_value(value: &Value) -> Option<NaiveDate> {
        let s = value.as_str()?.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
            .ok()
    }

    fn int_value(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(amount_value(&value(d)?))
    }

    pub fn date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        Ok(date_value(&value(d)?))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match value(d)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn kind<'de, D: Deserializer<'de>>(d: D) -> Result<Option<TransactionType>, D::Error> {
        Ok(value(d)?.as_str().and_then(|s| s.parse().ok()))
    }

    pub fn goal_type<'de, D: Deserializer<'de>>(d: D) -> Result<Option<GoalType>, D::Error> {
        Ok(value(d)?.as_str().and_then(|s| s.parse().ok()))
    }

    pub fn summary_type<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<SummaryType>, D::Error> {
        Ok(serde_json::from_value(value(d)?).ok())
    }

    pub fn period<'de, D: Deserializer<'de>>(d: D) -> Result<Option<PeriodRequest>, D::Error> {
        let v = value(d)?;
        Ok(v.is_object().then(|| PeriodRequest {
            start_date: v.get("start_date").and_then(date_value),
            end_date: v.get("end_date").and_then(date_value),
        }))
    }

    /// `{"month": 5, "year": 2024}`, `"2024-05"` or `"05/2024"`
    pub fn goal_period<'de, D: Deserializer<'de>>(d: D) -> Result<GoalPeriod, D::Error> {
        let v = value(d)?;
        let (month, year) = match &v {
            Value::Object(_) => (
                v.get("month").and_then(int_value),
                v.get("year").and_then(int_value),
            ),
            Value::String(s) => {
                let s = s.trim();
                if let Some((y, m)) = s.split_once('-') {
                    (m.parse().ok(), y.parse().ok())
                } else if let Some((m, y)) = s.split_once('/') {
                    (m.parse().ok(), y.parse().ok())
                } else {
                    (None, None)
                }
            }
            _ => (None, None),
        };
        Ok(GoalPeriod {
            month: month
                .and_then(|m| u32::try_from(m).ok())
                .filter(|m| (1..=12).contains(m)),
            year: year.and_then(|y| i32::try_from(y).ok()),
        })
    }
}

/// Parses through [`Classification::from_value`], so it never rejects an object
impl<'de> Deserialize<'de> for Classification {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_create() {
        let c = Classification::from_value(json!({
            "intent": "create_transaction",
            "clarification_needed": false,
            "assistant_message": "Anotado!",
            "transaction": {
                "type": "despesa",
                "amount": 45,
                "title": "Almoço",
                "category": "Alimentação",
                "date": "2024-05-15"
            },
            "confidence": 0.93
        }));

        assert!(c.deviations.is_empty());
        assert_eq!(c.confidence, Some(0.93));
        let Intent::CreateTransaction(Drafts::One(draft)) = c.intent else {
            panic!("expected a single draft");
        };
        assert_eq!(draft.kind, Some(TransactionType::Expense));
        assert_eq!(draft.amount, Some(45.0));
        assert_eq!(draft.category.as_deref(), Some("Alimentação"));
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 5, 15));
        assert!(draft.account.is_none());
    }

    #[test]
    fn test_array_create() {
        let c = Classification::from_value(json!({
            "intent": "create_transaction",
            "assistant_message": "Dois lançamentos",
            "transaction": [
                {"type": "despesa", "amount": 10, "title": "Café"},
                {"type": "despesa", "amount": "12,50", "title": "Pão"}
            ]
        }));
        let Intent::CreateTransaction(Drafts::Many(items)) = c.intent else {
            panic!("expected many drafts");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].amount, Some(12.5));
    }

    #[test]
    fn test_lenient_fields() {
        let draft: TransactionDraft = serde_json::from_value(json!({
            "type": "gasto",
            "amount": "R$ 1.234,56",
            "title": "  ",
            "date": "ontem",
            "notes": 42
        }))
        .unwrap();
        assert_eq!(draft.kind, None);
        assert_eq!(draft.amount, Some(1234.56));
        assert_eq!(draft.title, None);
        assert_eq!(draft.date, None);
        assert_eq!(draft.notes.as_deref(), Some("42"));

        let draft: TransactionDraft =
            serde_json::from_value(json!({"date": "15/05/2024", "amount": null})).unwrap();
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 5, 15));
        assert!(!draft.has_required_data());
    }

    #[test]
    fn test_missing_fields_are_repaired() {
        let c = Classification::from_value(json!({"transaction": {"amount": 5}}));
        assert_eq!(c.intent, Intent::Unknown);
        assert_eq!(c.assistant_message, FALLBACK_ASSISTANT_MESSAGE);
        assert!(c.message_repaired);
        assert!(!c.clarification_needed);
        assert_eq!(c.deviations.len(), 2);
        assert_eq!(c.raw["transaction"]["amount"], 5);

        let c = Classification::from_value(json!({
            "intent": "transfer_money",
            "assistant_message": "Ok"
        }));
        assert_eq!(c.intent, Intent::Unknown);
        assert!(c.deviations[0].contains("transfer_money"));
    }

    #[test]
    fn test_edit_payload() {
        let c = Classification::from_value(json!({
            "intent": "edit_transaction",
            "clarification_needed": "false",
            "assistant_message": "Vou ajustar",
            "search_criteria": {"category": "alimentação", "min_amount": 90},
            "transaction": {"amount": 150}
        }));
        assert!(!c.clarification_needed);
        let Intent::EditTransaction { criteria, patch } = c.intent else {
            panic!("expected edit");
        };
        assert_eq!(criteria.category.as_deref(), Some("alimentação"));
        assert_eq!(criteria.min_amount, Some(90.0));
        assert_eq!(patch.amount, Some(150.0));
        assert!(patch.category.is_none());
    }

    #[test]
    fn test_query_payload() {
        let c = Classification::from_value(json!({
            "intent": "query_summary",
            "assistant_message": "Aqui está",
            "query": {
                "summary_type": "category_total",
                "category": "Mercado",
                "type": "todas",
                "period": {"start_date": "2024-05-01", "end_date": "2024-05-31"}
            }
        }));
        let Intent::QuerySummary(query) = c.intent else {
            panic!("expected query");
        };
        assert_eq!(query.summary_type, Some(SummaryType::CategoryTotal));
        assert_eq!(query.kind, None);
        let period = query.period.unwrap();
        assert_eq!(period.end_date, NaiveDate::from_ymd_opt(2024, 5, 31));
    }

    #[test]
    fn test_goal_period_forms() {
        let goal: GoalRequest = serde_json::from_value(json!({
            "type": "category_cap",
            "amount": 800,
            "category": "Mercado",
            "period": {"month": "5", "year": 2024}
        }))
        .unwrap();
        assert_eq!(goal.goal_type, Some(GoalType::CategoryCap));
        assert_eq!(goal.period, GoalPeriod { month: Some(5), year: Some(2024) });

        let goal: GoalRequest = serde_json::from_value(json!({"period": "2024-13"})).unwrap();
        assert_eq!(goal.period, GoalPeriod { month: None, year: Some(2024) });
    }

    #[test]
    fn test_non_object_payload_is_a_deviation() {
        let c = Classification::from_value(json!({
            "intent": "query_summary",
            "assistant_message": "Ok",
            "query": "mês atual"
        }));
        assert_eq!(c.intent, Intent::QuerySummary(ReportQuery::default()));
        assert_eq!(c.deviations, vec!["query is not an object".to_string()]);
    }
}
