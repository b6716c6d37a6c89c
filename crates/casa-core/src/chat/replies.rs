//! Reply text in Brazilian Portuguese

use chrono::NaiveDate;

use crate::intent::{Intent, TransactionDraft};
use crate::models::{to_cents, Transaction, TransactionType};

pub const CLASSIFIER_UNAVAILABLE: &str =
    "Desculpe, estou com dificuldades para processar sua mensagem agora. Tente novamente em instantes.";

pub const TRANSCRIPTION_FAILED: &str =
    "Não foi possível transcrever o áudio enviado. Tente novamente ou digite a mensagem.";

pub const SAVE_FAILED: &str =
    "Desculpe, não consegui concluir essa operação agora. Tente novamente em instantes.";

/// Opening of an action reply when the classifier gave no message
pub const ACKNOWLEDGED: &str = "Certo!";

/// Placeholder stored in the log for a voice message that could not be transcribed
pub const UNTRANSCRIBED_AUDIO: &str = "[áudio]";

/// Format an amount as Brazilian reais: `R$ 1.234,56`
pub fn format_brl(amount: f64) -> String {
    let cents = to_cents(amount);
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let reais = (cents / 100).to_string();

    let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
    for (i, digit) in reais.chars().enumerate() {
        if i > 0 && (reais.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    format!("{}R$ {},{:02}", sign, grouped, cents % 100)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn type_icon(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::Expense => "💸",
        TransactionType::Income => "💰",
    }
}

pub fn plural<'a>(count: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 {
        singular
    } else {
        plural
    }
}

/// One-line echo of a persisted transaction
pub fn transaction_preview(t: &Transaction) -> String {
    format!(
        "{} {} · {} ({} · {} · {})",
        type_icon(t.kind),
        format_brl(t.amount),
        t.title,
        t.category_name,
        t.account_name,
        format_date(t.date)
    )
}

/// Reply for a conversational intent when the classifier gave none
pub fn canned_reply(intent: &Intent) -> &'static str {
    match intent {
        Intent::Greeting => {
            "Olá! Posso registrar seus gastos e receitas, corrigir lançamentos e mostrar resumos do mês."
        }
        Intent::SmallTalk => {
            "Estou aqui para ajudar com as finanças da casa. Me conte um gasto ou peça um resumo!"
        }
        Intent::Clarification => "Pode me dar mais detalhes? Valor, descrição e data ajudam bastante.",
        _ => crate::intent::FALLBACK_ASSISTANT_MESSAGE,
    }
}

/// Question naming what a create request is missing
pub fn missing_data_question(draft: &TransactionDraft) -> String {
    let mut missing = Vec::new();
    if !draft.has_required_data() {
        missing.push("o valor");
    }
    if draft.title.is_none() && draft.category.is_none() {
        missing.push("a descrição ou categoria");
    }
    format!(
        "Para registrar o lançamento, preciso saber {}. Pode me informar?",
        missing.join(" e ")
    )
}

/// A changed field, rendered as `Campo: antes → depois`
pub fn diff_line(field: &str, before: &str, after: &str) -> String {
    format!("• {}: {} → {}", field, before, after)
}
