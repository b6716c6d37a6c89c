//! Transaction reconciler
//!
//! Turns create and edit intents into ledger writes.
//!
//! Drafts follow a small lifecycle. A create with enough data but an open
//! question is stored as a `pending` draft. A later complete create with
//! the same amount and date (or naming the draft explicitly) *matches* it
//! and *promotes* it to `paid` in place. Drafts older than the window are
//! *expired*: they are never matched again. When several drafts match, the
//! most recently created wins.

use tracing::{debug, info, warn};

use super::replies::{
    diff_line, format_brl, format_date, missing_data_question, plural, transaction_preview,
};
use super::ChatResponse;
use crate::config::ChatConfig;
use crate::db::{DraftLookup, Ledger};
use crate::error::Result;
use crate::intent::{Drafts, TransactionDraft};
use crate::models::{
    from_cents, is_valid_amount, to_cents, NewTransaction, Transaction, TransactionCriteria,
    TransactionPatch, TransactionStatus, TransactionType,
};

/// Account used when the user names none
pub const DEFAULT_ACCOUNT_NAME: &str = "Carteira";

/// Category used when the user names none
pub const DEFAULT_CATEGORY_NAME: &str = "Outros";

/// Longest title taken from the raw message
pub const MAX_TITLE_CHARS: usize = 100;

/// Candidates listed when an edit matches several transactions
pub const MAX_LISTED_CANDIDATES: usize = 5;

/// How a create was written to the ledger
#[derive(Debug)]
enum Reconciled {
    /// Stored as a pending draft awaiting clarification
    Drafted(Transaction),
    /// A matching draft was finalized in place
    Promoted(Transaction),
    /// A new paid transaction
    Inserted(Transaction),
}

impl Reconciled {
    fn transaction(&self) -> &Transaction {
        match self {
            Self::Drafted(t) | Self::Promoted(t) | Self::Inserted(t) => t,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Drafted(_) => "drafted",
            Self::Promoted(_) => "promoted",
            Self::Inserted(_) => "inserted",
        }
    }

    fn headline(&self) -> &'static str {
        match self {
            Self::Drafted(_) => "📝 Rascunho salvo, aguardando confirmação:",
            Self::Promoted(_) => "✅ Rascunho confirmado:",
            Self::Inserted(_) => "✅ Lançamento registrado:",
        }
    }
}

pub(super) struct Reconciler<'a> {
    ledger: Ledger<'a>,
    config: &'a ChatConfig,
    member_id: i64,
}

impl<'a> Reconciler<'a> {
    pub fn new(ledger: Ledger<'a>, config: &'a ChatConfig, member_id: i64) -> Self {
        Self {
            ledger,
            config,
            member_id,
        }
    }

    /// Handle a `create_transaction` intent
    pub fn create(
        &self,
        drafts: &Drafts,
        message: &str,
        pending_transaction_id: Option<i64>,
        response: &mut ChatResponse,
    ) -> Result<()> {
        match drafts {
            Drafts::One(draft) => self.create_one(draft, message, pending_transaction_id, response),
            Drafts::Many(items) => self.create_many(items, message, response),
        }
    }

    fn create_one(
        &self,
        draft: &TransactionDraft,
        message: &str,
        pending_transaction_id: Option<i64>,
        response: &mut ChatResponse,
    ) -> Result<()> {
        if !draft.has_required_data() {
            debug!("Create without a storable amount, asking for details");
            response.clarification_needed = true;
            response.assistant_message = missing_data_question(draft);
            return Ok(());
        }

        let outcome = if response.clarification_needed {
            let new = self.resolve(draft, message, TransactionStatus::Pending)?;
            Reconciled::Drafted(self.ledger.insert_transaction(&new)?)
        } else {
            let new = self.resolve(draft, message, TransactionStatus::Paid)?;
            self.promote_or_insert(&new, pending_transaction_id)?
        };

        let transaction = outcome.transaction();
        info!(
            transaction_id = transaction.id,
            status = %transaction.status,
            outcome = outcome.label(),
            "Chat transaction saved"
        );
        response.transaction_id = Some(transaction.id);
        match outcome {
            Reconciled::Drafted(_) => response.transaction_pending = Some(true),
            _ => response.transaction_saved = Some(true),
        }
        response.assistant_message = format!(
            "{}\n\n{}\n{}",
            response.assistant_message,
            outcome.headline(),
            transaction_preview(transaction)
        );
        Ok(())
    }

    /// Promote the draft this message resolves, or insert a new paid row
    fn promote_or_insert(
        &self,
        new: &NewTransaction,
        pending_transaction_id: Option<i64>,
    ) -> Result<Reconciled> {
        let window = self.config.draft_window;
        let lookup = match pending_transaction_id {
            Some(id) => DraftLookup::Explicit(id),
            None => DraftLookup::AmountDate {
                amount: new.amount,
                date: new.date,
            },
        };

        if let Some(draft) = self.ledger.find_pending_draft(lookup, window)? {
            if let Some(promoted) = self.ledger.promote_draft(draft.id, new, window)? {
                return Ok(Reconciled::Promoted(promoted));
            }
        } else if let DraftLookup::Explicit(id) = lookup {
            debug!(draft_id = id, "Named draft is not promotable, inserting");
        }

        Ok(Reconciled::Inserted(self.ledger.insert_transaction(new)?))
    }

    fn create_many(
        &self,
        items: &[TransactionDraft],
        message: &str,
        response: &mut ChatResponse,
    ) -> Result<()> {
        if response.clarification_needed {
            debug!(items = items.len(), "Multi-item create needs clarification, nothing saved");
            return Ok(());
        }

        let mut created = Vec::new();
        let mut skipped = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let label = item
                .title
                .clone()
                .or_else(|| item.category.clone())
                .unwrap_or_else(|| format!("item {}", index + 1));

            if !item.has_required_data() {
                skipped.push(format!("{} (valor ausente)", label));
                continue;
            }
            let saved = self
                .resolve(item, message, TransactionStatus::Paid)
                .and_then(|new| self.ledger.insert_transaction(&new));
            match saved {
                Ok(t) => created.push(t),
                Err(e) => {
                    warn!(item = index, error = %e, "Failed to save chat item");
                    skipped.push(format!("{} (erro ao salvar)", label));
                }
            }
        }

        let mut reply = response.assistant_message.clone();
        if !created.is_empty() {
            let total_cents: i64 = created.iter().map(|t| to_cents(t.amount)).sum();
            reply.push_str(&format!(
                "\n\n✅ {} {}:",
                created.len(),
                plural(created.len(), "lançamento registrado", "lançamentos registrados")
            ));
            for t in &created {
                reply.push('\n');
                reply.push_str(&transaction_preview(t));
            }
            reply.push_str(&format!(
                "\nTotal: {}",
                format_brl(from_cents(total_cents))
            ));
        }
        if !skipped.is_empty() {
            reply.push_str(&format!(
                "\n\n⚠️ Não registrei {} {}: {}",
                skipped.len(),
                plural(skipped.len(), "item", "itens"),
                skipped.join(", ")
            ));
            response.clarification_needed = true;
        }

        info!(created = created.len(), skipped = skipped.len(), "Multi-item create");
        response.transaction_saved = Some(!created.is_empty());
        response.transaction_ids = Some(created.iter().map(|t| t.id).collect());
        response.assistant_message = reply;
        Ok(())
    }

    /// Fill in defaults and get-or-create the account and category
    fn resolve(
        &self,
        draft: &TransactionDraft,
        message: &str,
        status: TransactionStatus,
    ) -> Result<NewTransaction> {
        let kind = draft.kind.unwrap_or(TransactionType::Expense);
        let account = self
            .ledger
            .get_or_create_account(draft.account.as_deref().unwrap_or(DEFAULT_ACCOUNT_NAME))?;
        let category = self.ledger.get_or_create_category(
            draft.category.as_deref().unwrap_or(DEFAULT_CATEGORY_NAME),
            kind,
        )?;

        let title = match &draft.title {
            Some(title) => title.clone(),
            None => message.trim().chars().take(MAX_TITLE_CHARS).collect(),
        };

        Ok(NewTransaction {
            account_id: account.id,
            category_id: category.id,
            title,
            amount: draft.amount.unwrap_or_default(),
            date: draft.date.unwrap_or_else(|| self.config.today()),
            status,
            note: draft
                .notes
                .clone()
                .unwrap_or_else(|| format!("Criado via chat: {}", message.trim())),
            payer_id: Some(self.member_id),
            split_with: Vec::new(),
            recurrence: None,
            attachment: None,
        })
    }

    /// Handle an `edit_transaction` intent
    pub fn edit(
        &self,
        criteria: &TransactionCriteria,
        patch: &TransactionDraft,
        response: &mut ChatResponse,
    ) -> Result<()> {
        if response.clarification_needed {
            return Ok(());
        }

        let matches = if criteria.is_empty() {
            Vec::new()
        } else {
            self.ledger.search_by_criteria(criteria)?
        };
        debug!(matches = matches.len(), "Edit candidates found");

        match matches.as_slice() {
            [] => {
                response.clarification_needed = true;
                response.assistant_message = "Não encontrei nenhum lançamento com essas informações. \
                    Pode me dizer a data, o valor ou a conta do lançamento que quer alterar?"
                    .to_string();
            }
            [target] => self.apply_edit(target, patch, response)?,
            candidates => {
                response.clarification_needed = true;
                let mut reply = format!(
                    "Encontrei {} lançamentos parecidos. Qual deles você quer alterar?",
                    candidates.len()
                );
                for (i, t) in candidates.iter().take(MAX_LISTED_CANDIDATES).enumerate() {
                    reply.push_str(&format!(
                        "\n{}. {} · {} · {} · {}",
                        i + 1,
                        format_date(t.date),
                        t.title,
                        format_brl(t.amount),
                        t.account_name
                    ));
                }
                reply.push_str("\nMe diga a data, o valor ou a conta para eu identificar.");
                response.assistant_message = reply;
            }
        }
        Ok(())
    }

    fn apply_edit(
        &self,
        current: &Transaction,
        draft: &TransactionDraft,
        response: &mut ChatResponse,
    ) -> Result<()> {
        let mut patch = TransactionPatch::default();
        let mut diff = Vec::new();

        if let Some(amount) = draft.amount.filter(|a| is_valid_amount(*a)) {
            if to_cents(amount) != to_cents(current.amount) {
                patch.amount = Some(amount);
                diff.push(diff_line(
                    "Valor",
                    &format_brl(current.amount),
                    &format_brl(amount),
                ));
            }
        }
        if let Some(title) = draft.title.as_ref().filter(|t| **t != current.title) {
            patch.title = Some(title.clone());
            diff.push(diff_line("Título", &current.title, title));
        }
        if let Some(date) = draft.date.filter(|d| *d != current.date) {
            patch.date = Some(date);
            diff.push(diff_line(
                "Data",
                &format_date(current.date),
                &format_date(date),
            ));
        }
        if let Some(note) = draft.notes.as_ref().filter(|n| **n != current.note) {
            patch.note = Some(note.clone());
            diff.push(diff_line("Observação", &current.note, note));
        }

        let kind = draft.kind.unwrap_or(current.kind);
        if draft.category.is_some() || kind != current.kind {
            let name = draft.category.as_deref().unwrap_or(&current.category_name);
            let category = self.ledger.get_or_create_category(name, kind)?;
            if category.id != current.category_id {
                patch.category_id = Some(category.id);
                diff.push(diff_line("Categoria", &current.category_name, &category.name));
                if kind != current.kind {
                    diff.push(diff_line("Tipo", current.kind.label(), kind.label()));
                }
            }
        }
        if let Some(name) = &draft.account {
            let account = self.ledger.get_or_create_account(name)?;
            if account.id != current.account_id {
                patch.account_id = Some(account.id);
                diff.push(diff_line("Conta", &current.account_name, &account.name));
            }
        }

        if patch.is_empty() && draft.is_empty() {
            response.clarification_needed = true;
            response.assistant_message = format!(
                "Encontrei o lançamento {}. O que você quer alterar nele?",
                transaction_preview(current)
            );
            return Ok(());
        }
        if current.status == TransactionStatus::Pending {
            patch.status = Some(TransactionStatus::Paid);
            diff.push(diff_line("Status", "pendente", "pago"));
        }
        if patch.is_empty() {
            response.transaction_id = Some(current.id);
            response.assistant_message = format!(
                "Esse lançamento já está com essas informações:\n{}",
                transaction_preview(current)
            );
            return Ok(());
        }

        let updated = self.ledger.update_transaction(current.id, &patch)?;
        info!(transaction_id = updated.id, changes = diff.len(), "Chat edit applied");

        response.transaction_id = Some(updated.id);
        response.transaction_saved = Some(true);
        response.assistant_message = format!(
            "{}\n\n✏️ Lançamento atualizado:\n{}\n{}",
            response.assistant_message,
            diff.join("\n"),
            transaction_preview(&updated)
        );
        Ok(())
    }
}
