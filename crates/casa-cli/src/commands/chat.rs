//! Chat command implementations

use anyhow::Result;
use casa_core::ai::ChatRole;
use casa_core::chat::{ChatCaller, ChatRequest, ChatResponse, ChatService};
use casa_core::db::Database;

use super::household_member;

/// Send one message through the chat pipeline and print the reply
///
/// Without an email the message is only classified; nothing is stored.
pub async fn cmd_chat(
    db: &Database,
    chat: &ChatService,
    email: Option<&str>,
    message: &str,
    pending: Option<i64>,
) -> Result<ChatResponse> {
    let caller = match email {
        Some(email) => {
            let (member, household_id) = household_member(db, email)?;
            Some(ChatCaller {
                member_id: member.id,
                household_id,
            })
        }
        None => None,
    };

    let response = chat
        .handle(
            caller,
            ChatRequest {
                message: Some(message.to_string()),
                pending_transaction_id: pending,
                ..ChatRequest::default()
            },
        )
        .await?;

    println!();
    println!("💬 {}", response.assistant_message);
    println!();
    println!("   intent: {}", response.intent);
    if let Some(id) = response.transaction_id {
        let state = if response.transaction_pending == Some(true) {
            "pending"
        } else {
            "saved"
        };
        println!("   transaction #{} {}", id, state);
    }
    if let Some(ids) = &response.transaction_ids {
        println!("   transactions: {:?}", ids);
    }
    if response.clarification_needed {
        if let Some(id) = response.transaction_id {
            println!(
                "   Answer with: casa chat --email {} --pending {} \"...\"",
                email.unwrap_or("EMAIL"),
                id
            );
        }
    }

    Ok(response)
}

pub fn cmd_history(db: &Database, chat: &ChatService, email: &str, limit: i64) -> Result<()> {
    let (member, _) = household_member(db, email)?;
    let turns = chat.history(member.id, Some(limit.max(1)))?;

    if turns.is_empty() {
        println!("No conversation yet.");
        return Ok(());
    }

    println!();
    println!("🗨️  Conversation with {}", member.display_name);
    println!("   ─────────────────────────────");
    for turn in turns {
        let speaker = match turn.role {
            ChatRole::User => member.display_name.as_str(),
            _ => "Casa",
        };
        println!(
            "   {} {}: {}",
            turn.timestamp.format("%d/%m %H:%M"),
            speaker,
            turn.content
        );
    }

    Ok(())
}
