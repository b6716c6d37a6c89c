//! Chat conversation log (append-only)

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::ConversationEntry;

/// Maximum number of entries a history request may return
pub const MAX_HISTORY_LIMIT: i64 = 100;

impl Database {
    /// Append one chat exchange to a member's log
    pub fn append_conversation(
        &self,
        member_id: i64,
        user_message: &str,
        assistant_reply: &str,
        intent: Option<&str>,
        transcribed_text: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversation_log
                (member_id, user_message, assistant_reply, intent, transcribed_text)
             VALUES (?, ?, ?, ?, ?)",
            params![
                member_id,
                user_message,
                assistant_reply,
                intent,
                transcribed_text
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The member's most recent exchanges, returned oldest first
    pub fn recent_conversation(&self, member_id: i64, limit: i64) -> Result<Vec<ConversationEntry>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, member_id, user_message, assistant_reply, intent, transcribed_text, created_at
             FROM conversation_log
             WHERE member_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )?;

        let mut entries = stmt
            .query_map(params![member_id, limit], |row| {
                let created_at: String = row.get(6)?;
                Ok(ConversationEntry {
                    id: row.get(0)?,
                    member_id: row.get(1)?,
                    user_message: row.get(2)?,
                    assistant_reply: row.get(3)?,
                    intent: row.get(4)?,
                    transcribed_text: row.get(5)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        entries.reverse();
        Ok(entries)
    }
}
