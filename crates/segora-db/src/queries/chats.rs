use anyhow::Result;
use rusqlite::{Connection, Row, params};
use tracing::debug;

use super::{OptionalExt, canonical_pair};
use crate::Database;
use crate::models::{ChatRow, MessageRow, NewChat};

const CHAT_COLUMNS: &str = "id, user_a, user_b, item_id, item_title, item_image, created_at";

impl Database {
    // -- Conversations --

    /// Find the conversation between the two users about this listing, or
    /// create it. Returns the row and whether this call created it.
    ///
    /// Runs as one write transaction against the canonical
    /// (user_lo, user_hi, item_id) unique key, so two concurrent callers always
    /// end up with the same row.
    pub fn find_or_create_chat(&self, chat: &NewChat) -> Result<(ChatRow, bool)> {
        let (lo, hi) = canonical_pair(&chat.user_a, &chat.user_b);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO chats (id, user_a, user_b, user_lo, user_hi, item_id,
                    item_title, item_image, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (user_lo, user_hi, item_id) DO NOTHING",
                params![
                    chat.id,
                    chat.user_a,
                    chat.user_b,
                    lo,
                    hi,
                    chat.item_id,
                    chat.item_title,
                    chat.item_image,
                    chat.created_at,
                ],
            )?;

            let sql = format!(
                "SELECT {} FROM chats WHERE user_lo = ?1 AND user_hi = ?2 AND item_id = ?3",
                CHAT_COLUMNS
            );
            let row = tx.query_row(&sql, params![lo, hi, chat.item_id], chat_from_row)?;
            tx.commit()?;

            debug!(chat_id = %row.id, created = inserted == 1, "find_or_create_chat");
            Ok((row, inserted == 1))
        })
    }

    pub fn get_chat(&self, id: &str) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| query_chat(conn, id))
    }

    /// Conversations the user takes part in, newest first.
    pub fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM chats WHERE user_a = ?1 OR user_b = ?1
                 ORDER BY created_at DESC, id",
                CHAT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], chat_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &MessageRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, chat_id, sender_id, content, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id,
                    message.chat_id,
                    message.sender_id,
                    message.content,
                    message.is_read,
                    message.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Messages of a conversation in the order they were sent.
    pub fn get_messages(&self, chat_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, sender_id, content, is_read, created_at
                 FROM messages
                 WHERE chat_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([chat_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        content: row.get(3)?,
                        is_read: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark everything the other participant sent as read.
    /// Returns the number of messages flipped.
    pub fn mark_chat_read(&self, chat_id: &str, reader_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE chat_id = ?1 AND sender_id <> ?2 AND is_read = 0",
                [chat_id, reader_id],
            )?;
            Ok(updated)
        })
    }
}

fn query_chat(conn: &Connection, id: &str) -> Result<Option<ChatRow>> {
    let sql = format!("SELECT {} FROM chats WHERE id = ?1", CHAT_COLUMNS);
    let row = conn.query_row(&sql, [id], chat_from_row).optional()?;
    Ok(row)
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        item_id: row.get(3)?,
        item_title: row.get(4)?,
        item_image: row.get(5)?,
        created_at: row.get(6)?,
    })
}
