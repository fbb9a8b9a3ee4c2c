//! User document persistence.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use guichet_shared::UserId;

use crate::database::Database;
use crate::error::Result;
use crate::models::UserDoc;

impl Database {
    /// Load a user's document; `None` for users never written.
    pub fn load_user_doc(&self, user: UserId) -> Result<Option<UserDoc>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT doc FROM user_docs WHERE user_id = ?1",
                params![user.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Write a user's document, replacing any previous version.
    pub fn save_user_doc(&self, user: UserId, doc: &UserDoc) -> Result<()> {
        let json = serde_json::to_string(doc)?;
        self.conn().execute(
            "INSERT INTO user_docs (user_id, doc, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET doc = excluded.doc, updated_at = excluded.updated_at",
            params![user.to_string(), json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use guichet_shared::ChannelId;

    use crate::models::FeedbackEntry;

    use super::*;

    #[test]
    fn user_doc_round_trips() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_user_doc(UserId(9)).unwrap().is_none());

        let doc = UserDoc {
            feedback: vec![FeedbackEntry {
                ticket: ChannelId(4),
                rating: 5,
                comment: Some("quick and helpful".to_string()),
                created_at: Utc::now(),
            }],
        };
        db.save_user_doc(UserId(9), &doc).unwrap();

        let loaded = db.load_user_doc(UserId(9)).unwrap().unwrap();
        assert_eq!(loaded.feedback.len(), 1);
        assert_eq!(loaded.feedback[0].rating, 5);
    }
}
