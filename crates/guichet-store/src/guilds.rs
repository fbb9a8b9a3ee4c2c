//! Guild document persistence.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use guichet_shared::GuildId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::GuildDoc;

impl Database {
    /// Load a community's document, normalizing its settings.
    ///
    /// Returns `None` for communities that have never been written.
    pub fn load_guild_doc(&self, guild: GuildId) -> Result<Option<GuildDoc>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT doc FROM guild_docs WHERE guild_id = ?1",
                params![guild.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => {
                let mut doc: GuildDoc = serde_json::from_str(&json)?;
                doc.settings.normalize();
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Write a community's document, replacing any previous version.
    pub fn save_guild_doc(&self, guild: GuildId, doc: &GuildDoc) -> Result<()> {
        let json = serde_json::to_string(doc)?;
        self.conn().execute(
            "INSERT INTO guild_docs (guild_id, doc, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(guild_id) DO UPDATE SET doc = excluded.doc, updated_at = excluded.updated_at",
            params![guild.to_string(), json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete a community's document. Returns whether a row existed.
    pub fn delete_guild_doc(&self, guild: GuildId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM guild_docs WHERE guild_id = ?1",
            params![guild.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Enumerate every persisted community.
    pub fn guild_ids(&self) -> Result<Vec<GuildId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT guild_id FROM guild_docs ORDER BY guild_id ASC")?;
        let rows = stmt.query_map([], |row| {
            let raw: String = row.get(0)?;
            raw.parse::<GuildId>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_guild_loads_as_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_guild_doc(GuildId(1)).unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let db = Database::open_in_memory().unwrap();

        let mut doc = GuildDoc::default();
        doc.counter = 5;
        db.save_guild_doc(GuildId(1), &doc).unwrap();

        let loaded = db.load_guild_doc(GuildId(1)).unwrap().unwrap();
        assert_eq!(loaded.counter, 5);

        // Second save overwrites.
        doc.counter = 6;
        db.save_guild_doc(GuildId(1), &doc).unwrap();
        let loaded = db.load_guild_doc(GuildId(1)).unwrap().unwrap();
        assert_eq!(loaded.counter, 6);
    }

    #[test]
    fn load_normalizes_broken_settings() {
        let db = Database::open_in_memory().unwrap();

        let mut doc = GuildDoc::default();
        doc.settings.ticket_limit = 0;
        db.save_guild_doc(GuildId(1), &doc).unwrap();

        let loaded = db.load_guild_doc(GuildId(1)).unwrap().unwrap();
        assert_eq!(loaded.settings.ticket_limit, 1);
    }

    #[test]
    fn guild_ids_lists_persisted_communities() {
        let db = Database::open_in_memory().unwrap();
        db.save_guild_doc(GuildId(2), &GuildDoc::default()).unwrap();
        db.save_guild_doc(GuildId(1), &GuildDoc::default()).unwrap();

        let ids = db.guild_ids().unwrap();
        assert_eq!(ids, vec![GuildId(1), GuildId(2)]);
    }

    #[test]
    fn delete_reports_presence() {
        let db = Database::open_in_memory().unwrap();
        db.save_guild_doc(GuildId(1), &GuildDoc::default()).unwrap();

        assert!(db.delete_guild_doc(GuildId(1)).unwrap());
        assert!(!db.delete_guild_doc(GuildId(1)).unwrap());
    }
}
