//! Scoped read-modify-write over per-community documents.
//!
//! [`GuildStore`] is the only mutation path the rest of the system uses. A
//! community's document is guarded by its own async mutex, so two compound
//! updates on the same community never interleave their read and write
//! halves, while different communities proceed independently. The SQLite
//! handle itself sits behind a short-lived blocking lock; it is only held
//! across single statements.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use guichet_shared::{GuildId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{GuildDoc, UserDoc};

/// Async facade over [`Database`] providing document-granularity atomicity.
pub struct GuildStore {
    db: parking_lot::Mutex<Database>,
    guild_locks: Mutex<HashMap<GuildId, Arc<Mutex<()>>>>,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl GuildStore {
    /// Open the store in the default application data directory.
    pub fn new() -> Result<Self> {
        Ok(Self::with_database(Database::new()?))
    }

    /// Open the store at an explicit database path.
    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::with_database(Database::open_at(path)?))
    }

    /// Open an in-memory store, for tests and the sandbox console.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::with_database(Database::open_in_memory()?))
    }

    fn with_database(db: Database) -> Self {
        Self {
            db: parking_lot::Mutex::new(db),
            guild_locks: Mutex::new(HashMap::new()),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Filesystem path of the backing database, if it has one.
    pub fn path(&self) -> Option<PathBuf> {
        self.db.lock().path()
    }

    async fn guild_lock(&self, guild: GuildId) -> Arc<Mutex<()>> {
        let mut locks = self.guild_locks.lock().await;
        locks
            .entry(guild)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn user_lock(&self, user: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Point read of a community's document.
    ///
    /// Runs outside the document lock: it may observe the state before or
    /// after a concurrent mutation, never a torn value. Communities that
    /// were never written read as the default document.
    pub fn read(&self, guild: GuildId) -> Result<GuildDoc> {
        Ok(self
            .db
            .lock()
            .load_guild_doc(guild)?
            .unwrap_or_default())
    }

    /// Scoped read-modify-write of a community's document.
    ///
    /// Loads the current document (or the default), applies `f`, and
    /// persists the result only when `f` returns `Ok`; a failing `f`
    /// leaves the stored value untouched. Concurrent calls on the same
    /// community queue on the document lock.
    pub async fn mutate<T, E, F>(&self, guild: GuildId, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut GuildDoc) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let lock = self.guild_lock(guild).await;
        let _guard = lock.lock().await;

        let mut doc = self
            .db
            .lock()
            .load_guild_doc(guild)
            .map_err(E::from)?
            .unwrap_or_default();

        let out = f(&mut doc)?;

        self.db
            .lock()
            .save_guild_doc(guild, &doc)
            .map_err(E::from)?;

        Ok(out)
    }

    /// Point read of a user's document.
    pub fn read_user(&self, user: UserId) -> Result<UserDoc> {
        Ok(self
            .db
            .lock()
            .load_user_doc(user)?
            .unwrap_or_default())
    }

    /// Scoped read-modify-write of a user's document. Same contract as
    /// [`GuildStore::mutate`].
    pub async fn mutate_user<T, E, F>(&self, user: UserId, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut UserDoc) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let lock = self.user_lock(user).await;
        let _guard = lock.lock().await;

        let mut doc = self
            .db
            .lock()
            .load_user_doc(user)
            .map_err(E::from)?
            .unwrap_or_default();

        let out = f(&mut doc)?;

        self.db
            .lock()
            .save_user_doc(user, &doc)
            .map_err(E::from)?;

        Ok(out)
    }

    /// Every community with a persisted document.
    pub fn guild_ids(&self) -> Result<Vec<GuildId>> {
        self.db.lock().guild_ids()
    }

    /// Drop a community's document entirely; it reverts to defaults.
    ///
    /// Returns whether a document existed.
    pub async fn reset(&self, guild: GuildId) -> Result<bool> {
        let lock = self.guild_lock(guild).await;
        let _guard = lock.lock().await;

        self.db.lock().delete_guild_doc(guild)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_community_reads_as_default() {
        let store = GuildStore::open_in_memory().unwrap();
        let doc = store.read(GuildId(1)).unwrap();
        assert_eq!(doc.counter, 0);
        assert_eq!(doc.settings.ticket_limit, 3);
        assert_eq!(doc.categories.len(), 5);
    }

    #[tokio::test]
    async fn mutate_persists_on_ok() {
        let store = GuildStore::open_in_memory().unwrap();

        let number: u64 = store
            .mutate(GuildId(1), |doc| {
                doc.counter += 1;
                Ok::<_, StoreError>(doc.counter)
            })
            .await
            .unwrap();
        assert_eq!(number, 1);

        let doc = store.read(GuildId(1)).unwrap();
        assert_eq!(doc.counter, 1);
    }

    #[tokio::test]
    async fn failing_mutate_leaves_the_document_unchanged() {
        let store = GuildStore::open_in_memory().unwrap();

        store
            .mutate(GuildId(1), |doc| {
                doc.counter = 10;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();

        let result: std::result::Result<(), StoreError> = store
            .mutate(GuildId(1), |doc| {
                doc.counter = 999;
                Err(StoreError::Migration("boom".to_string()))
            })
            .await;
        assert!(result.is_err());

        let doc = store.read(GuildId(1)).unwrap();
        assert_eq!(doc.counter, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutates_serialize() {
        let store = Arc::new(GuildStore::open_in_memory().unwrap());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .mutate(GuildId(1), |doc| {
                        doc.counter += 1;
                        Ok::<_, StoreError>(doc.counter)
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort_unstable();

        // Every increment observed its predecessor: no lost updates.
        assert_eq!(numbers, (1..=50).collect::<Vec<u64>>());
        assert_eq!(store.read(GuildId(1)).unwrap().counter, 50);
    }

    #[tokio::test]
    async fn reset_reverts_to_defaults() {
        let store = GuildStore::open_in_memory().unwrap();

        store
            .mutate(GuildId(1), |doc| {
                doc.counter = 42;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();

        assert!(store.reset(GuildId(1)).await.unwrap());
        assert_eq!(store.read(GuildId(1)).unwrap().counter, 0);
        assert!(store.guild_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guichet.db");

        {
            let store = GuildStore::open_at(&path).unwrap();
            store
                .mutate(GuildId(7), |doc| {
                    doc.counter = 3;
                    Ok::<_, StoreError>(())
                })
                .await
                .unwrap();
        }

        let store = GuildStore::open_at(&path).unwrap();
        assert_eq!(store.read(GuildId(7)).unwrap().counter, 3);
        assert_eq!(store.guild_ids().unwrap(), vec![GuildId(7)]);
    }

    #[tokio::test]
    async fn user_documents_have_the_same_contract() {
        let store = GuildStore::open_in_memory().unwrap();
        assert!(store.read_user(UserId(5)).unwrap().feedback.is_empty());

        store
            .mutate_user(UserId(5), |doc| {
                doc.feedback.push(crate::models::FeedbackEntry {
                    ticket: guichet_shared::ChannelId(1),
                    rating: 4,
                    comment: None,
                    created_at: chrono::Utc::now(),
                });
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();

        assert_eq!(store.read_user(UserId(5)).unwrap().feedback.len(), 1);
    }
}
