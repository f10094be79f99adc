use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, OwnedMutexGuard, RwLock},
    task::JoinHandle,
};

use crate::{error::Error, types::SessionRecord, utils};

/// Entropy of generated session ids.
pub const SESSION_ID_BYTES: usize = 16;

/// Exclusive access to one live session record.
///
/// Holding the guard is the transaction: read, check and write happen
/// without any other request observing or replacing the record in between.
pub type SessionGuard = OwnedMutexGuard<SessionRecord>;

/// Owner of all session records.
///
/// Swappable for a networked cache without touching call sites; nothing else
/// keeps a copy of a record beyond one request.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Stores a new record and returns its freshly generated id.
    async fn create(&self, record: SessionRecord) -> Result<String, Error>;

    /// Snapshot of the record, if the session exists.
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, Error>;

    /// Locks the record for a read-modify-write.
    ///
    /// Waits for any other holder. Returns `None` if the session does not
    /// exist, including when it was deleted while this caller was waiting.
    async fn lock(&self, session_id: &str) -> Result<Option<SessionGuard>, Error>;

    /// Removes the session. Returns whether it existed.
    async fn delete(&self, session_id: &str) -> Result<bool, Error>;

    /// Removes every record whose expiry is at or before `now`.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, Error>;

    async fn len(&self) -> Result<usize, Error>;
}

type Entry = Arc<Mutex<SessionRecord>>;

/// Process-local [`SessionStore`]. Contents are lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, session_id: &str) -> Option<Entry> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, record: SessionRecord) -> Result<String, Error> {
        let mut sessions = self.sessions.write().await;
        let mut id = utils::random_token(SESSION_ID_BYTES);
        while sessions.contains_key(&id) {
            id = utils::random_token(SESSION_ID_BYTES);
        }
        sessions.insert(id.clone(), Arc::new(Mutex::new(record)));
        Ok(id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, Error> {
        match self.entry(session_id).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn lock(&self, session_id: &str) -> Result<Option<SessionGuard>, Error> {
        let Some(entry) = self.entry(session_id).await else {
            return Ok(None);
        };

        let guard = entry.clone().lock_owned().await;

        // The record may have been removed while we waited for the lock.
        let still_live = self
            .sessions
            .read()
            .await
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, &entry));

        Ok(still_live.then_some(guard))
    }

    async fn delete(&self, session_id: &str) -> Result<bool, Error> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, Error> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        // A record locked right now is mid-refresh; leave it for the next tick.
        sessions.retain(|_, entry| match entry.try_lock() {
            Ok(record) => !record.is_expired(now),
            Err(_) => true,
        });
        Ok(before - sessions.len())
    }

    async fn len(&self) -> Result<usize, Error> {
        Ok(self.sessions.read().await.len())
    }
}

/// Shortest sweep period; `tokio::time::interval` rejects a zero period.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Spawns the periodic expiry sweep.
///
/// Runs independently of request handling until the handle is aborted.
/// Periods below [`MIN_SWEEP_INTERVAL`] are raised to it.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    let every = every.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.sweep_expired(Utc::now()).await {
                Ok(0) => tracing::debug!("session sweep: nothing expired"),
                Ok(removed) => tracing::info!(removed, "session sweep removed expired sessions"),
                Err(e) => tracing::warn!(error = %e, "session sweep failed"),
            }
        }
    })
}
