//! Protocol sessions issued to clients of the `/mcp` endpoint.
//!
//! A session starts with `initialize` and is named in the `Mcp-Session-Id`
//! header of later requests. Sessions idle for longer than the configured age
//! are dropped by a background sweep; when the table is full the session seen
//! least recently makes room.

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Header naming the client's session.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Sessions kept before the least recently seen is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// One client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Identifier sent in [`SESSION_HEADER`].
    pub id: String,
    /// Caller identity given at `initialize`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last used.
    pub last_seen: DateTime<Utc>,
}

struct Inner<C> {
    clock: Arc<C>,
    max_sessions: usize,
    sessions: Mutex<HashMap<String, Session>>,
}

/// Table of live client sessions.
pub struct SessionManager<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for SessionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> SessionManager<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates an empty table holding at most `max_sessions` sessions.
    #[must_use]
    pub fn new(clock: Arc<C>, max_sessions: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                max_sessions: max_sessions.max(1),
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    // A poisoned table only means a panicking reader; the map is still whole.
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a session, evicting the least recently seen one when full.
    #[must_use]
    pub fn create(&self, caller: Option<&str>) -> Session {
        let now = self.inner.clock.utc();
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            caller: caller.map(str::to_owned),
            created_at: now,
            last_seen: now,
        };
        let mut sessions = self.sessions();
        while sessions.len() >= self.inner.max_sessions {
            let Some(oldest) = sessions
                .values()
                .min_by_key(|existing| existing.last_seen)
                .map(|existing| existing.id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(session = %oldest, "evicted least recently seen session");
        }
        sessions.insert(session.id.clone(), session.clone());
        debug!(session = %session.id, "session opened");
        session
    }

    /// Returns session `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions().get(id).cloned()
    }

    /// Marks session `id` as used now. Returns whether it exists.
    pub fn touch(&self, id: &str) -> bool {
        let now = self.inner.clock.utc();
        self.sessions()
            .get_mut(id)
            .map(|session| session.last_seen = now)
            .is_some()
    }

    /// Ends session `id`. Returns whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.sessions().remove(id).is_some();
        if removed {
            debug!(session = id, "session closed");
        }
        removed
    }

    /// Returns every session, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions().values().cloned().collect();
        sessions.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        sessions
    }

    /// Returns how many sessions are open.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions().len()
    }

    /// Drops sessions not seen within `max_age`. Returns how many went.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let now = self.inner.clock.utc();
        let Some(cutoff) = TimeDelta::from_std(max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
        else {
            return 0;
        };
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| session.last_seen >= cutoff);
        let removed = before.saturating_sub(sessions.len());
        if removed > 0 {
            info!(removed, "expired idle sessions");
        }
        removed
    }

    /// Runs [`Self::cleanup`] every `interval` until aborted.
    #[must_use]
    pub fn spawn_session_cleanup(&self, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.cleanup(max_age);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockable::DefaultClock;
    use rstest::{fixture, rstest};

    #[fixture]
    fn manager() -> SessionManager<DefaultClock> {
        SessionManager::new(Arc::new(DefaultClock), 3)
    }

    #[rstest]
    fn sessions_have_hex_identifiers(manager: SessionManager<DefaultClock>) {
        let session = manager.create(Some("planner"));

        assert_eq!(session.id.len(), 32);
        assert!(session.id.chars().all(|character| character.is_ascii_hexdigit()));
        assert_eq!(manager.get(&session.id), Some(session));
    }

    #[rstest]
    fn touch_and_delete_report_unknown_sessions(manager: SessionManager<DefaultClock>) {
        let session = manager.create(None);

        assert!(manager.touch(&session.id));
        assert!(manager.delete(&session.id));
        assert!(!manager.touch(&session.id));
        assert!(!manager.delete(&session.id));
        assert_eq!(manager.count(), 0);
    }

    #[rstest]
    fn full_tables_evict_the_least_recently_seen(manager: SessionManager<DefaultClock>) {
        let first = manager.create(None);
        std::thread::sleep(Duration::from_millis(2));
        let second = manager.create(None);
        std::thread::sleep(Duration::from_millis(2));
        let third = manager.create(None);
        std::thread::sleep(Duration::from_millis(2));
        manager.touch(&first.id);

        let fourth = manager.create(None);

        assert_eq!(manager.count(), 3);
        assert!(manager.get(&second.id).is_none());
        let kept: Vec<String> = manager.list().into_iter().map(|session| session.id).collect();
        assert_eq!(kept, vec![first.id, third.id, fourth.id]);
    }

    #[rstest]
    fn cleanup_drops_idle_sessions(manager: SessionManager<DefaultClock>) {
        manager.create(None);
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(manager.cleanup(Duration::from_secs(1800)), 0);
        assert_eq!(manager.cleanup(Duration::ZERO), 1);
        assert_eq!(manager.count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn background_cleanup_expires_sessions() {
        let manager = SessionManager::new(Arc::new(DefaultClock), 10);
        manager.create(None);

        let sweep = manager.spawn_session_cleanup(Duration::from_millis(20), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(120)).await;
        sweep.abort();

        assert_eq!(manager.count(), 0);
    }
}
