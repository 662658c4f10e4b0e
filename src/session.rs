use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::PlexSearch;

pub const SESSION_COOKIE: &str = "gaps_session";
const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const MAX_SESSIONS: usize = 10_000;

struct Entry {
    search: PlexSearch,
    touched: Instant,
}

/// Search configurations keyed by session id.
///
/// Each session owns exactly one [`PlexSearch`]. Mutation happens inside
/// [`SessionStore::update`] while the lock is held, so two requests of the
/// same session apply their changes one after the other. Sessions idle for
/// longer than the timeout are dropped, and once the store is full the least
/// recently used session makes room for a new one.
#[derive(Clone)]
pub struct SessionStore {
    searches: Arc<Mutex<HashMap<Uuid, Entry>>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(SESSION_IDLE_TIMEOUT, MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            searches: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    fn evict_idle(&self, searches: &mut HashMap<Uuid, Entry>, now: Instant) {
        let before = searches.len();
        searches.retain(|_, entry| now.duration_since(entry.touched) <= self.idle_timeout);
        let dropped = before - searches.len();
        if dropped > 0 {
            info!("Dropped {} idle sessions", dropped);
        }
    }

    /// Copy of the session's search; a fresh default one if the session is new.
    pub async fn snapshot(&self, id: Uuid) -> PlexSearch {
        let now = Instant::now();
        let mut guard = self.searches.lock().await;
        self.evict_idle(&mut guard, now);
        match guard.get_mut(&id) {
            Some(entry) => {
                entry.touched = now;
                entry.search.clone()
            }
            None => PlexSearch::default(),
        }
    }

    pub async fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut PlexSearch) -> R) -> R {
        let now = Instant::now();
        let mut guard = self.searches.lock().await;
        self.evict_idle(&mut guard, now);
        if !guard.contains_key(&id) && guard.len() >= self.max_sessions {
            let oldest = guard
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                guard.remove(&oldest);
                info!("Session limit of {} reached, dropped {}", self.max_sessions, oldest);
            }
        }
        let entry = guard.entry(id).or_insert_with(|| {
            debug!("Created search configuration for session {}", id);
            Entry {
                search: PlexSearch::default(),
                touched: now,
            }
        });
        entry.touched = now;
        f(&mut entry.search)
    }

    pub async fn len(&self) -> usize {
        self.searches.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Session id from the cookie jar, issuing a new cookie when absent or invalid.
pub fn session_id(jar: CookieJar) -> (CookieJar, Uuid) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    {
        return (jar, id);
    }
    let id = Uuid::new_v4();
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (jar.add(cookie), id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlexLibrary;

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store
            .update(a, |s| s.address = "10.0.0.2".to_string())
            .await;
        assert_eq!(store.snapshot(a).await.address, "10.0.0.2");
        assert_eq!(store.snapshot(b).await, PlexSearch::default());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        let mut tasks = Vec::new();
        for key in 0..20u32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .update(id, |s| {
                        s.append_libraries(vec![PlexLibrary {
                            key,
                            title: format!("Library {}", key),
                            machine_identifier: "abc".to_string(),
                            selected: false,
                        }])
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.snapshot(id).await.libraries.len(), 20);
    }

    #[tokio::test]
    async fn idle_sessions_are_dropped() {
        let store = SessionStore::with_limits(Duration::from_millis(20), 100);
        let idle = Uuid::new_v4();
        store
            .update(idle, |s| s.address = "10.0.0.2".to_string())
            .await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let active = Uuid::new_v4();
        store.update(active, |s| s.port = 32401).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.snapshot(idle).await, PlexSearch::default());
        assert_eq!(store.snapshot(active).await.port, 32401);
    }

    #[tokio::test]
    async fn full_store_drops_least_recently_used_session() {
        let store = SessionStore::with_limits(Duration::from_secs(60), 2);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.update(first, |s| s.address = "first".to_string()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.update(second, |s| s.address = "second".to_string()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        // Reading the first session counts as activity.
        assert_eq!(store.snapshot(first).await.address, "first");
        tokio::time::sleep(Duration::from_millis(5)).await;

        let third = Uuid::new_v4();
        store.update(third, |s| s.address = "third".to_string()).await;
        assert_eq!(store.len().await, 2);
        assert_eq!(store.snapshot(second).await, PlexSearch::default());
        assert_eq!(store.snapshot(first).await.address, "first");
        assert_eq!(store.snapshot(third).await.address, "third");
    }

    #[test]
    fn reuses_valid_cookie_and_replaces_garbage() {
        let id = Uuid::new_v4();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, id.to_string()));
        let (_, found) = session_id(jar);
        assert_eq!(found, id);

        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "not-a-uuid"));
        let (jar, issued) = session_id(jar);
        assert_ne!(issued, id);
        assert_eq!(
            jar.get(SESSION_COOKIE).map(|c| c.value().to_string()),
            Some(issued.to_string())
        );
    }
}
