use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderValue, header};
use dashmap::DashMap;
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, info};

use crate::quiz::SessionState;

pub const COOKIE_NAME: &str = "declinare_session";
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;
const SESSION_ID_LEN: usize = 32;
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Stored {
    state: SessionState,
    touched: Instant,
}

/// In-memory quiz sessions keyed by cookie id.
pub struct SessionStore {
    sessions: DashMap<String, Stored>,
    ttl: Duration,
    max_sessions: usize,
    last_prune: Mutex<Instant>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_SESSIONS)
    }

    /// A store holding at most `max_sessions`; the least recently touched
    /// session makes room for a new one.
    pub fn with_capacity(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            max_sessions: max_sessions.max(1),
            last_prune: Mutex::new(Instant::now()),
        }
    }

    /// A copy of the session, unless it is unknown or has expired.
    pub fn load(&self, id: &str) -> Option<SessionState> {
        let stored = self.sessions.get(id)?;
        if stored.touched.elapsed() > self.ttl {
            drop(stored);
            self.sessions.remove(id);
            return None;
        }
        Some(stored.state.clone())
    }

    pub fn save(&self, id: &str, state: SessionState) {
        if !self.sessions.contains_key(id) {
            while self.sessions.len() >= self.max_sessions {
                if !self.evict_oldest() {
                    break;
                }
            }
        }
        self.sessions.insert(
            id.to_string(),
            Stored {
                state,
                touched: Instant::now(),
            },
        );
        self.prune_if_needed();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every session idle for longer than the TTL.
    pub fn prune_expired(&self) -> usize {
        let before = self.sessions.len();
        let ttl = self.ttl;
        self.sessions.retain(|_, stored| stored.touched.elapsed() <= ttl);
        before.saturating_sub(self.sessions.len())
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.touched)
            .map(|entry| entry.key().clone());
        match oldest {
            Some(id) => {
                debug!("session store full, evicting the least recent session");
                self.sessions.remove(&id).is_some()
            }
            None => false,
        }
    }

    fn prune_if_needed(&self) {
        let Ok(mut last) = self.last_prune.try_lock() else {
            return;
        };
        let now = Instant::now();
        if now.saturating_duration_since(*last) < PRUNE_INTERVAL {
            return;
        }
        *last = now;
        drop(last);
        let pruned = self.prune_expired();
        if pruned > 0 {
            info!("pruned {pruned} idle sessions ({} active)", self.len());
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

pub fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// The session id carried by the request's `Cookie` headers, if well-formed.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, id)| id.trim())
        .filter(|id| is_valid_id(id))
        .map(str::to_string)
}

fn is_valid_id(id: &str) -> bool {
    id.len() == SESSION_ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub fn set_cookie(id: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{COOKIE_NAME}={id}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_alphanumeric_and_distinct() {
        let a = new_session_id();
        let b = new_session_id();
        assert!(is_valid_id(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn parses_cookie_among_others() {
        let id = new_session_id();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {COOKIE_NAME}={id}")).unwrap(),
        );
        assert_eq!(session_id(&headers), Some(id));
    }

    #[test]
    fn rejects_malformed_ids() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("declinare_session=../../etc"),
        );
        assert_eq!(session_id(&headers), None);
        assert_eq!(session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn set_cookie_round_trips_through_parser() {
        let id = new_session_id();
        let value = set_cookie(&id).unwrap();
        let pair = value.to_str().unwrap().split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
        assert_eq!(session_id(&headers), Some(id));
    }

    #[test]
    fn load_returns_saved_copy() {
        let store = SessionStore::default();
        let mut state = SessionState::new("sv");
        state.streak = 2;
        store.save("abc", state.clone());
        assert_eq!(store.load("abc"), Some(state));
        assert_eq!(store.load("missing"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let store = SessionStore::new(Duration::ZERO);
        store.save("abc", SessionState::new("sv"));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.load("abc"), None);
        assert!(store.is_empty());

        store.save("def", SessionState::new("ro"));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.prune_expired(), 1);
    }

    #[test]
    fn full_store_evicts_least_recent_session() {
        let store = SessionStore::with_capacity(DEFAULT_TTL, 2);
        for id in ["a", "b", "c"] {
            store.save(id, SessionState::new("sv"));
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.load("a"), None);
        assert!(store.load("b").is_some());
        assert!(store.load("c").is_some());

        // updating a known session never evicts another
        store.save("b", SessionState::new("ro"));
        assert_eq!(store.len(), 2);
        assert!(store.load("c").is_some());
    }
}
