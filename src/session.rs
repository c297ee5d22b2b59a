use crate::config::Config;
use crate::entry::Entry;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::collections::HashMap;
use std::mem;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Per-client state kept between requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    /// Entries of the last upload, used by re-draws
    pub entries: Option<Vec<Entry>>,

    /// One-shot messages shown on the next rendered page
    pub flashes: Vec<String>,
}

impl SessionData {
    /// Queue a message for the next rendered page
    pub fn flash(&mut self, message: impl Into<String>) {
        self.flashes.push(message.into());
    }

    /// Remove and return all queued messages
    pub fn take_flashes(&mut self) -> Vec<String> {
        mem::take(&mut self.flashes)
    }
}

/// Server-side storage of session data, keyed by session id
pub trait SessionStore: Send + Sync {
    /// Data of a live session, `None` if unknown or expired
    fn load(&self, id: &str) -> Option<SessionData>;

    /// Store the data of a session and restart its lifetime
    fn save(&self, id: &str, data: SessionData);
}

#[derive(Debug)]
struct StoredSession {
    data: SessionData,
    expires_at: SystemTime,
}

/// In-process session storage
///
/// Sessions are lost when the server restarts; the entries snapshot covers
/// re-draws in that case.
///
/// Every request without a live session cookie creates a new server-side
/// session, and each one holds a full copy of its entry list for the whole
/// lifetime. Expired sessions are only purged on the next `save`, so a burst
/// of cookieless clients grows memory until sessions start expiring.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    lifetime: Duration,
}

impl MemorySessionStore {
    pub fn new(lifetime: Duration) -> Self {
        MemorySessionStore {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    /// Number of sessions currently held, expired ones included
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &str) -> Option<SessionData> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);

        sessions
            .get(id)
            .filter(|session| session.expires_at > SystemTime::now())
            .map(|session| session.data.clone())
    }

    fn save(&self, id: &str, data: SessionData) {
        let now = SystemTime::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            id.to_string(),
            StoredSession {
                data,
                expires_at: now + self.lifetime,
            },
        );
    }
}

/// The session of the current request
///
/// Resumed from the cookie at the start of a handler and committed back to
/// the store (and the cookie jar) before responding.
#[derive(Debug)]
pub struct Session {
    id: String,
    pub data: SessionData,
}

impl Session {
    /// Resume the session named by the request cookie, or start a new one
    ///
    /// Unknown or expired ids are not reused; a fresh id is issued instead.
    pub fn resume(jar: &CookieJar, store: &dyn SessionStore) -> Self {
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            if let Some(data) = store.load(cookie.value()) {
                return Session {
                    id: cookie.value().to_string(),
                    data,
                };
            }
        }

        Session {
            id: Uuid::new_v4().to_string(),
            data: SessionData::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Persist the session and attach its cookie to the response jar
    pub fn commit(self, store: &dyn SessionStore, jar: CookieJar, config: &Config) -> CookieJar {
        let cookie = session_cookie(&self.id, config);
        store.save(&self.id, self.data);
        jar.add(cookie)
    }
}

fn session_cookie(id: &str, config: &Config) -> Cookie<'static> {
    let max_age = time::Duration::try_from(config.session_lifetime).unwrap_or(time::Duration::MAX);

    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .max_age(max_age)
        .build()
}
