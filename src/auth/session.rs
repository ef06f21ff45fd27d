//!
//! # Server-Side Sessions
//!
//! Authentication state lives on the server: logging in creates a session
//! entry keyed by an opaque random token, and the client only ever holds that
//! token in an HttpOnly cookie. Handlers talk to the [`SessionStore`] trait so
//! the backing can be swapped; the default is an in-process map, which is all
//! a single-node deployment needs.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use rand::{distributions::Alphanumeric, Rng};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::Config;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "tasknest_session";

const TOKEN_LEN: usize = 48;

/// Maps opaque tokens to user ids for the lifetime of a login.
///
/// Tokens are bearer credentials: anybody holding one is the user, so
/// implementations must never log or expose them.
pub trait SessionStore: Send + Sync {
    /// Creates a session for the user and returns its fresh token. A user may
    /// hold several live sessions at once.
    fn create(&self, user_id: i64) -> String;

    /// The user id behind a live token. Expired entries are purged on touch
    /// and resolve to `None`, exactly like unknown tokens.
    fn resolve(&self, token: &str) -> Option<i64>;

    /// Forgets the session. Unknown tokens are a no-op.
    fn destroy(&self, token: &str);

    /// Drops every session belonging to the user (account deletion).
    fn destroy_user_sessions(&self, user_id: i64);
}

struct SessionEntry {
    user_id: i64,
    expires_at: Instant,
}

/// In-process session store with a fixed time-to-live per entry.
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entries currently held, expired ones included until touched.
    pub fn count(&self) -> usize {
        self.locked().len()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().expect("session store lock poisoned")
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self, user_id: i64) -> String {
        let token = generate_token();
        self.locked().insert(
            token.clone(),
            SessionEntry {
                user_id,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    fn resolve(&self, token: &str) -> Option<i64> {
        let mut sessions = self.locked();
        if let Some(entry) = sessions.get(token) {
            if entry.expires_at > Instant::now() {
                return Some(entry.user_id);
            }
            // expired: purge on touch
            sessions.remove(token);
        }
        None
    }

    fn destroy(&self, token: &str) {
        self.locked().remove(token);
    }

    fn destroy_user_sessions(&self, user_id: i64) {
        self.locked().retain(|_, entry| entry.user_id != user_id);
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// The session cookie handed out on login: HttpOnly so scripts cannot read
/// it, SameSite=Lax as the CSRF baseline, lifetime matching the session TTL.
pub fn issue_cookie(token: &str, config: &Config) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(CookieDuration::seconds(config.session_ttl_secs as i64))
        .finish()
}

/// An expired empty cookie that tells the browser to drop the session.
pub fn clear_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}
