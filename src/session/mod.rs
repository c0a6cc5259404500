//! Session lifecycle: token storage, expiry buffering and validity checks.

mod auth_error;

pub use auth_error::{is_auth_expired_error, is_auth_failure, matched_auth_pattern};

use std::sync::{Arc, Mutex};

use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::logging;
use crate::model::{Navigation, Screen, Secret};
use crate::storage::{keys, StoragePort};

/// Safety margin subtracted from the provider's token lifetime at write time.
pub const EXPIRY_BUFFER_SECS: f64 = 30.0;

// Lifetimes beyond this are clamped so expiry arithmetic cannot overflow.
const MAX_LIFETIME_SECS: f64 = 10.0 * 365.0 * 24.0 * 3600.0;

/// Source of "now" for expiry math.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn at_unix(seconds: i64) -> Self {
        let now = OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH);
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set_unix(&self, seconds: i64) {
        if let Ok(t) = OffsetDateTime::from_unix_timestamp(seconds) {
            *self.now.lock().unwrap_or_else(|e| e.into_inner()) = t;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Snapshot of the stored credentials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<Secret>,
    pub refresh_token: Option<Secret>,
    pub expires_at: Option<OffsetDateTime>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.expires_at.is_none()
    }
}

/// Sole owner of the session keys in client storage.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn StoragePort>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn StoragePort>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub fn with_system_clock(storage: Arc<dyn StoragePort>) -> Self {
        Self::new(storage, Arc::new(SystemClock))
    }

    /// Current stored session. Absent or malformed fields read as `None`.
    pub fn read(&self) -> Session {
        let non_empty = |key: &str| self.storage.get(key).filter(|v| !v.is_empty());
        Session {
            access_token: non_empty(keys::ACCESS_TOKEN).map(Secret::new),
            refresh_token: non_empty(keys::REFRESH_TOKEN).map(Secret::new),
            expires_at: non_empty(keys::EXPIRES_AT).and_then(|raw| parse_unix_millis(&raw)),
        }
    }

    /// Token present and `now` strictly before the buffered expiry.
    /// A missing expiry counts as expired.
    pub fn is_valid(&self) -> bool {
        let session = self.read();
        match (session.access_token, session.expires_at) {
            (Some(_), Some(expires_at)) => self.clock.now() < expires_at,
            _ => false,
        }
    }

    /// Store a freshly issued token.
    ///
    /// The expiry is only written for a finite `expires_in_seconds`; callers that omit
    /// it get a session that [`is_valid`](Self::is_valid) treats as expired. The refresh
    /// token is only overwritten when a non-empty one is supplied.
    pub fn save(
        &self,
        access_token: &str,
        expires_in_seconds: Option<f64>,
        refresh_token: Option<&str>,
    ) {
        self.storage.set(keys::ACCESS_TOKEN, access_token);

        if let Some(secs) = expires_in_seconds.filter(|s| s.is_finite()) {
            let lifetime = (secs - EXPIRY_BUFFER_SECS).clamp(0.0, MAX_LIFETIME_SECS);
            let expires_at = self.clock.now() + Duration::milliseconds((lifetime * 1000.0).round() as i64);
            self.storage
                .set(keys::EXPIRES_AT, &to_unix_millis(expires_at).to_string());
        }

        if let Some(refresh) = refresh_token.filter(|r| !r.is_empty()) {
            self.storage.set(keys::REFRESH_TOKEN, refresh);
        }
        debug!(
            has_expiry = expires_in_seconds.is_some_and(f64::is_finite),
            has_refresh = refresh_token.is_some_and(|r| !r.is_empty()),
            "session saved"
        );
    }

    /// Remove all session fields. Idempotent.
    pub fn clear(&self) {
        self.storage.remove(keys::ACCESS_TOKEN);
        self.storage.remove(keys::EXPIRES_AT);
        self.storage.remove(keys::REFRESH_TOKEN);
        debug!("session cleared");
    }

    /// Protected-screen check. An invalid session is cleared and the caller is
    /// sent to login.
    pub fn guard(&self, screen: Screen) -> Option<Navigation> {
        if self.is_valid() {
            return None;
        }
        self.clear();
        logging::report_event(screen, "session missing or expired, redirecting to login");
        Some(Navigation::Redirect(Screen::Login))
    }

    /// Remember the OAuth `state` sent with the authorize redirect.
    pub fn remember_oauth_state(&self, state: &str) {
        self.storage.set(keys::OAUTH_STATE, state);
    }

    /// Take (and forget) the remembered OAuth `state`.
    pub fn take_oauth_state(&self) -> Option<String> {
        let state = self.storage.get(keys::OAUTH_STATE).filter(|s| !s.is_empty());
        self.storage.remove(keys::OAUTH_STATE);
        state
    }

    /// Raw access token for an authenticated upstream call, if the session is valid.
    pub fn access_token(&self) -> Option<Secret> {
        if self.is_valid() {
            self.read().access_token
        } else {
            None
        }
    }
}

fn to_unix_millis(t: OffsetDateTime) -> i64 {
    (t.unix_timestamp_nanos() / 1_000_000) as i64
}

fn parse_unix_millis(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    let millis = match raw.parse::<i64>() {
        Ok(ms) => ms,
        Err(_) => {
            let f = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
            f as i64
        }
    };
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store_at(seconds: i64) -> (SessionStore, Arc<ManualClock>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::at_unix(seconds));
        let store = SessionStore::new(storage.clone(), clock.clone());
        (store, clock, storage)
    }

    fn unix(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(seconds).unwrap()
    }

    #[test]
    fn save_read_and_expire_scenario() {
        let (store, clock, _) = store_at(1000);
        store.save("tok1", Some(3600.0), Some("ref1"));

        let session = store.read();
        assert_eq!(session.access_token, Some(Secret::new("tok1")));
        assert_eq!(session.refresh_token, Some(Secret::new("ref1")));
        assert_eq!(session.expires_at, Some(unix(4570)));

        clock.set_unix(4000);
        assert!(store.is_valid());
        clock.set_unix(4570);
        assert!(!store.is_valid());
        clock.set_unix(4600);
        assert!(!store.is_valid());
    }

    #[test]
    fn expiry_buffer_is_exact_for_long_lifetimes() {
        for lifetime in [30_i64, 31, 60, 3600, 86_400] {
            let (store, _, _) = store_at(5000);
            store.save("t", Some(lifetime as f64), None);
            assert_eq!(store.read().expires_at, Some(unix(5000 + lifetime - 30)));
        }
    }

    #[test]
    fn short_lifetimes_clamp_to_issue_time() {
        for lifetime in [0.0, 1.0, 29.0, -100.0] {
            let (store, _, _) = store_at(5000);
            store.save("t", Some(lifetime), None);
            assert_eq!(store.read().expires_at, Some(unix(5000)));
            assert!(!store.is_valid());
        }
    }

    #[test]
    fn non_finite_lifetime_writes_no_expiry() {
        let (store, _, _) = store_at(5000);
        store.save("t", Some(f64::NAN), None);
        assert_eq!(store.read().expires_at, None);
        store.save("t", Some(f64::INFINITY), None);
        assert_eq!(store.read().expires_at, None);
    }

    #[test]
    fn missing_token_is_never_valid() {
        let (store, _, storage) = store_at(1000);
        storage.set(keys::EXPIRES_AT, "99999999999");
        assert!(!store.is_valid());

        storage.set(keys::ACCESS_TOKEN, "");
        assert!(!store.is_valid());
    }

    #[test]
    fn missing_expiry_fails_closed() {
        let (store, _, _) = store_at(1000);
        store.save("tok", None, None);
        assert!(store.read().access_token.is_some());
        assert!(!store.is_valid());
    }

    #[test]
    fn refresh_token_is_preserved_when_omitted() {
        let (store, _, _) = store_at(1000);
        store.save("tok1", Some(3600.0), Some("ref1"));
        store.save("tok2", Some(3600.0), None);
        store.save("tok3", Some(3600.0), Some(""));

        let session = store.read();
        assert_eq!(session.access_token, Some(Secret::new("tok3")));
        assert_eq!(session.refresh_token, Some(Secret::new("ref1")));
    }

    #[test]
    fn clear_is_total_and_idempotent() {
        let (store, _, storage) = store_at(1000);
        store.save("tok1", Some(3600.0), Some("ref1"));

        store.clear();
        assert!(store.read().is_empty());
        assert!(storage.is_empty());

        store.clear();
        assert!(store.read().is_empty());
    }

    #[test]
    fn malformed_expiry_reads_as_absent() {
        let (store, _, storage) = store_at(1000);
        storage.set(keys::ACCESS_TOKEN, "tok");
        storage.set(keys::EXPIRES_AT, "soon");
        assert_eq!(store.read().expires_at, None);
        assert!(!store.is_valid());
    }

    #[test]
    fn guard_clears_invalid_session_and_redirects() {
        let (store, clock, storage) = store_at(1000);
        store.save("tok1", Some(3600.0), Some("ref1"));
        assert_eq!(store.guard(Screen::Save), None);

        clock.set_unix(10_000);
        assert_eq!(
            store.guard(Screen::Save),
            Some(Navigation::Redirect(Screen::Login))
        );
        assert!(storage.is_empty());
    }

    #[test]
    fn oauth_state_is_taken_once() {
        let (store, _, _) = store_at(1000);
        store.remember_oauth_state("abc");
        assert_eq!(store.take_oauth_state().as_deref(), Some("abc"));
        assert_eq!(store.take_oauth_state(), None);
    }

    #[test]
    fn access_token_requires_valid_session() {
        let (store, clock, _) = store_at(1000);
        store.save("tok1", Some(3600.0), None);
        assert_eq!(store.access_token(), Some(Secret::new("tok1")));
        clock.set_unix(5000);
        assert_eq!(store.access_token(), None);
    }
}
