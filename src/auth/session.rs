//! Signed-cookie session store.
//!
//! A session is a JSON object of string keys to arbitrary values, carried in a
//! single HMAC-signed cookie. Each trust domain (member, admin) owns its own
//! [`CookieSessionStore`] with a distinct cookie name and signing key, so a
//! cookie minted by one store never verifies under the other.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;
use sha2::{Digest, Sha512};
use thiserror::Error;
use time::Duration as CookieDuration;
use tower_cookies::{cookie::SameSite, Cookie, Cookies, Key};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum SessionError {
    /// A cookie with the session's name exists but its signature or payload
    /// does not check out.
    #[error("session cookie `{0}` is corrupt or was not signed by this store")]
    Corrupt(String),
    #[error("failed to write session cookie `{0}`: {1}")]
    WriteFailed(String, String),
}

// ── Session ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    values:      BTreeMap<String, Value>,
    /// Seconds until expiry. Negative means "delete on save".
    pub max_age: i64,
}

impl Session {
    pub fn new(max_age: i64) -> Self {
        Self { values: BTreeMap::new(), max_age }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value for `key`, or `""` when missing or not a string.
    pub fn get_str(&self, key: &str) -> &str {
        self.values.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Unsigned integer value for `key`, or `0` when missing or not a
    /// non-negative integer.
    pub fn get_u64(&self, key: &str) -> u64 {
        self.values.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Drop every value and mark the session for deletion on the next save.
    pub fn expire(&mut self) {
        self.values.clear();
        self.max_age = -1;
    }
}

// ── Store ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CookieSessionStore {
    name:    String,
    key:     Key,
    max_age: i64,
    secure:  bool,
}

impl std::fmt::Debug for CookieSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSessionStore")
            .field("name", &self.name)
            .field("max_age", &self.max_age)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl CookieSessionStore {
    /// `secret` may be any length; it is stretched to the 64 bytes the
    /// signing key needs with SHA-512.
    pub fn new(name: impl Into<String>, secret: &str, max_age: i64, secure: bool) -> Self {
        let digest = Sha512::digest(secret.as_bytes());
        Self {
            name: name.into(),
            key: Key::from(digest.as_slice()),
            max_age,
            secure,
        }
    }

    /// Empty session with this store's max-age.
    pub fn new_session(&self) -> Session {
        Session::new(self.max_age)
    }

    /// Load the session for this request. A request without the cookie gets
    /// a fresh, empty session.
    pub fn get(&self, cookies: &Cookies) -> Result<Session, SessionError> {
        // Absent, or an already-cleared cookie the client sent back anyway.
        match cookies.get(&self.name) {
            Some(raw) if !raw.value().is_empty() => {}
            _ => return Ok(Session::new(self.max_age)),
        }

        let cookie = cookies
            .signed(&self.key)
            .get(&self.name)
            .ok_or_else(|| SessionError::Corrupt(self.name.clone()))?;

        let decoded = URL_SAFE_NO_PAD
            .decode(cookie.value())
            .map_err(|_| SessionError::Corrupt(self.name.clone()))?;
        let values: BTreeMap<String, Value> = serde_json::from_slice(&decoded)
            .map_err(|_| SessionError::Corrupt(self.name.clone()))?;

        Ok(Session { values, max_age: self.max_age })
    }

    /// Persist `session` into the response cookies. A negative `max_age`
    /// clears the cookie on the client.
    pub fn save(&self, cookies: &Cookies, session: &Session) -> Result<(), SessionError> {
        if session.max_age < 0 {
            let cookie = Cookie::build((self.name.clone(), ""))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(self.secure)
                .max_age(CookieDuration::ZERO)
                .build();
            cookies.add(cookie);
            return Ok(());
        }

        // Request cookies are percent-decoded before the signature check, so
        // the signed value must not contain `%`.
        let payload = serde_json::to_vec(&session.values)
            .map_err(|e| SessionError::WriteFailed(self.name.clone(), e.to_string()))?;

        let cookie = Cookie::build((self.name.clone(), URL_SAFE_NO_PAD.encode(payload)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(CookieDuration::seconds(session.max_age))
            .build();
        cookies.signed(&self.key).add(cookie);
        Ok(())
    }
}

/// The two independent session stores.
#[derive(Debug, Clone)]
pub struct SessionStores {
    pub member: CookieSessionStore,
    pub admin:  CookieSessionStore,
}

impl SessionStores {
    pub fn from_config(config: &Config) -> Self {
        let secure = config.secure_cookies();
        Self {
            member: CookieSessionStore::new(
                config.session_name.clone(),
                &config.session_key,
                config.session_max_age,
                secure,
            ),
            admin: CookieSessionStore::new(
                config.admin_session_name.clone(),
                &config.admin_session_key,
                config.admin_session_max_age,
                secure,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::State,
        http::{header, Request, StatusCode},
        routing::get,
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;
    use tower_cookies::CookieManagerLayer;

    use crate::testing::set_cookie_pairs;

    fn store(secret: &str) -> CookieSessionStore {
        CookieSessionStore::new("sess", secret, 600, false)
    }

    async fn write(State(store): State<CookieSessionStore>, cookies: Cookies) -> StatusCode {
        let mut session = store.get(&cookies).unwrap();
        session.insert("email", "ada@example.com");
        session.insert("memberID", 7);
        store.save(&cookies, &session).unwrap();
        StatusCode::OK
    }

    async fn read(State(store): State<CookieSessionStore>, cookies: Cookies) -> (StatusCode, String) {
        match store.get(&cookies) {
            Ok(session) => (StatusCode::OK, session.get_str("email").to_string()),
            Err(SessionError::Corrupt(_)) => (StatusCode::CONFLICT, String::new()),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, String::new()),
        }
    }

    async fn clear(State(store): State<CookieSessionStore>, cookies: Cookies) -> StatusCode {
        let mut session = store.get(&cookies).unwrap();
        session.expire();
        store.save(&cookies, &session).unwrap();
        StatusCode::OK
    }

    fn app(store: CookieSessionStore) -> Router {
        Router::new()
            .route("/write", get(write))
            .route("/write-awkward", get(write_awkward))
            .route("/read", get(read))
            .route("/clear", get(clear))
            .layer(CookieManagerLayer::new())
            .with_state(store)
    }

    async fn send(app: Router, uri: &str, cookie: Option<&str>) -> axum::response::Response {
        let mut req = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn typed_reads_fall_back_on_wrong_types() {
        let mut session = Session::new(60);
        session.insert("email", 42);
        session.insert("memberID", "seven");
        assert_eq!(session.get_str("email"), "");
        assert_eq!(session.get_u64("memberID"), 0);
        assert_eq!(session.get_str("missing"), "");

        session.insert("memberID", json!(-3));
        assert_eq!(session.get_u64("memberID"), 0);
    }

    #[test]
    fn expire_clears_values_and_marks_for_deletion() {
        let mut session = Session::new(60);
        session.insert("email", "ada@example.com");
        session.expire();
        assert!(session.get("email").is_none());
        assert!(session.max_age < 0);
    }

    #[tokio::test]
    async fn missing_cookie_yields_empty_session() {
        let response = send(app(store("secret-a")), "/read", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn saved_session_round_trips_through_the_cookie() {
        let response = send(app(store("secret-a")), "/write", None).await;
        let cookie = set_cookie_pairs(&response);
        assert!(cookie.starts_with("sess="));

        let response = send(app(store("secret-a")), "/read", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ada@example.com");
    }

    async fn write_awkward(State(store): State<CookieSessionStore>, cookies: Cookies) -> StatusCode {
        let mut session = store.get(&cookies).unwrap();
        session.insert("email", "100%+ada@example.com");
        session.insert("note", "a=b; c&d %41");
        store.save(&cookies, &session).unwrap();
        StatusCode::OK
    }

    #[tokio::test]
    async fn values_with_percent_and_at_survive_the_round_trip() {
        let response = send(app(store("secret-a")), "/write-awkward", None).await;
        let cookie = set_cookie_pairs(&response);
        let value = cookie.trim_start_matches("sess=");
        assert!(!value.contains('%'), "{cookie}");

        let response = send(app(store("secret-a")), "/read", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "100%+ada@example.com");
    }

    #[tokio::test]
    async fn cookie_signed_with_another_key_is_corrupt() {
        let response = send(app(store("secret-a")), "/write", None).await;
        let cookie = set_cookie_pairs(&response);

        let response = send(app(store("secret-b")), "/read", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn tampered_cookie_is_corrupt() {
        let response = send(app(store("secret-a")), "/read", Some("sess=forged-value")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn expired_session_emits_clearing_cookie() {
        let response = send(app(store("secret-a")), "/clear", None).await;
        let raw = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(raw.starts_with("sess=;"), "{raw}");
        assert!(raw.contains("Max-Age=0"), "{raw}");
    }

    #[tokio::test]
    async fn cookie_attributes_follow_store_settings() {
        let secure = CookieSessionStore::new("sess", "secret-a", 600, true);
        let response = send(app(secure), "/write", None).await;
        let raw = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(raw.contains("HttpOnly"));
        assert!(raw.contains("Secure"));
        assert!(raw.contains("Path=/"));
        assert!(raw.contains("Max-Age=600"));
    }
}
