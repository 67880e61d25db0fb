//! Test fixtures: configuration, an in-memory member repository and helpers
//! for driving the router with cookies.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use chrono::{NaiveDateTime, Utc};
use time::Duration as CookieDuration;
use tower::ServiceExt;
use tower_cookies::Cookie;

use crate::{
    auth::hash_password,
    config::Config,
    models::{
        Member, MemberRole, MemberStatus, NewMember, NewMemberRole, BASE_MEMBER_ROLE,
        BASE_MEMBER_ROLE_ID,
    },
    routes::build_router,
    services::{
        bucket::AvatarStorage,
        members::{MemberRepository, RepoResult},
    },
    state::AppState,
    templates::Templates,
};

pub fn test_config() -> Config {
    Config {
        app_name:             "Frame".into(),
        debug:                true,
        log_level:            "debug".into(),
        server_host:          "127.0.0.1".into(),
        server_port:          0,
        request_timeout_secs: 5,
        db_host:              "localhost".into(),
        db_port:              3306,
        db_name:              "frame_test".into(),
        db_user:              "frame".into(),
        db_password:          "frame".into(),
        session_name:          "frame-session".into(),
        session_key:           "member-signing-secret".into(),
        session_max_age:       86_400,
        admin_session_name:    "frame-admin-session".into(),
        admin_session_key:     "admin-signing-secret".into(),
        admin_session_max_age: 3_600,
        root_user_name:        "root".into(),
        root_user_password:    "root-password".into(),
        paths_excluded_from_auth: vec!["/".into()],
        html_paths:               vec!["/member".into()],
        page_size:                     2,
        deleted_member_retention_days: 30,
        member_purge_schedule:         "0 0 3 * * *".into(),
        gobucket_url:         String::new(),
        gobucket_app_key:     String::new(),
        gobucket_client_code: String::new(),
        template_dir:         None,
    }
}

pub fn days_ago(days: i64) -> NaiveDateTime {
    Utc::now().naive_utc() - chrono::Duration::days(days)
}

// ── In-memory repository ─────────────────────────────────────

#[derive(Default)]
struct Store {
    members: Vec<Member>,
    roles:   Vec<MemberRole>,
    next_id: u64,
}

#[derive(Clone)]
pub struct InMemoryMembers {
    store: Arc<Mutex<Store>>,
}

impl Default for InMemoryMembers {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMembers {
    /// Starts with the base member role only.
    pub fn new() -> Self {
        let store = Store {
            members: Vec::new(),
            roles: vec![MemberRole {
                id:        BASE_MEMBER_ROLE_ID,
                role_name: BASE_MEMBER_ROLE.into(),
                color:     "#6c757d".into(),
            }],
            next_id: 1,
        };
        Self { store: Arc::new(Mutex::new(store)) }
    }

    /// Adds a member with the given plaintext password.
    pub fn insert(&self, email: &str, password: &str, status: MemberStatus) -> Member {
        let now = Utc::now().naive_utc();
        let mut store = self.store.lock().unwrap();
        let role = store.roles[0].clone();
        let member = Member {
            id:            store.next_id,
            email:         email.into(),
            first_name:    "Ada".into(),
            last_name:     "Lovelace".into(),
            avatar_url:    String::new(),
            password_hash: hash_password(password).unwrap(),
            role,
            status,
            created_at:    now,
            updated_at:    now,
            deleted_at:    None,
        };
        store.next_id += 1;
        store.members.push(member.clone());
        member
    }

    pub fn set_deleted_at(&self, id: u64, at: NaiveDateTime) {
        let mut store = self.store.lock().unwrap();
        if let Some(m) = store.members.iter_mut().find(|m| m.id == id) {
            m.deleted_at = Some(at);
        }
    }

    pub fn get(&self, id: u64) -> Option<Member> {
        self.store.lock().unwrap().members.iter().find(|m| m.id == id).cloned()
    }

    fn update<F: FnOnce(&mut Member)>(&self, id: u64, f: F) -> bool {
        let mut store = self.store.lock().unwrap();
        match store.members.iter_mut().find(|m| m.id == id && m.deleted_at.is_none()) {
            Some(member) => {
                f(member);
                member.updated_at = Utc::now().naive_utc();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl MemberRepository for InMemoryMembers {
    async fn find_by_email(&self, email: &str, include_deleted: bool) -> RepoResult<Option<Member>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .members
            .iter()
            .find(|m| m.email == email && (include_deleted || m.deleted_at.is_none()))
            .cloned())
    }

    async fn find_by_id(&self, id: u64) -> RepoResult<Option<Member>> {
        let store = self.store.lock().unwrap();
        Ok(store.members.iter().find(|m| m.id == id && m.deleted_at.is_none()).cloned())
    }

    async fn list(&self, page: u32, page_size: u32, include_deleted: bool) -> RepoResult<Vec<Member>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .members
            .iter()
            .filter(|m| include_deleted || m.deleted_at.is_none())
            .skip(page as usize * page_size as usize)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, include_deleted: bool) -> RepoResult<u64> {
        let store = self.store.lock().unwrap();
        Ok(store.members.iter().filter(|m| include_deleted || m.deleted_at.is_none()).count() as u64)
    }

    async fn create(&self, new: NewMember) -> RepoResult<Member> {
        let now = Utc::now().naive_utc();
        let mut store = self.store.lock().unwrap();
        let role = store
            .roles
            .iter()
            .find(|r| r.id == new.role_id)
            .cloned()
            .ok_or(sqlx::Error::RowNotFound)?;
        let member = Member {
            id:            store.next_id,
            email:         new.email,
            first_name:    new.first_name,
            last_name:     new.last_name,
            avatar_url:    String::new(),
            password_hash: new.password_hash,
            role,
            status:        new.status,
            created_at:    now,
            updated_at:    now,
            deleted_at:    None,
        };
        store.next_id += 1;
        store.members.push(member.clone());
        Ok(member)
    }

    async fn update_profile(&self, id: u64, first_name: &str, last_name: &str) -> RepoResult<()> {
        self.update(id, |m| {
            m.first_name = first_name.into();
            m.last_name = last_name.into();
        });
        Ok(())
    }

    async fn update_password(&self, id: u64, password_hash: &str) -> RepoResult<()> {
        self.update(id, |m| m.password_hash = password_hash.into());
        Ok(())
    }

    async fn update_avatar(&self, id: u64, avatar_url: &str) -> RepoResult<()> {
        self.update(id, |m| m.avatar_url = avatar_url.into());
        Ok(())
    }

    async fn update_role(&self, id: u64, role_id: u64) -> RepoResult<()> {
        let role = self.role_by_id(role_id).await?.ok_or(sqlx::Error::RowNotFound)?;
        self.update(id, |m| m.role = role);
        Ok(())
    }

    async fn set_status(&self, id: u64, status: MemberStatus) -> RepoResult<bool> {
        Ok(self.update(id, |m| m.status = status))
    }

    async fn soft_delete(&self, id: u64) -> RepoResult<bool> {
        Ok(self.update(id, |m| m.deleted_at = Some(Utc::now().naive_utc())))
    }

    async fn purge_deleted(&self, older_than_days: u32) -> RepoResult<u64> {
        let cutoff = days_ago(older_than_days as i64);
        let mut store = self.store.lock().unwrap();
        let before = store.members.len();
        store.members.retain(|m| !matches!(m.deleted_at, Some(at) if at < cutoff));
        Ok((before - store.members.len()) as u64)
    }

    async fn roles(&self) -> RepoResult<Vec<MemberRole>> {
        Ok(self.store.lock().unwrap().roles.clone())
    }

    async fn role_by_id(&self, id: u64) -> RepoResult<Option<MemberRole>> {
        Ok(self.store.lock().unwrap().roles.iter().find(|r| r.id == id).cloned())
    }

    async fn role_by_name(&self, name: &str) -> RepoResult<Option<MemberRole>> {
        Ok(self.store.lock().unwrap().roles.iter().find(|r| r.role_name == name).cloned())
    }

    async fn create_role(&self, role: NewMemberRole) -> RepoResult<MemberRole> {
        let mut store = self.store.lock().unwrap();
        let id = store.roles.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let role = MemberRole { id, role_name: role.role_name, color: role.color };
        store.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role_def(&self, id: u64, role: NewMemberRole) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        match store.roles.iter_mut().find(|r| r.id == id) {
            Some(existing) => {
                existing.role_name = role.role_name;
                existing.color = role.color;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ── Router helpers ───────────────────────────────────────────

pub fn test_state() -> (AppState, InMemoryMembers) {
    let members = InMemoryMembers::new();
    let config = test_config();
    let templates = Templates::builtin(&config.app_name).unwrap();
    let avatars = AvatarStorage::local(
        std::env::temp_dir().join(format!("frame-test-avatars-{}", uuid::Uuid::new_v4())),
        "/uploads/avatars",
    );
    let state = AppState::new(config, Arc::new(members.clone()), templates, avatars);
    (state, members)
}

pub fn test_app() -> (Router, AppState, InMemoryMembers) {
    let (state, members) = test_state();
    (build_router(state.clone()), state, members)
}

pub async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub fn get(uri: &str, cookies: &CookieJar) -> Request<Body> {
    let mut req = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookies.header() {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

pub fn form(method: &str, uri: &str, fields: &[(&str, &str)], cookies: &CookieJar) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookies.header() {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(body)).unwrap()
}

/// `name=value` pairs from every `Set-Cookie` on `response`, joined for use
/// as a request `Cookie` header.
pub fn set_cookie_pairs(response: &Response) -> String {
    let mut jar = CookieJar::default();
    jar.absorb(response);
    jar.header().unwrap_or_default()
}

/// Minimal client-side cookie jar: stores what responses set and drops what
/// they clear.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn absorb(&mut self, response: &Response) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Ok(cookie) = Cookie::parse(raw) else { continue };
            let cleared = cookie.value().is_empty() || cookie.max_age() == Some(CookieDuration::ZERO);
            if cleared {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies.insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn response_setting(cookies: &[&str]) -> Response {
        let mut response = Response::new(Body::empty());
        for cookie in cookies {
            response
                .headers_mut()
                .append(header::SET_COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        response
    }

    #[test]
    fn jar_keeps_set_cookies_and_drops_cleared_ones() {
        let mut jar = CookieJar::default();
        jar.absorb(&response_setting(&[
            "member=abc; Path=/; HttpOnly; Max-Age=600",
            "admin=xyz=; Path=/; SameSite=Lax",
        ]));
        assert_eq!(jar.value("member"), Some("abc"));
        assert_eq!(jar.value("admin"), Some("xyz="));

        jar.absorb(&response_setting(&["member=; Path=/; Max-Age=0"]));
        assert_eq!(jar.value("member"), None);

        jar.absorb(&response_setting(&["admin=stale; Path=/; Max-Age=0"]));
        assert_eq!(jar.value("admin"), None);
        assert!(jar.header().is_none());
    }
}
