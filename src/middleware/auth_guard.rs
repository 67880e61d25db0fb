//! Member authentication guard.
//!
//! Wraps every member-facing route. Per request it decides, in order:
//!
//! 1. exempt path: pass through untouched
//! 2. unreadable session: redirect to the unexpected-error page
//! 3. no `email` in the session: unauthorized (login redirect or JSON 401)
//! 4. status other than `Active`: redirect to the account-pending page
//! 5. otherwise: insert [`MemberIdentity`] into request extensions

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tower_cookies::Cookies;

use crate::{
    auth::identity::MemberIdentity,
    config::Config,
    http::{found, real_ip, unexpected_error},
    middleware::paths::{
        PathRules, MEMBER_DEFAULT_EXCLUSIONS, SITE_AUTH_ACCOUNT_PENDING_PATH, SITE_AUTH_LOGIN_PATH,
    },
    state::AppState,
};

/// Which member paths skip authentication, and which ones expect HTML.
#[derive(Debug, Clone)]
pub struct SiteAuth {
    pub excluded:   PathRules,
    pub html_paths: PathRules,
}

impl SiteAuth {
    /// Configured exclusions are checked first, then the built-in ones.
    pub fn from_config(config: &Config) -> Self {
        let mut excluded = PathRules::parse(&config.paths_excluded_from_auth);
        excluded.extend(&MEMBER_DEFAULT_EXCLUSIONS);

        Self {
            excluded,
            html_paths: PathRules::parse(&config.html_paths),
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.excluded.matches(path)
    }
}

/// Failure response for an unauthenticated request: a login redirect carrying
/// `referer` for HTML paths, a JSON 401 for everything else.
pub fn unauthorized_response(path: &str, html_paths: &PathRules, login_path: &str) -> Response {
    if html_paths.matches(path) {
        return found(&format!("{login_path}?referer={}", urlencoding::encode(path)));
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "error":   "User unauthorized",
            "status":  401,
        })),
    )
        .into_response()
}

/// Middleware: require an authenticated, active member session.
pub async fn require_member(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();

    if state.site_auth.is_exempt(&path) {
        return next.run(req).await;
    }

    let session = match state.sessions.member.get(&cookies) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, ip = %real_ip(&req), path = %path, "Unable to read member session");
            return unexpected_error();
        }
    };

    let identity = MemberIdentity::from_session(&session);

    if !identity.is_authenticated() {
        tracing::warn!(ip = %real_ip(&req), path = %path, "Unauthorized member request");
        return unauthorized_response(&path, &state.site_auth.html_paths, SITE_AUTH_LOGIN_PATH);
    }

    if !identity.is_active() {
        tracing::warn!(
            ip        = %real_ip(&req),
            path      = %path,
            member_id = identity.member_id,
            status    = %identity.status,
            "Member account is not active"
        );
        return found(SITE_AUTH_ACCOUNT_PENDING_PATH);
    }

    req.extensions_mut().insert(identity);
    next.run(req).await
}
