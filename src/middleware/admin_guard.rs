//! Admin authentication guard.
//!
//! Binary check against the admin session only: an `adminUserName` value is
//! either present or the request is unauthorized. There is no pending state.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    auth::identity::AdminIdentity,
    http::{real_ip, unexpected_error},
    middleware::{
        auth_guard::unauthorized_response,
        paths::{PathPattern, PathRules, ADMIN_LOGIN_PATH, ADMIN_PATH},
    },
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub excluded:   PathRules,
    pub html_paths: PathRules,
}

impl Default for AdminAuth {
    fn default() -> Self {
        Self {
            excluded: PathRules::parse(&[ADMIN_LOGIN_PATH, "/frame-static/", "/admin-static/"]),
            // The dashboard root is matched exactly so the JSON API under
            // `/admin/api` keeps its 401 body.
            html_paths: PathRules::new(vec![
                PathPattern::Exact(ADMIN_PATH.into()),
                PathPattern::Prefix("/admin/members/".into()),
                PathPattern::Prefix("/admin/roles/".into()),
                PathPattern::Prefix("/admin/logout".into()),
            ]),
        }
    }
}

impl AdminAuth {
    pub fn is_exempt(&self, path: &str) -> bool {
        self.excluded.matches(path)
    }
}

/// Middleware: require an admin session.
pub async fn require_admin(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();

    if state.admin_auth.is_exempt(&path) {
        return next.run(req).await;
    }

    let session = match state.sessions.admin.get(&cookies) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, ip = %real_ip(&req), path = %path, "Unable to read admin session");
            return unexpected_error();
        }
    };

    let identity = AdminIdentity::from_session(&session);

    if !identity.is_authenticated() {
        tracing::warn!(ip = %real_ip(&req), path = %path, "Unauthorized admin request");
        return unauthorized_response(&path, &state.admin_auth.html_paths, ADMIN_LOGIN_PATH);
    }

    req.extensions_mut().insert(identity);
    next.run(req).await
}
