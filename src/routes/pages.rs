//! Public pages: home and the generic error page.

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use tower_cookies::Cookies;

use crate::{
    auth::identity::MemberIdentity,
    middleware::paths::UNEXPECTED_ERROR_PATH,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/",                   get(home))
        .route(UNEXPECTED_ERROR_PATH, get(unexpected_error))
}

/// GET /. Exempt from auth by default, so the member (if any) is read from
/// the session directly.
async fn home(State(state): State<AppState>, cookies: Cookies) -> Response {
    let mut ctx = state.templates.context();

    let member = state
        .sessions
        .member
        .get(&cookies)
        .ok()
        .map(|session| MemberIdentity::from_session(&session))
        .filter(MemberIdentity::is_authenticated);
    if let Some(member) = member {
        ctx.insert("member", &member);
    }

    state.templates.render("home.html", &ctx)
}

/// GET /errors/unexpected
async fn unexpected_error(State(state): State<AppState>) -> Response {
    let ctx = state.templates.context();
    state.templates.render_with_status(StatusCode::INTERNAL_SERVER_ERROR, "unexpected-error.html", &ctx)
}
