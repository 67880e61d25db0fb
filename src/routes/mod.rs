use std::time::Duration;

use axum::{
    http::{header, HeaderName, Method},
    middleware, Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    middleware::{
        admin_guard::require_admin,
        auth_guard::require_member,
        paths::{ADMIN_STATIC_PATH, FRAME_STATIC_PATH, STATIC_PATH, UPLOADS_PATH},
    },
    state::AppState,
};

mod admin;
mod members;
mod pages;
mod site_auth;

/// Build the application router.
///
/// Every route sits behind the member guard, which exempts its configured
/// paths and the whole `/admin` subtree. Admin routes additionally carry the
/// admin guard.
pub fn build_router(state: AppState) -> Router {
    let member_mw = middleware::from_fn_with_state(state.clone(), require_member);
    let admin_mw  = middleware::from_fn_with_state(state.clone(), require_admin);
    let timeout   = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .merge(pages::router())
        .merge(site_auth::router())
        .merge(members::router())
        .merge(admin::router().route_layer(admin_mw))
        .route_layer(member_mw)
        .nest_service(STATIC_PATH,       ServeDir::new("static"))
        .nest_service(FRAME_STATIC_PATH, ServeDir::new("frame-static"))
        .nest_service(ADMIN_STATIC_PATH, ServeDir::new("admin-static"))
        .nest_service(UPLOADS_PATH,      ServeDir::new("uploads"))
        .layer(TimeoutLayer::new(timeout))
        .layer(CookieManagerLayer::new())   // must wrap both guards
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS, Method::PUT, Method::DELETE])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            HeaderName::from_static("x-csrf-token"),
            header::AUTHORIZATION,
        ])
}
