//! Shared application state, injected into every handler via `axum::extract::State`.

use std::sync::Arc;

use crate::{
    auth::session::SessionStores,
    config::Config,
    middleware::{admin_guard::AdminAuth, auth_guard::SiteAuth},
    services::{bucket::AvatarStorage, members::MemberRepository},
    templates::Templates,
};

/// Application-wide state passed via axum `State<AppState>`.
///
/// Every field is cheap to clone: the repository, templates and HTTP client
/// are `Arc`-backed, the rest are small owned values.
#[derive(Clone)]
pub struct AppState {
    pub config:     Config,
    pub members:    Arc<dyn MemberRepository>,
    pub sessions:   SessionStores,
    pub site_auth:  SiteAuth,
    pub admin_auth: AdminAuth,
    pub templates:  Templates,
    pub avatars:    AvatarStorage,
}

impl AppState {
    pub fn new(
        config: Config,
        members: Arc<dyn MemberRepository>,
        templates: Templates,
        avatars: AvatarStorage,
    ) -> Self {
        Self {
            sessions:   SessionStores::from_config(&config),
            site_auth:  SiteAuth::from_config(&config),
            admin_auth: AdminAuth::default(),
            config,
            members,
            templates,
            avatars,
        }
    }
}
