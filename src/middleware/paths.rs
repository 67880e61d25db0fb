//! Well-known route paths and the path-matching rules the auth guards use.

// ── Member routes ────────────────────────────────────────────

pub const SITE_AUTH_LOGIN_PATH:           &str = "/member/login";
pub const SITE_AUTH_LOGOUT_PATH:          &str = "/member/logout";
pub const SITE_AUTH_ACCOUNT_PENDING_PATH: &str = "/member/account-pending";
pub const MEMBER_SIGN_UP_PATH:            &str = "/member/create-account";
pub const MEMBER_PROFILE_PATH:            &str = "/member/profile";
pub const MEMBER_PROFILE_AVATAR_PATH:     &str = "/member/profile/avatar";
pub const MEMBER_API_CURRENT_MEMBER:      &str = "/api/member/current";
pub const MEMBER_API_LOGOUT:              &str = "/api/member/logout";
pub const UNEXPECTED_ERROR_PATH:          &str = "/errors/unexpected";

// ── Admin routes ─────────────────────────────────────────────

pub const ADMIN_PATH:        &str = "/admin";
pub const ADMIN_LOGIN_PATH:  &str = "/admin/login";
pub const ADMIN_LOGOUT_PATH: &str = "/admin/logout";

// ── Static assets ────────────────────────────────────────────

pub const STATIC_PATH:       &str = "/static";
pub const FRAME_STATIC_PATH: &str = "/frame-static";
pub const ADMIN_STATIC_PATH: &str = "/admin-static";
pub const UPLOADS_PATH:      &str = "/uploads";

/// Exclusions every member guard carries in addition to configured ones.
pub const MEMBER_DEFAULT_EXCLUSIONS: [&str; 10] = [
    STATIC_PATH,
    FRAME_STATIC_PATH,
    ADMIN_STATIC_PATH,
    UPLOADS_PATH,
    SITE_AUTH_ACCOUNT_PENDING_PATH,
    SITE_AUTH_LOGIN_PATH,
    SITE_AUTH_LOGOUT_PATH,
    MEMBER_SIGN_UP_PATH,
    UNEXPECTED_ERROR_PATH,
    ADMIN_PATH,
];

// ── Matching ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
}

impl PathPattern {
    /// Configured entries: `"/"` only ever matches the root itself; every
    /// other entry matches by prefix.
    pub fn parse(raw: &str) -> Self {
        if raw == "/" {
            PathPattern::Exact(raw.to_string())
        } else {
            PathPattern::Prefix(raw.to_string())
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p)  => path == p,
            PathPattern::Prefix(p) => path.starts_with(p.as_str()),
        }
    }
}

/// Ordered list of patterns; the first match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRules {
    patterns: Vec<PathPattern>,
}

impl PathRules {
    pub fn new(patterns: Vec<PathPattern>) -> Self {
        Self { patterns }
    }

    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Self {
        Self::new(raw.iter().map(|s| PathPattern::parse(s.as_ref())).collect())
    }

    pub fn extend<S: AsRef<str>>(&mut self, raw: &[S]) {
        self.patterns.extend(raw.iter().map(|s| PathPattern::parse(s.as_ref())));
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}
