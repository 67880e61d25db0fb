//! Request-scoped identities built from session values.
//!
//! Reads never fail: a missing or wrongly typed value falls back to `""` for
//! strings and `0` for the member id, so a partially written session degrades
//! to "unauthenticated" instead of erroring.

use serde::Serialize;

use crate::{
    auth::session::Session,
    models::{Member, MemberStatus},
};

// ── Session keys ─────────────────────────────────────────────

pub const KEY_EMAIL:           &str = "email";
pub const KEY_FIRST_NAME:      &str = "firstName";
pub const KEY_LAST_NAME:       &str = "lastName";
pub const KEY_AVATAR_URL:      &str = "avatarURL";
pub const KEY_MEMBER_ID:       &str = "memberID";
pub const KEY_STATUS:          &str = "status";
pub const KEY_ADMIN_USER_NAME: &str = "adminUserName";

// ── Member ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MemberIdentity {
    #[serde(rename = "memberID")]
    pub member_id:  u64,
    pub email:      String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name:  String,
    #[serde(rename = "avatarURL")]
    pub avatar_url: String,
    pub status:     String,
}

impl MemberIdentity {
    /// | field        | key         | default |
    /// |--------------|-------------|---------|
    /// | `member_id`  | `memberID`  | `0`     |
    /// | `email`      | `email`     | `""`    |
    /// | `first_name` | `firstName` | `""`    |
    /// | `last_name`  | `lastName`  | `""`    |
    /// | `avatar_url` | `avatarURL` | `""`    |
    /// | `status`     | `status`    | `""`    |
    pub fn from_session(session: &Session) -> Self {
        Self {
            member_id:  session.get_u64(KEY_MEMBER_ID),
            email:      session.get_str(KEY_EMAIL).to_string(),
            first_name: session.get_str(KEY_FIRST_NAME).to_string(),
            last_name:  session.get_str(KEY_LAST_NAME).to_string(),
            avatar_url: session.get_str(KEY_AVATAR_URL).to_string(),
            status:     session.get_str(KEY_STATUS).to_string(),
        }
    }

    pub fn from_member(member: &Member) -> Self {
        Self {
            member_id:  member.id,
            email:      member.email.clone(),
            first_name: member.first_name.clone(),
            last_name:  member.last_name.clone(),
            avatar_url: member.avatar_url.clone(),
            status:     member.status.as_str().to_string(),
        }
    }

    pub fn write_to(&self, session: &mut Session) {
        session.insert(KEY_MEMBER_ID,  self.member_id);
        session.insert(KEY_EMAIL,      self.email.clone());
        session.insert(KEY_FIRST_NAME, self.first_name.clone());
        session.insert(KEY_LAST_NAME,  self.last_name.clone());
        session.insert(KEY_AVATAR_URL, self.avatar_url.clone());
        session.insert(KEY_STATUS,     self.status.clone());
    }

    /// A session without an email is the same as no session.
    pub fn is_authenticated(&self) -> bool {
        !self.email.is_empty()
    }

    pub fn is_active(&self) -> bool {
        MemberStatus::parse(&self.status) == Some(MemberStatus::Active)
    }
}

// ── Admin ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AdminIdentity {
    #[serde(rename = "adminUserName")]
    pub admin_user_name: String,
}

impl AdminIdentity {
    pub fn from_session(session: &Session) -> Self {
        Self { admin_user_name: session.get_str(KEY_ADMIN_USER_NAME).to_string() }
    }

    pub fn write_to(&self, session: &mut Session) {
        session.insert(KEY_ADMIN_USER_NAME, self.admin_user_name.clone());
    }

    pub fn is_authenticated(&self) -> bool {
        !self.admin_user_name.is_empty()
    }
}
