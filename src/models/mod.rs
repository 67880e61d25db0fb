use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ── Member status ────────────────────────────────────────────

/// Membership lifecycle. The numeric ids are stable and match the
/// `member_statuses` seed rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemberStatus {
    #[serde(rename = "Pending Approval")]
    PendingApproval,
    Active,
    Inactive,
}

impl MemberStatus {
    pub const ALL: [MemberStatus; 3] = [
        MemberStatus::PendingApproval,
        MemberStatus::Active,
        MemberStatus::Inactive,
    ];

    pub fn id(self) -> u32 {
        match self {
            MemberStatus::PendingApproval => 1,
            MemberStatus::Active          => 2,
            MemberStatus::Inactive        => 3,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::PendingApproval => "Pending Approval",
            MemberStatus::Active          => "Active",
            MemberStatus::Inactive        => "Inactive",
        }
    }

    /// Unrecognized strings are `None`; callers treat that like "not active".
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Roles ────────────────────────────────────────────────────

/// Name of the seeded role every new member receives.
pub const BASE_MEMBER_ROLE: &str = "Member";

/// The base role is system generated and may not be edited.
pub const BASE_MEMBER_ROLE_ID: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberRole {
    pub id:        u64,
    pub role_name: String,
    pub color:     String,
}

#[derive(Debug, Clone)]
pub struct NewMemberRole {
    pub role_name: String,
    pub color:     String,
}

// ── Members ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id:            u64,
    pub email:         String,
    pub first_name:    String,
    pub last_name:     String,
    #[serde(rename = "avatarURL")]
    pub avatar_url:    String,
    #[serde(skip)]
    pub password_hash: String,
    pub role:          MemberRole,
    #[serde(rename = "memberStatus")]
    pub status:        MemberStatus,
    pub created_at:    NaiveDateTime,
    pub updated_at:    NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at:    Option<NaiveDateTime>,
}

impl Member {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Joined row as read from MySQL; converted into [`Member`].
#[derive(Debug, sqlx::FromRow)]
pub struct MemberRow {
    pub id:            u64,
    pub email:         String,
    pub first_name:    String,
    pub last_name:     String,
    pub avatar_url:    String,
    pub password_hash: String,
    pub role_id:       u64,
    pub role_name:     String,
    pub role_color:    String,
    pub status_id:     u32,
    pub created_at:    NaiveDateTime,
    pub updated_at:    NaiveDateTime,
    pub deleted_at:    Option<NaiveDateTime>,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            id:            row.id,
            email:         row.email,
            first_name:    row.first_name,
            last_name:     row.last_name,
            avatar_url:    row.avatar_url,
            password_hash: row.password_hash,
            role: MemberRole {
                id:        row.role_id,
                role_name: row.role_name,
                color:     row.role_color,
            },
            // A status id outside the seeded set never authorizes anything.
            status:     MemberStatus::from_id(row.status_id).unwrap_or(MemberStatus::Inactive),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub email:         String,
    pub first_name:    String,
    pub last_name:     String,
    pub password_hash: String,
    pub role_id:       u64,
    pub status:        MemberStatus,
}

/// Default picture shown when a member has not uploaded an avatar.
pub const BLANK_AVATAR_URL: &str = "/frame-static/images/blank-profile-picture.png";
