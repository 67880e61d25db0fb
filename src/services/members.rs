//! Member and role persistence.
//!
//! Handlers depend on the [`MemberRepository`] trait through `AppState`; the
//! MySQL implementation uses runtime queries (no `DATABASE_URL` needed at
//! compile time).

use async_trait::async_trait;

use crate::{
    db::Db,
    models::{Member, MemberRole, MemberRow, MemberStatus, NewMember, NewMemberRole},
};

pub type RepoResult<T> = Result<T, sqlx::Error>;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// `include_deleted` also returns soft-deleted members, so callers can
    /// tell a deleted account from an unknown one.
    async fn find_by_email(&self, email: &str, include_deleted: bool) -> RepoResult<Option<Member>>;
    async fn find_by_id(&self, id: u64) -> RepoResult<Option<Member>>;
    /// `page` is 0-based.
    async fn list(&self, page: u32, page_size: u32, include_deleted: bool) -> RepoResult<Vec<Member>>;
    async fn count(&self, include_deleted: bool) -> RepoResult<u64>;
    async fn create(&self, member: NewMember) -> RepoResult<Member>;
    async fn update_profile(&self, id: u64, first_name: &str, last_name: &str) -> RepoResult<()>;
    async fn update_password(&self, id: u64, password_hash: &str) -> RepoResult<()>;
    async fn update_avatar(&self, id: u64, avatar_url: &str) -> RepoResult<()>;
    async fn update_role(&self, id: u64, role_id: u64) -> RepoResult<()>;
    /// Returns `false` when no live member has this id.
    async fn set_status(&self, id: u64, status: MemberStatus) -> RepoResult<bool>;
    async fn soft_delete(&self, id: u64) -> RepoResult<bool>;
    /// Hard-deletes members soft-deleted more than `older_than_days` ago.
    async fn purge_deleted(&self, older_than_days: u32) -> RepoResult<u64>;

    async fn roles(&self) -> RepoResult<Vec<MemberRole>>;
    async fn role_by_id(&self, id: u64) -> RepoResult<Option<MemberRole>>;
    async fn role_by_name(&self, name: &str) -> RepoResult<Option<MemberRole>>;
    async fn create_role(&self, role: NewMemberRole) -> RepoResult<MemberRole>;
    async fn update_role_def(&self, id: u64, role: NewMemberRole) -> RepoResult<bool>;
}

// ── MySQL ────────────────────────────────────────────────────

const MEMBER_SELECT: &str =
    "SELECT m.id, m.email, m.first_name, m.last_name, m.avatar_url, m.password_hash,
            m.role_id, r.role_name, r.color AS role_color, m.status_id,
            m.created_at, m.updated_at, m.deleted_at
     FROM members m
     JOIN member_roles r ON r.id = m.role_id";

#[derive(Clone)]
pub struct MySqlMemberRepository {
    pool: Db,
}

impl MySqlMemberRepository {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for MySqlMemberRepository {
    async fn find_by_email(&self, email: &str, include_deleted: bool) -> RepoResult<Option<Member>> {
        let sql = if include_deleted {
            format!("{MEMBER_SELECT} WHERE m.email = ? LIMIT 1")
        } else {
            format!("{MEMBER_SELECT} WHERE m.email = ? AND m.deleted_at IS NULL LIMIT 1")
        };
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Member::from))
    }

    async fn find_by_id(&self, id: u64) -> RepoResult<Option<Member>> {
        let sql = format!("{MEMBER_SELECT} WHERE m.id = ? AND m.deleted_at IS NULL LIMIT 1");
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Member::from))
    }

    async fn list(&self, page: u32, page_size: u32, include_deleted: bool) -> RepoResult<Vec<Member>> {
        let filter = if include_deleted { "" } else { "WHERE m.deleted_at IS NULL" };
        let sql = format!(
            "{MEMBER_SELECT} {filter} ORDER BY m.last_name, m.first_name LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(page_size)
            .bind(page as u64 * page_size as u64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn count(&self, include_deleted: bool) -> RepoResult<u64> {
        let sql = if include_deleted {
            "SELECT COUNT(*) FROM members"
        } else {
            "SELECT COUNT(*) FROM members WHERE deleted_at IS NULL"
        };
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn create(&self, member: NewMember) -> RepoResult<Member> {
        let result = sqlx::query(
            "INSERT INTO members (email, first_name, last_name, avatar_url, password_hash, role_id, status_id, created_at, updated_at)
             VALUES (?, ?, ?, '', ?, ?, ?, UTC_TIMESTAMP(), UTC_TIMESTAMP())",
        )
        .bind(&member.email)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.password_hash)
        .bind(member.role_id)
        .bind(member.status.id())
        .execute(&self.pool)
        .await?;

        self.find_by_id(result.last_insert_id())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    async fn update_profile(&self, id: u64, first_name: &str, last_name: &str) -> RepoResult<()> {
        sqlx::query(
            "UPDATE members SET first_name = ?, last_name = ?, updated_at = UTC_TIMESTAMP()
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_password(&self, id: u64, password_hash: &str) -> RepoResult<()> {
        sqlx::query("UPDATE members SET password_hash = ?, updated_at = UTC_TIMESTAMP() WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_avatar(&self, id: u64, avatar_url: &str) -> RepoResult<()> {
        sqlx::query("UPDATE members SET avatar_url = ?, updated_at = UTC_TIMESTAMP() WHERE id = ?")
            .bind(avatar_url)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_role(&self, id: u64, role_id: u64) -> RepoResult<()> {
        sqlx::query("UPDATE members SET role_id = ?, updated_at = UTC_TIMESTAMP() WHERE id = ?")
            .bind(role_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_status(&self, id: u64, status: MemberStatus) -> RepoResult<bool> {
        let affected = sqlx::query(
            "UPDATE members SET status_id = ?, updated_at = UTC_TIMESTAMP()
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(status.id())
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn soft_delete(&self, id: u64) -> RepoResult<bool> {
        let affected = sqlx::query(
            "UPDATE members SET deleted_at = UTC_TIMESTAMP() WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn purge_deleted(&self, older_than_days: u32) -> RepoResult<u64> {
        let affected = sqlx::query(
            "DELETE FROM members
             WHERE deleted_at IS NOT NULL
               AND deleted_at < DATE_SUB(UTC_TIMESTAMP(), INTERVAL ? DAY)",
        )
        .bind(older_than_days)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected)
    }

    async fn roles(&self) -> RepoResult<Vec<MemberRole>> {
        sqlx::query_as::<_, MemberRole>(
            "SELECT id, role_name, color FROM member_roles WHERE deleted_at IS NULL ORDER BY role_name",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn role_by_id(&self, id: u64) -> RepoResult<Option<MemberRole>> {
        sqlx::query_as::<_, MemberRole>(
            "SELECT id, role_name, color FROM member_roles WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn role_by_name(&self, name: &str) -> RepoResult<Option<MemberRole>> {
        sqlx::query_as::<_, MemberRole>(
            "SELECT id, role_name, color FROM member_roles WHERE role_name = ? AND deleted_at IS NULL",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_role(&self, role: NewMemberRole) -> RepoResult<MemberRole> {
        let result = sqlx::query(
            "INSERT INTO member_roles (role_name, color, created_at, updated_at)
             VALUES (?, ?, UTC_TIMESTAMP(), UTC_TIMESTAMP())",
        )
        .bind(&role.role_name)
        .bind(&role.color)
        .execute(&self.pool)
        .await?;

        Ok(MemberRole {
            id:        result.last_insert_id(),
            role_name: role.role_name,
            color:     role.color,
        })
    }

    async fn update_role_def(&self, id: u64, role: NewMemberRole) -> RepoResult<bool> {
        let affected = sqlx::query(
            "UPDATE member_roles SET role_name = ?, color = ?, updated_at = UTC_TIMESTAMP()
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&role.role_name)
        .bind(&role.color)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }
}
