use crate::{
    db::Db,
    models::{MemberStatus, BASE_MEMBER_ROLE, BASE_MEMBER_ROLE_ID},
};

/// Color given to the base role when it is first created.
const BASE_MEMBER_ROLE_COLOR: &str = "#6c757d";

/// Seeds the member statuses and the base member role.
/// Safe to call on every startup; existence is checked before inserting.
pub async fn seed_reference_data(pool: &Db) -> anyhow::Result<()> {
    seed_statuses(pool).await?;
    seed_base_role(pool).await?;

    Ok(())
}

async fn seed_statuses(pool: &Db) -> anyhow::Result<()> {
    for status in MemberStatus::ALL {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM member_statuses WHERE id = ?)",
        )
        .bind(status.id())
        .fetch_one(pool)
        .await?;

        if !exists {
            sqlx::query("INSERT INTO member_statuses (id, status) VALUES (?, ?)")
                .bind(status.id())
                .bind(status.as_str())
                .execute(pool)
                .await?;
            tracing::info!(status = %status, "Seeded member status");
        }
    }

    Ok(())
}

async fn seed_base_role(pool: &Db) -> anyhow::Result<()> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM member_roles WHERE id = ?)",
    )
    .bind(BASE_MEMBER_ROLE_ID)
    .fetch_one(pool)
    .await?;

    if !exists {
        sqlx::query(
            "INSERT INTO member_roles (id, role_name, color, created_at, updated_at)
             VALUES (?, ?, ?, UTC_TIMESTAMP(), UTC_TIMESTAMP())",
        )
        .bind(BASE_MEMBER_ROLE_ID)
        .bind(BASE_MEMBER_ROLE)
        .bind(BASE_MEMBER_ROLE_COLOR)
        .execute(pool)
        .await?;
        tracing::info!(role = BASE_MEMBER_ROLE, "Seeded base member role");
    }

    Ok(())
}
