//! User domain - DB queries for users
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use sqlx::{Executor, Postgres};

use crate::models::{NewUser, User, UserPatch, UserSummary};

const USER_COLUMNS: &str = "id, nickname, email, password_hash, bio, avatar_url, \
                            followers, following, created_at, updated_at";

pub async fn insert_user<'e, E>(executor: E, user: &NewUser) -> Result<User, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "INSERT INTO users (nickname, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
        USER_COLUMNS
    );
    sqlx::query_as(&query)
        .bind(&user.nickname)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(executor)
        .await
}

pub async fn get_user_by_id<'e, E>(executor: E, user_id: i64) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    sqlx::query_as(&query)
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// Share-lock the given user rows and return how many exist
pub async fn lock_users<'e, E>(executor: E, ids: &[i64]) -> Result<usize, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ANY($1) FOR SHARE")
        .bind(ids)
        .fetch_all(executor)
        .await?;
    Ok(rows.len())
}

pub async fn get_user_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    sqlx::query_as(&query)
        .bind(email)
        .fetch_optional(executor)
        .await
}

/// Apply a partial update; untouched columns keep their value
pub async fn update_user<'e, E>(
    executor: E,
    user_id: i64,
    patch: &UserPatch,
) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        UPDATE users SET
            nickname = COALESCE($2, nickname),
            email = COALESCE($3, email),
            password_hash = COALESCE($4, password_hash),
            bio = CASE WHEN $5 THEN $6::TEXT ELSE bio END,
            avatar_url = CASE WHEN $7 THEN $8::TEXT ELSE avatar_url END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        USER_COLUMNS
    );
    sqlx::query_as(&query)
        .bind(user_id)
        .bind(patch.nickname.as_deref())
        .bind(patch.email.as_deref())
        .bind(patch.password_hash.as_deref())
        .bind(patch.bio.is_some())
        .bind(patch.bio.clone().flatten())
        .bind(patch.avatar_url.is_some())
        .bind(patch.avatar_url.clone().flatten())
        .fetch_optional(executor)
        .await
}

/// Returns true if a row was deleted
pub async fn delete_user<'e, E>(executor: E, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Summaries for the given ids, in the order the ids were given
pub async fn list_summaries<'e, E>(executor: E, ids: &[i64]) -> Result<Vec<UserSummary>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT u.id, u.nickname, u.avatar_url
        FROM unnest($1::BIGINT[]) WITH ORDINALITY AS t(id, ord)
        JOIN users u ON u.id = t.id
        ORDER BY t.ord
        "#,
    )
    .bind(ids)
    .fetch_all(executor)
    .await
}
