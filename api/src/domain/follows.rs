//! Follow graph - adjacency list helpers and DB queries
//!
//! Each user row carries two denormalized id lists: `following` (who they
//! follow) and `followers` (who follows them). An edge a -> b lives in
//! `a.following` and in `b.followers`. Both lists have set semantics.

use sqlx::{Executor, Postgres};

/// Add `id` unless already present. Returns true if the list changed.
pub fn insert_unique(list: &mut Vec<i64>, id: i64) -> bool {
    if list.contains(&id) {
        return false;
    }
    list.push(id);
    true
}

/// Remove every occurrence of `id`. Returns true if the list changed.
pub fn remove_all(list: &mut Vec<i64>, id: i64) -> bool {
    let before = list.len();
    list.retain(|&x| x != id);
    list.len() != before
}

/// Append `value` to `column` of user `id` unless it is already there
pub async fn add_to_list<'e, E>(
    executor: E,
    column: FollowColumn,
    id: i64,
    value: i64,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "UPDATE users SET {col} = array_append({col}, $2), updated_at = NOW() \
         WHERE id = $1 AND NOT ($2 = ANY({col}))",
        col = column.as_str()
    );
    let result = sqlx::query(&query)
        .bind(id)
        .bind(value)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Remove `value` from `column` of user `id`
pub async fn remove_from_list<'e, E>(
    executor: E,
    column: FollowColumn,
    id: i64,
    value: i64,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "UPDATE users SET {col} = array_remove({col}, $2), updated_at = NOW() \
         WHERE id = $1 AND $2 = ANY({col})",
        col = column.as_str()
    );
    let result = sqlx::query(&query)
        .bind(id)
        .bind(value)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Strip `user_id` from every followers/following list that mentions it
pub async fn remove_everywhere<'e, E>(executor: E, user_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET followers = array_remove(followers, $1),
            following = array_remove(following, $1)
        WHERE $1 = ANY(followers) OR $1 = ANY(following)
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Which side of the adjacency a write touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowColumn {
    Followers,
    Following,
}

impl FollowColumn {
    fn as_str(&self) -> &'static str {
        match self {
            FollowColumn::Followers => "followers",
            FollowColumn::Following => "following",
        }
    }
}
