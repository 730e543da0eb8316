//! Comment domain - DB queries for comments

use sqlx::{Executor, Postgres};

use crate::models::Comment;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, u.nickname AS author_nickname,
           c.content, c.created_at, c.updated_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

/// Up to `take` comments on a post with id below `before`, newest first
pub async fn list_comments_before<'e, E>(
    executor: E,
    post_id: i64,
    before: Option<i64>,
    take: i64,
) -> Result<Vec<Comment>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "{} WHERE c.post_id = $1 AND ($2::BIGINT IS NULL OR c.id < $2) ORDER BY c.id DESC LIMIT $3",
        COMMENT_SELECT
    );
    sqlx::query_as(&query)
        .bind(post_id)
        .bind(before)
        .bind(take)
        .fetch_all(executor)
        .await
}

pub async fn get_comment<'e, E>(executor: E, comment_id: i64) -> Result<Option<Comment>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("{} WHERE c.id = $1", COMMENT_SELECT);
    sqlx::query_as(&query)
        .bind(comment_id)
        .fetch_optional(executor)
        .await
}

pub async fn insert_comment<'e, E>(
    executor: E,
    author_id: i64,
    post_id: i64,
    content: &str,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO comments (author_id, post_id, content)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(post_id)
    .bind(content)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Delete one comment, returning its parent post id if it existed
pub async fn delete_comment<'e, E>(executor: E, comment_id: i64) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<(i64,)> = sqlx::query_as("DELETE FROM comments WHERE id = $1 RETURNING post_id")
        .bind(comment_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|r| r.0))
}

pub async fn delete_comments_on_post<'e, E>(executor: E, post_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM comments WHERE post_id = $1")
        .bind(post_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Delete everything a user wrote plus everything written on their posts.
/// Returns the deleted comment ids.
pub async fn delete_comments_for_user<'e, E>(executor: E, user_id: i64) -> Result<Vec<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        DELETE FROM comments
        WHERE author_id = $1
           OR post_id IN (SELECT id FROM posts WHERE author_id = $1)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}
