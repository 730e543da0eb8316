//! Post domain - DB queries for posts
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use sqlx::{Executor, Postgres};

use crate::models::Post;

/// Which posts a listing covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    /// Global feed
    All,
    /// Posts by one author
    Author(i64),
    /// Posts by any of the given authors (followed feed)
    Authors(Vec<i64>),
}

impl PostFilter {
    pub fn matches(&self, author_id: i64) -> bool {
        match self {
            PostFilter::All => true,
            PostFilter::Author(id) => *id == author_id,
            PostFilter::Authors(ids) => ids.contains(&author_id),
        }
    }

    /// Returns SQL WHERE clause fragment; the filter value binds as $3
    fn where_clause(&self) -> &'static str {
        match self {
            PostFilter::All => "",
            PostFilter::Author(_) => "AND p.author_id = $3",
            PostFilter::Authors(_) => "AND p.author_id = ANY($3)",
        }
    }
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.author_id, u.nickname AS author_nickname, p.content,
           p.comment_ids, p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

/// Up to `take` posts with id below `before`, newest first
pub async fn list_posts_before<'e, E>(
    executor: E,
    filter: &PostFilter,
    before: Option<i64>,
    take: i64,
) -> Result<Vec<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "{} WHERE ($1::BIGINT IS NULL OR p.id < $1) {} ORDER BY p.id DESC LIMIT $2",
        POST_SELECT,
        filter.where_clause()
    );

    let q = sqlx::query_as(&query).bind(before).bind(take);
    let q = match filter {
        PostFilter::All => q,
        PostFilter::Author(id) => q.bind(*id),
        PostFilter::Authors(ids) => q.bind(ids.clone()),
    };
    q.fetch_all(executor).await
}

pub async fn get_post<'e, E>(executor: E, post_id: i64) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("{} WHERE p.id = $1", POST_SELECT);
    sqlx::query_as(&query)
        .bind(post_id)
        .fetch_optional(executor)
        .await
}

/// Insert a post and return its id
pub async fn insert_post<'e, E>(executor: E, author_id: i64, content: &str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO posts (author_id, content)
        VALUES ($1, $2)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(content)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Lock a post row for the rest of the transaction. Returns false if missing.
pub async fn lock_post<'e, E>(executor: E, post_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.is_some())
}

pub async fn delete_post<'e, E>(executor: E, post_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Row-lock every post by `author_id` so no comment can land on them
pub async fn lock_posts_by_author<'e, E>(executor: E, author_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM posts WHERE author_id = $1 FOR UPDATE")
        .bind(author_id)
        .fetch_all(executor)
        .await?;
    Ok(rows.len() as u64)
}

pub async fn delete_posts_by_author<'e, E>(executor: E, author_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM posts WHERE author_id = $1")
        .bind(author_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn append_comment_id<'e, E>(executor: E, post_id: i64, comment_id: i64) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE posts SET comment_ids = array_append(comment_ids, $2)
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .bind(comment_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Drop the given comment ids from every post that references them, keeping order
pub async fn strip_comment_ids<'e, E>(executor: E, comment_ids: &[i64]) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE posts p SET comment_ids = ARRAY(
            SELECT c FROM unnest(p.comment_ids) WITH ORDINALITY AS t(c, n)
            WHERE c <> ALL($1::BIGINT[])
            ORDER BY n
        )
        WHERE p.comment_ids && $1::BIGINT[]
        "#,
    )
    .bind(comment_ids)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
