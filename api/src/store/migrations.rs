//! Schema bootstrap, run once at startup. Idempotent.

use sqlx::PgPool;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            BIGSERIAL PRIMARY KEY,
        nickname      TEXT NOT NULL,
        email         TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        bio           TEXT,
        avatar_url    TEXT,
        followers     BIGINT[] NOT NULL DEFAULT '{}',
        following     BIGINT[] NOT NULL DEFAULT '{}',
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT users_nickname_key UNIQUE (nickname),
        CONSTRAINT users_email_key UNIQUE (email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id          BIGSERIAL PRIMARY KEY,
        author_id   BIGINT NOT NULL REFERENCES users(id),
        content     TEXT NOT NULL,
        comment_ids BIGINT[] NOT NULL DEFAULT '{}',
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS posts_author_id_idx ON posts (author_id, id DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id         BIGSERIAL PRIMARY KEY,
        post_id    BIGINT NOT NULL REFERENCES posts(id),
        author_id  BIGINT NOT NULL REFERENCES users(id),
        content    TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS comments_post_id_idx ON comments (post_id, id DESC)",
];

pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = SCHEMA.len(), "schema ready");
    Ok(())
}
