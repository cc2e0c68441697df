use crate::{
    error::{Error, HtmlError},
    pagination::Pagination,
    schema::{User, Uuid},
    QueryError,
};

use sqlx::{FromRow, Pool, Postgres};

use super::require_user;

#[derive(FromRow)]
struct AuthorRow {
    #[sqlx(flatten)]
    author: User,
    count: i64,
}

pub fn ensure_not_self(user_id: Uuid, author_id: Uuid) -> Result<(), Error> {
    if user_id == author_id {
        return Err(HtmlError::InvalidRequest.new("You can't subscribe to yourself"));
    }
    Ok(())
}

pub async fn is_subscribed(user_id: Uuid, author_id: Uuid, pool: &Pool<Postgres>) -> Result<bool, Error> {
    let result: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(result.is_some())
}

/// Subscribes `user_id` to `author_id` and returns the author.
pub async fn follow_author(user_id: Uuid, author_id: Uuid, pool: &Pool<Postgres>) -> Result<User, Error> {
    ensure_not_self(user_id, author_id)?;
    let author = require_user(pool, author_id).await?;

    let result = sqlx::query(
        "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this user"));
    }

    log::trace!("> {} now follows {}", user_id, author_id);
    Ok(author)
}

pub async fn unfollow_author(user_id: Uuid, author_id: Uuid, pool: &Pool<Postgres>) -> Result<(), Error> {
    require_user(pool, author_id).await?;

    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.new("You are not subscribed to this user"));
    }

    Ok(())
}

pub async fn fetch_subscriptions(
    user_id: Uuid,
    pagination: &Pagination,
    pool: &Pool<Postgres>,
) -> Result<(Vec<User>, i64), Error> {
    let rows: Vec<AuthorRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY f.id DESC
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(pagination.limit)
    .bind(pagination.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    pagination.ensure_in_range(rows.len())?;
    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok((rows.into_iter().map(|r| r.author).collect(), total_count))
}
