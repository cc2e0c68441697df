use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    error::{Error, HtmlError},
    payload::ValidUser,
    schema::{User, Uuid},
    QueryError,
};

use chrono::Duration;
use sqlx::{FromRow, Pool, Postgres};

use crate::pagination::Pagination;

#[derive(FromRow)]
struct UserRow {
    #[sqlx(flatten)]
    user: User,
    count: i64,
}

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn require_user(pool: &Pool<Postgres>, user_id: Uuid) -> Result<User, Error> {
    get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.new("No user exists with specified id"))
}

pub async fn fetch_users(
    pool: &Pool<Postgres>,
    pagination: &Pagination,
) -> Result<(Vec<User>, i64), Error> {
    let rows: Vec<UserRow> =
        sqlx::query_as("SELECT u.*, COUNT(*) OVER() AS count FROM users u ORDER BY u.id LIMIT $1 OFFSET $2")
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    pagination.ensure_in_range(rows.len())?;
    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok((rows.into_iter().map(|r| r.user).collect(), total_count))
}

/// Creates a user, storing an argon2 hash of the password. `None` means the
/// email or username is already taken.
pub async fn register_user(pool: &Pool<Postgres>, user: ValidUser) -> Result<Option<User>, Error> {
    let password = hash_password(&user.password)?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(user.email)
    .bind(user.username)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(password)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn login_user(
    pool: &Pool<Postgres>,
    email: &str,
    password: &str,
    secret: &[u8],
    lifetime: Duration,
) -> Result<String, Error> {
    let user = get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| HtmlError::InvalidRequest.new("Invalid credentials"))?;

    if !verify_password(password, &user.password)? {
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    }

    log::info!("> {} logged in", user.username);
    generate_jwt_session(&user, secret, lifetime)
}

pub async fn set_password(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
) -> Result<(), Error> {
    let user = require_user(pool, user_id).await?;

    if !verify_password(current_password, &user.password)? {
        return Err(HtmlError::InvalidRequest.new("Current password is incorrect"));
    }

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(hash_password(new_password)?)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}
