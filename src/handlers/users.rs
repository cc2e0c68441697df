use chrono::Duration;
use serde_json::json;
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply, Response},
};

use crate::{
    actions::{
        fetch_subscriptions, fetch_users, follow_author, login_user, register_user,
        require_user, set_password, unfollow_author,
    },
    error::{Error, HtmlError},
    form::Form,
    jwt::SessionData,
    pagination::{PageContext, Pagination},
    payload::{validate_password, LoginPayload, SetPasswordPayload, UserPayload},
    permissions::ActionType,
    representation::{represent_subscription, represent_user, RegisteredUser},
    routes::Context,
    schema::Uuid,
};

fn recipes_limit(form: &Form) -> Result<Option<i64>, Error> {
    Ok(form.get_number::<i64>("recipes_limit")?.map(|limit| limit.max(0)))
}

pub async fn login(payload: LoginPayload, ctx: Context) -> Result<Response, Rejection> {
    let token = login_user(
        &ctx.pool,
        payload.email.trim(),
        &payload.password,
        &ctx.config.secret_key,
        Duration::hours(ctx.config.session_hours),
    )
    .await?;

    Ok(reply::json(&json!({ "auth_token": token })).into_response())
}

/// Sessions are stateless; logging out only requires a valid token.
pub async fn logout(session: SessionData) -> Result<Response, Rejection> {
    log::info!("> {} logged out", session.username);
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn register(payload: UserPayload, ctx: Context) -> Result<Response, Rejection> {
    let user = payload.validate()?;

    let user = register_user(&ctx.pool, user)
        .await?
        .ok_or_else(|| HtmlError::InvalidRequest.new("A user with that email or username already exists"))?;

    log::info!("> Registered {}", user.username);
    Ok(reply::with_status(reply::json(&RegisteredUser::from(&user)), StatusCode::CREATED).into_response())
}

pub async fn list_users(
    pagination: Pagination,
    session: Option<SessionData>,
    ctx: Context,
) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let (users, count) = fetch_users(&ctx.pool, &pagination).await?;

    let mut results = Vec::with_capacity(users.len());
    for user in users.iter() {
        results.push(represent_user(user, viewer, &ctx.pool).await?);
    }

    Ok(reply::json(&PageContext::from_rows(results, count, &pagination)).into_response())
}

pub async fn get_user(
    id: Uuid,
    session: Option<SessionData>,
    ctx: Context,
) -> Result<Response, Rejection> {
    let user = require_user(&ctx.pool, id).await?;
    let view = represent_user(&user, session.map(|s| s.user_id), &ctx.pool).await?;

    Ok(reply::json(&view).into_response())
}

pub async fn me(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let user = require_user(&ctx.pool, session.user_id).await?;
    let view = represent_user(&user, Some(session.user_id), &ctx.pool).await?;

    Ok(reply::json(&view).into_response())
}

pub async fn change_password(
    session: SessionData,
    payload: SetPasswordPayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    validate_password(&payload.new_password)?;
    set_password(
        &ctx.pool,
        session.user_id,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn subscribe(id: Uuid, session: SessionData, form: Form, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let recipes_limit = recipes_limit(&form)?;

    let author = follow_author(session.user_id, id, &ctx.pool).await?;
    let view = represent_subscription(
        &author,
        session.user_id,
        recipes_limit,
        &ctx.config.media_url,
        &ctx.pool,
    )
    .await?;

    Ok(reply::with_status(reply::json(&view), StatusCode::CREATED).into_response())
}

pub async fn unsubscribe(id: Uuid, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    unfollow_author(session.user_id, id, &ctx.pool).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn subscriptions(
    session: SessionData,
    pagination: Pagination,
    form: Form,
    ctx: Context,
) -> Result<Response, Rejection> {
    let recipes_limit = recipes_limit(&form)?;
    let (authors, count) = fetch_subscriptions(session.user_id, &pagination, &ctx.pool).await?;

    let mut results = Vec::with_capacity(authors.len());
    for author in authors.iter() {
        results.push(
            represent_subscription(
                author,
                session.user_id,
                recipes_limit,
                &ctx.config.media_url,
                &ctx.pool,
            )
            .await?,
        );
    }

    Ok(reply::json(&PageContext::from_rows(results, count, &pagination)).into_response())
}
