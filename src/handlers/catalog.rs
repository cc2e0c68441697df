use warp::{
    reject::Rejection,
    reply::{self, Reply, Response},
};

use crate::{
    actions::{get_ingredient, get_tag, list_ingredients, list_tags},
    error::HtmlError,
    form::Form,
    routes::Context,
    schema::Uuid,
};

pub async fn tags(ctx: Context) -> Result<Response, Rejection> {
    let tags = list_tags(&ctx.pool).await?;
    Ok(reply::json(&tags).into_response())
}

pub async fn tag(id: Uuid, ctx: Context) -> Result<Response, Rejection> {
    let tag = get_tag(id, &ctx.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.new("No tag exists with specified id"))?;

    Ok(reply::json(&tag).into_response())
}

pub async fn ingredients(form: Form, ctx: Context) -> Result<Response, Rejection> {
    let ingredients = list_ingredients(form.get_str("name"), &ctx.pool).await?;
    Ok(reply::json(&ingredients).into_response())
}

pub async fn ingredient(id: Uuid, ctx: Context) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(id, &ctx.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.new("No ingredient exists with specified id"))?;

    Ok(reply::json(&ingredient).into_response())
}
