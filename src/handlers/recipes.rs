use chrono::Local;
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply, Response},
};

use crate::{
    actions::{
        add_to_list, create_recipe, delete_recipe, fetch_recipes, get_recipe_mut,
        list_cart_parts, remove_from_list, require_recipe, require_user, update_recipe,
        RecipeFilter, RecipeList,
    },
    error::{Error, HtmlError},
    form::Form,
    jwt::SessionData,
    media::{decode_image, is_data_url, remove_image, save_image},
    pagination::{PageContext, Pagination},
    payload::RecipePayload,
    permissions::ActionType,
    representation::{represent_recipe, represent_recipes, RecipeShort},
    routes::Context,
    schema::Uuid,
    shopping_list,
};

fn recipe_filter(form: &Form) -> Result<RecipeFilter, Error> {
    Ok(RecipeFilter {
        author: form.get_number("author")?,
        tags: form.get_all("tags").into_iter().map(|t| t.to_owned()).collect(),
        is_favorited: form.get_flag("is_favorited"),
        is_in_shopping_cart: form.get_flag("is_in_shopping_cart"),
    })
}

pub async fn list_recipes(
    form: Form,
    pagination: Pagination,
    session: Option<SessionData>,
    ctx: Context,
) -> Result<Response, Rejection> {
    let filter = recipe_filter(&form)?;
    let viewer = session.map(|s| s.user_id);

    let (recipes, count) = fetch_recipes(&filter, viewer, &pagination, &ctx.pool).await?;
    let results = represent_recipes(recipes, viewer, &ctx.config.media_url, &ctx.pool).await?;

    Ok(reply::json(&PageContext::from_rows(results, count, &pagination)).into_response())
}

pub async fn get_recipe(
    id: Uuid,
    session: Option<SessionData>,
    ctx: Context,
) -> Result<Response, Rejection> {
    let recipe = require_recipe(id, &ctx.pool).await?;
    let view = represent_recipe(
        recipe,
        session.map(|s| s.user_id),
        &ctx.config.media_url,
        &ctx.pool,
    )
    .await?;

    Ok(reply::json(&view).into_response())
}

pub async fn post_recipe(
    session: SessionData,
    payload: RecipePayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;
    let recipe = payload.validate()?;

    let image = match recipe.image.as_deref() {
        Some(image) => decode_image(image).map_err(Error::from)?,
        None => return Err(HtmlError::InvalidRequest.new("An image is required").into()),
    };

    let image = save_image(&ctx.config.media_root, image).await?;
    let id = match create_recipe(session.user_id, &recipe, &image, &ctx.pool).await {
        Ok(id) => id,
        Err(e) => {
            remove_image(&ctx.config.media_root, &image).await;
            return Err(e.into());
        }
    };

    let created = require_recipe(id, &ctx.pool).await?;
    let view = represent_recipe(
        created,
        Some(session.user_id),
        &ctx.config.media_url,
        &ctx.pool,
    )
    .await?;

    Ok(reply::with_status(reply::json(&view), StatusCode::CREATED).into_response())
}

pub async fn patch_recipe(
    id: Uuid,
    session: SessionData,
    payload: RecipePayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    let existing = get_recipe_mut(id, &session, &ctx.pool).await?;

    let recipe = payload.validate()?;
    let replacement = match recipe.image.as_deref() {
        Some(image) if is_data_url(image) => Some(decode_image(image).map_err(Error::from)?),
        _ => None,
    };

    let image = match replacement {
        Some(image) => save_image(&ctx.config.media_root, image).await?,
        None => existing.image.to_owned(),
    };

    if let Err(e) = update_recipe(id, &recipe, &image, &ctx.pool).await {
        if image != existing.image {
            remove_image(&ctx.config.media_root, &image).await;
        }
        return Err(e.into());
    }
    if image != existing.image {
        remove_image(&ctx.config.media_root, &existing.image).await;
    }

    let updated = require_recipe(id, &ctx.pool).await?;
    let view = represent_recipe(
        updated,
        Some(session.user_id),
        &ctx.config.media_url,
        &ctx.pool,
    )
    .await?;

    Ok(reply::json(&view).into_response())
}

pub async fn destroy_recipe(id: Uuid, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let recipe = get_recipe_mut(id, &session, &ctx.pool).await?;

    delete_recipe(recipe.id, &ctx.pool).await?;
    remove_image(&ctx.config.media_root, &recipe.image).await;
    log::info!("> Recipe {} deleted by {}", recipe.id, session.username);

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn add_to(
    list: RecipeList,
    id: Uuid,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    let recipe = add_to_list(list, session.user_id, id, &ctx.pool).await?;

    Ok(reply::with_status(
        reply::json(&RecipeShort::new(&recipe, &ctx.config.media_url)),
        StatusCode::CREATED,
    )
    .into_response())
}

pub async fn remove_from(
    list: RecipeList,
    id: Uuid,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    remove_from_list(list, session.user_id, id, &ctx.pool).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn download_shopping_cart(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let user = require_user(&ctx.pool, session.user_id).await?;
    let items = shopping_list::aggregate(list_cart_parts(user.id, &ctx.pool).await?);

    let report = shopping_list::render(user.display_name(), &Local::now(), &items);
    let disposition = format!(
        "attachment; filename={}",
        shopping_list::file_name(&user.username)
    );
    log::trace!("> Shopping list for {} has {} lines", user.username, items.len());

    Ok(reply::with_header(report, "content-disposition", disposition).into_response())
}
