use std::{convert::Infallible, sync::Arc};

use serde::de::DeserializeOwned;
use sqlx::{Pool, Postgres};
use warp::{
    filters::BoxedFilter,
    reject::Rejection,
    reply::{Reply, Response},
    Filter,
};

use crate::{
    actions::RecipeList,
    config::Config,
    error::handle_rejection,
    form::with_form,
    handlers::{catalog, recipes, users},
    middleware::{with_possible_session, with_session},
    pagination::with_pagination,
    schema::Uuid,
};

/// Recipe images arrive base64-encoded inside the JSON body.
const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct Context {
    pub pool: Pool<Postgres>,
    pub config: Arc<Config>,
}

impl Context {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}

fn with_context(ctx: Context) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn json<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn user_routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let secret = Arc::new(ctx.config.secret_key.to_owned());
    let page_size = ctx.config.page_size;
    let session = with_session(secret.clone());
    let possible_session = with_possible_session(secret);

    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json())
        .and(with_context(ctx.clone()))
        .and_then(users::login);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(session.clone())
        .and_then(users::logout);

    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(json())
        .and(with_context(ctx.clone()))
        .and_then(users::register);

    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(with_pagination(page_size))
        .and(possible_session.clone())
        .and(with_context(ctx.clone()))
        .and_then(users::list_users);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(session.clone())
        .and(with_context(ctx.clone()))
        .and_then(users::me);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(session.clone())
        .and(json())
        .and(with_context(ctx.clone()))
        .and_then(users::change_password);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(session.clone())
        .and(with_pagination(page_size))
        .and(with_form())
        .and(with_context(ctx.clone()))
        .and_then(users::subscriptions);

    let detail = warp::path!("api" / "users" / Uuid)
        .and(warp::get())
        .and(possible_session)
        .and(with_context(ctx.clone()))
        .and_then(users::get_user);

    let subscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::post())
        .and(session.clone())
        .and(with_form())
        .and(with_context(ctx.clone()))
        .and_then(users::subscribe);

    let unsubscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(session)
        .and(with_context(ctx))
        .and_then(users::unsubscribe);

    login
        .or(logout)
        .unify()
        .or(register)
        .unify()
        .or(list)
        .unify()
        .or(me)
        .unify()
        .or(set_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(detail)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

fn catalog_routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(catalog::tags);

    let tag = warp::path!("api" / "tags" / Uuid)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(catalog::tag);

    let ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(with_form())
        .and(with_context(ctx.clone()))
        .and_then(catalog::ingredients);

    let ingredient = warp::path!("api" / "ingredients" / Uuid)
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(catalog::ingredient);

    tags.or(tag)
        .unify()
        .or(ingredients)
        .unify()
        .or(ingredient)
        .unify()
        .boxed()
}

fn recipe_routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let secret = Arc::new(ctx.config.secret_key.to_owned());
    let page_size = ctx.config.page_size;
    let session = with_session(secret.clone());
    let possible_session = with_possible_session(secret);

    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(with_form())
        .and(with_pagination(page_size))
        .and(possible_session.clone())
        .and(with_context(ctx.clone()))
        .and_then(recipes::list_recipes);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(session.clone())
        .and(json())
        .and(with_context(ctx.clone()))
        .and_then(recipes::post_recipe);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(session.clone())
        .and(with_context(ctx.clone()))
        .and_then(recipes::download_shopping_cart);

    let detail = warp::path!("api" / "recipes" / Uuid)
        .and(warp::get())
        .and(possible_session)
        .and(with_context(ctx.clone()))
        .and_then(recipes::get_recipe);

    let update = warp::path!("api" / "recipes" / Uuid)
        .and(warp::patch().or(warp::put()).unify())
        .and(session.clone())
        .and(json())
        .and(with_context(ctx.clone()))
        .and_then(recipes::patch_recipe);

    let destroy = warp::path!("api" / "recipes" / Uuid)
        .and(warp::delete())
        .and(session.clone())
        .and(with_context(ctx.clone()))
        .and_then(recipes::destroy_recipe);

    let favorite = warp::path!("api" / "recipes" / Uuid / "favorite")
        .and(warp::post())
        .and(session.clone())
        .and(with_context(ctx.clone()))
        .and_then(|id, session, ctx| recipes::add_to(RecipeList::Favorites, id, session, ctx));

    let unfavorite = warp::path!("api" / "recipes" / Uuid / "favorite")
        .and(warp::delete())
        .and(session.clone())
        .and(with_context(ctx.clone()))
        .and_then(|id, session, ctx| recipes::remove_from(RecipeList::Favorites, id, session, ctx));

    let add_to_cart = warp::path!("api" / "recipes" / Uuid / "shopping_cart")
        .and(warp::post())
        .and(session.clone())
        .and(with_context(ctx.clone()))
        .and_then(|id, session, ctx| recipes::add_to(RecipeList::ShoppingCart, id, session, ctx));

    let remove_from_cart = warp::path!("api" / "recipes" / Uuid / "shopping_cart")
        .and(warp::delete())
        .and(session)
        .and(with_context(ctx))
        .and_then(|id, session, ctx| {
            recipes::remove_from(RecipeList::ShoppingCart, id, session, ctx)
        });

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(destroy)
        .unify()
        .or(favorite)
        .unify()
        .or(unfavorite)
        .unify()
        .or(add_to_cart)
        .unify()
        .or(remove_from_cart)
        .unify()
        .boxed()
}

/// Every `/api` endpoint. Rejections are left for the caller to recover.
pub fn api(ctx: Context) -> BoxedFilter<(Response,)> {
    user_routes(ctx.clone())
        .or(catalog_routes(ctx.clone()))
        .unify()
        .or(recipe_routes(ctx))
        .unify()
        .boxed()
}

/// The complete application: API, uploaded media and JSON error replies.
pub fn app(ctx: Context) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let media = warp::path("media").and(warp::fs::dir(ctx.config.media_root.to_owned()));

    api(ctx)
        .or(media)
        .recover(handle_rejection)
        .with(warp::log("foodgram"))
}
