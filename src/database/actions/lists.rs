use crate::{
    error::{Error, HtmlError},
    schema::{Recipe, Uuid},
    QueryError,
};

use sqlx::{Pool, Postgres};

use super::require_recipe;

/// Per-user recipe lists toggled through POST/DELETE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(&self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "purchases",
        }
    }

    fn already_added(&self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is already in favorites",
            RecipeList::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    fn not_present(&self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is not in favorites",
            RecipeList::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

pub async fn is_in_list(
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

pub async fn is_favorited(user_id: Uuid, recipe_id: Uuid, pool: &Pool<Postgres>) -> Result<bool, Error> {
    is_in_list(RecipeList::Favorites, user_id, recipe_id, pool).await
}

pub async fn is_in_shopping_cart(
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    is_in_list(RecipeList::ShoppingCart, user_id, recipe_id, pool).await
}

/// Adds the recipe to the list. A second add for the same pair, including
/// one racing this insert, is reported as 400.
pub async fn add_to_list(
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = require_recipe(recipe_id, pool).await?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new(list.already_added()));
    }

    Ok(recipe)
}

pub async fn remove_from_list(
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new(list.not_present()));
    }

    Ok(())
}
