//! Transport shapes for rows, with the per-request flags of the viewer.

use serde::Serialize;
use sqlx::{Pool, Postgres};

use crate::{
    actions::{
        count_author_recipes, is_favorited, is_in_shopping_cart, is_subscribed,
        list_author_recipes, list_recipe_parts, list_recipe_tags, require_user,
    },
    error::Error,
    media::image_url,
    schema::{Recipe, RecipePart, Tag, User, Uuid},
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RegisteredUser {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for RegisteredUser {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserView {
    #[serde(flatten)]
    pub user: RegisteredUser,
    pub is_subscribed: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct RecipeView {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipePart>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// The compact recipe shape used by list toggles and subscriptions.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeShort {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeShort {
    pub fn new(recipe: &Recipe, media_url: &str) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: image_url(media_url, &recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

pub async fn represent_user(
    user: &User,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<UserView, Error> {
    let is_subscribed = match viewer {
        Some(viewer) => is_subscribed(viewer, user.id, pool).await?,
        None => false,
    };

    Ok(UserView {
        user: user.into(),
        is_subscribed,
    })
}

pub async fn represent_recipe(
    recipe: Recipe,
    viewer: Option<Uuid>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    let author = require_user(pool, recipe.author_id).await?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            is_favorited(viewer, recipe.id, pool).await?,
            is_in_shopping_cart(viewer, recipe.id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeView {
        id: recipe.id,
        tags: list_recipe_tags(pool, recipe.id).await?,
        author: represent_user(&author, viewer, pool).await?,
        ingredients: list_recipe_parts(pool, recipe.id).await?,
        is_favorited,
        is_in_shopping_cart,
        image: image_url(media_url, &recipe.image),
        name: recipe.name,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn represent_recipes(
    recipes: Vec<Recipe>,
    viewer: Option<Uuid>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, Error> {
    let mut views = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        views.push(represent_recipe(recipe, viewer, media_url, pool).await?);
    }
    Ok(views)
}

pub async fn represent_subscription(
    author: &User,
    viewer: Uuid,
    recipes_limit: Option<i64>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, Error> {
    let recipes = list_author_recipes(author.id, recipes_limit, pool).await?;

    Ok(SubscriptionView {
        author: represent_user(author, Some(viewer), pool).await?,
        recipes: recipes
            .iter()
            .map(|recipe| RecipeShort::new(recipe, media_url))
            .collect(),
        recipes_count: count_author_recipes(author.id, pool).await?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::UserRole;

    fn user() -> User {
        User {
            id: 2,
            email: String::from("anna@example.com"),
            username: String::from("anna"),
            first_name: String::from("Anna"),
            last_name: String::from("Petrova"),
            password: String::from("$argon2id$..."),
            role: UserRole::User,
        }
    }

    #[test]
    fn user_view_is_flat_and_hides_password() {
        let view = UserView {
            user: (&user()).into(),
            is_subscribed: true,
        };

        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({
                "email": "anna@example.com",
                "id": 2,
                "username": "anna",
                "first_name": "Anna",
                "last_name": "Petrova",
                "is_subscribed": true
            })
        );
    }

    #[test]
    fn short_recipe_exposes_image_url() {
        let recipe = Recipe {
            id: 9,
            author_id: 2,
            name: String::from("Borscht"),
            image: String::from("recipes/images/b.png"),
            text: String::from("Boil."),
            cooking_time: 90,
        };

        assert_eq!(
            serde_json::to_value(RecipeShort::new(&recipe, "/media/")).unwrap(),
            json!({
                "id": 9,
                "name": "Borscht",
                "image": "/media/recipes/images/b.png",
                "cooking_time": 90
            })
        );
    }
}
