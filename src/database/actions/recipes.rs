use crate::{
    authentication::permissions::ActionType,
    error::{Error, HtmlError},
    jwt::SessionData,
    pagination::Pagination,
    payload::ValidRecipe,
    schema::{Recipe, Uuid},
    QueryError,
};

use sqlx::{FromRow, Pool, Postgres, QueryBuilder, Transaction};

use super::{ensure_ingredients_exist, ensure_tags_exist};

#[derive(FromRow)]
struct RecipeRow {
    #[sqlx(flatten)]
    recipe: Recipe,
    count: i64,
}

/// Narrowing applied to the recipe list.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
    pagination: &Pagination,
    pool: &Pool<Postgres>,
) -> Result<(Vec<Recipe>, i64), Error> {
    let needs_viewer = filter.is_favorited || filter.is_in_shopping_cart;
    if needs_viewer && viewer.is_none() {
        return Ok((vec![], 0));
    }

    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE",
    );

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query
            .push(" AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
            .push_bind(filter.tags.to_owned())
            .push("))");
    }
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query
                .push(" AND EXISTS (SELECT 1 FROM purchases p WHERE p.recipe_id = r.id AND p.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }

    query
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(pagination.limit)
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    pagination.ensure_in_range(rows.len())?;
    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok((rows.into_iter().map(|r| r.recipe).collect(), total_count))
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as(
        "SELECT id, author_id, name, image, text, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn require_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Recipe, Error> {
    get_recipe(id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.new("No recipe exists with specified id"))
}

/// Loads a recipe the session is allowed to modify: its own, or any for admins.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;
    let recipe = require_recipe(id, pool).await?;

    match session.authenticate(ActionType::ManageAllRecipes) {
        Ok(_) => Ok(recipe),
        Err(_) if recipe.author_id == session.user_id => Ok(recipe),
        Err(e) => Err(e),
    }
}

pub async fn list_author_recipes(
    author_id: Uuid,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, Error> {
    let rows: Vec<Recipe> = sqlx::query_as(
        "
        SELECT id, author_id, name, image, text, cooking_time
        FROM recipes
        WHERE author_id = $1
        ORDER BY pub_date DESC, id DESC
        LIMIT $2
    ",
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn count_author_recipes(author_id: Uuid, pool: &Pool<Postgres>) -> Result<i64, Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count.0)
}

/// Inserts a recipe owned by `author_id` together with its ingredient lines
/// and tags. Nothing is written unless every step succeeds.
pub async fn create_recipe(
    author_id: Uuid,
    recipe: &ValidRecipe,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    replace_recipe_links(id.0, recipe, &mut tr).await?;

    tr.commit().await.map_err(QueryError::from)?;
    log::info!("> Recipe {} created by {}", id.0, author_id);

    Ok(id.0)
}

pub async fn update_recipe(
    id: Uuid,
    recipe: &ValidRecipe,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query(
        "UPDATE recipes SET name = $1, image = $2, text = $3, cooking_time = $4 WHERE id = $5",
    )
    .bind(&recipe.name)
    .bind(image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    replace_recipe_links(id, recipe, &mut tr).await?;

    tr.commit().await.map_err(QueryError::from)?;

    Ok(())
}

/// Swaps the ingredient lines and tag links of a recipe for the ones in
/// `recipe`. Referenced tags and ingredients must exist.
pub async fn replace_recipe_links(
    recipe_id: Uuid,
    recipe: &ValidRecipe,
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    let ingredient_ids: Vec<Uuid> = recipe.ingredients.iter().map(|i| i.id).collect();
    ensure_ingredients_exist(&ingredient_ids, tr).await?;
    ensure_tags_exist(&recipe.tags, tr).await?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    let mut parts: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    parts.push_values(&recipe.ingredients, |mut row, part| {
        row.push_bind(recipe_id)
            .push_bind(part.id)
            .push_bind(part.amount);
    });
    parts
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    let mut tags: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    tags.push_values(&recipe.tags, |mut row, tag| {
        row.push_bind(recipe_id).push_bind(*tag);
    });
    tags.build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Deletes a recipe; association rows go with it through `ON DELETE CASCADE`.
/// ATTENTION: DOES NOT CHECK FOR OWNERSHIP BY ITSELF
pub async fn delete_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::{
            add_to_list, fixtures, list_recipe_parts, list_recipe_tags, RecipeList,
        },
        schema::UserRole,
    };

    async fn recipe_count(pool: &Pool<Postgres>) -> i64 {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes")
            .fetch_one(pool)
            .await
            .unwrap();
        count.0
    }

    fn session(user_id: Uuid, role: UserRole) -> SessionData {
        SessionData {
            user_id,
            username: String::from("cook"),
            role,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_ingredient_writes_nothing(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;
        let lunch = fixtures::tag(&pool, "lunch").await;
        let recipe = fixtures::valid_recipe("Soup", &[(999, 5)], &[lunch]);

        let error = create_recipe(cook, &recipe, "recipes/images/x.png", &pool)
            .await
            .unwrap_err();

        assert_eq!(error.code, 400);
        assert_eq!(recipe_count(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn failed_update_keeps_previous_links(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;
        let salt = fixtures::ingredient(&pool, "Salt", "g").await;
        let lunch = fixtures::tag(&pool, "lunch").await;
        let soup = fixtures::recipe(&pool, cook, "Soup", &[(salt, 5)], &[lunch]).await;

        let broken = fixtures::valid_recipe("Renamed", &[(salt, 7)], &[lunch, 999]);
        let error = update_recipe(soup, &broken, "recipes/images/y.png", &pool)
            .await
            .unwrap_err();
        assert_eq!(error.code, 400);

        let stored = require_recipe(soup, &pool).await.unwrap();
        assert_eq!(stored.name, "Soup");
        assert_eq!(stored.image, "recipes/images/x.png");

        let parts = list_recipe_parts(&pool, soup).await.unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].amount, 5);
        let tags = list_recipe_tags(&pool, soup).await.unwrap();
        assert_eq!(tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![lunch]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_replaces_links(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;
        let salt = fixtures::ingredient(&pool, "Salt", "g").await;
        let rice = fixtures::ingredient(&pool, "Rice", "g").await;
        let lunch = fixtures::tag(&pool, "lunch").await;
        let dinner = fixtures::tag(&pool, "dinner").await;
        let soup = fixtures::recipe(&pool, cook, "Soup", &[(salt, 5)], &[lunch]).await;

        let changed = fixtures::valid_recipe("Rice soup", &[(rice, 200), (salt, 3)], &[dinner]);
        update_recipe(soup, &changed, "recipes/images/x.png", &pool)
            .await
            .unwrap();

        let parts = list_recipe_parts(&pool, soup).await.unwrap();
        assert_eq!(
            parts.iter().map(|p| (p.id, p.amount)).collect::<Vec<_>>(),
            vec![(rice, 200), (salt, 3)]
        );
        let tags = list_recipe_tags(&pool, soup).await.unwrap();
        assert_eq!(tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![dinner]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn only_owner_or_admin_may_modify(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;
        let guest = fixtures::user(&pool, "guest").await;
        let salt = fixtures::ingredient(&pool, "Salt", "g").await;
        let lunch = fixtures::tag(&pool, "lunch").await;
        let soup = fixtures::recipe(&pool, cook, "Soup", &[(salt, 5)], &[lunch]).await;

        assert!(get_recipe_mut(soup, &session(cook, UserRole::User), &pool).await.is_ok());
        assert!(get_recipe_mut(soup, &session(guest, UserRole::Admin), &pool).await.is_ok());

        let error = get_recipe_mut(soup, &session(guest, UserRole::User), &pool)
            .await
            .unwrap_err();
        assert_eq!(error.code, 403);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_filters_and_pages(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;
        let other = fixtures::user(&pool, "other").await;
        let salt = fixtures::ingredient(&pool, "Salt", "g").await;
        let lunch = fixtures::tag(&pool, "lunch").await;
        let dinner = fixtures::tag(&pool, "dinner").await;
        let soup = fixtures::recipe(&pool, cook, "Soup", &[(salt, 5)], &[lunch]).await;
        let stew = fixtures::recipe(&pool, other, "Stew", &[(salt, 3)], &[dinner]).await;
        add_to_list(RecipeList::Favorites, cook, stew, &pool).await.unwrap();

        let first = Pagination::new(1, 6);
        let (all, count) = fetch_recipes(&RecipeFilter::default(), None, &first, &pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![stew, soup]);

        let by_tag = RecipeFilter {
            tags: vec![String::from("lunch")],
            ..Default::default()
        };
        let (tagged, _) = fetch_recipes(&by_tag, None, &first, &pool).await.unwrap();
        assert_eq!(tagged.iter().map(|r| r.id).collect::<Vec<_>>(), vec![soup]);

        let by_author = RecipeFilter {
            author: Some(other),
            ..Default::default()
        };
        let (authored, _) = fetch_recipes(&by_author, None, &first, &pool).await.unwrap();
        assert_eq!(authored.iter().map(|r| r.id).collect::<Vec<_>>(), vec![stew]);

        let favorited = RecipeFilter {
            is_favorited: true,
            ..Default::default()
        };
        let (mine, _) = fetch_recipes(&favorited, Some(cook), &first, &pool).await.unwrap();
        assert_eq!(mine.iter().map(|r| r.id).collect::<Vec<_>>(), vec![stew]);
        let (anonymous, count) = fetch_recipes(&favorited, None, &first, &pool).await.unwrap();
        assert!(anonymous.is_empty());
        assert_eq!(count, 0);

        let error = fetch_recipes(&RecipeFilter::default(), None, &Pagination::new(5, 6), &pool)
            .await
            .unwrap_err();
        assert_eq!(error.code, 404);
    }
}
