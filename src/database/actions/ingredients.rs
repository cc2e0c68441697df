use crate::{
    error::{Error, HtmlError},
    schema::{Ingredient, RecipePart, Uuid},
    QueryError,
};

use sqlx::{Pool, Postgres, Transaction};

/// Lists ingredients, optionally narrowed to names starting with `prefix`
/// (case-insensitive).
pub async fn list_ingredients(
    prefix: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match prefix {
        Some(prefix) => sqlx::query_as(
            "SELECT * FROM ingredients WHERE LOWER(name) LIKE LOWER($1) || '%' ORDER BY name, id",
        )
        .bind(escape_like(prefix))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name, id")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_recipe_parts(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
) -> Result<Vec<RecipePart>, Error> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Fails with 400 unless every id in `ingredients` names an existing ingredient.
pub async fn ensure_ingredients_exist(
    ingredients: &[Uuid],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ingredients)
        .fetch_all(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    if let Some(missing) = ingredients
        .iter()
        .find(|id| !found.iter().any(|(f,)| f == *id))
    {
        return Err(HtmlError::InvalidRequest.new(&format!("Ingredient {missing} doesn't exist")));
    }

    Ok(())
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
