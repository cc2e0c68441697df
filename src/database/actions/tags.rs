use crate::{
    error::{Error, HtmlError},
    schema::{Tag, Uuid},
    QueryError,
};

use sqlx::{Pool, Postgres, Transaction};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn list_recipe_tags(pool: &Pool<Postgres>, recipe_id: Uuid) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

/// Fails with 400 unless every id in `tags` names an existing tag.
pub async fn ensure_tags_exist(
    tags: &[Uuid],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(tags)
        .fetch_all(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    if let Some(missing) = tags.iter().find(|id| !found.iter().any(|(f,)| f == *id)) {
        return Err(HtmlError::InvalidRequest.new(&format!("Tag {missing} doesn't exist")));
    }

    Ok(())
}
