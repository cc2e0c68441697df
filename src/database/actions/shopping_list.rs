use crate::{
    error::Error,
    schema::{CartPart, Uuid},
    QueryError,
};

use sqlx::{Pool, Postgres};

/// Every ingredient line of every recipe in the user's cart, unaggregated.
pub async fn list_cart_parts(user_id: Uuid, pool: &Pool<Postgres>) -> Result<Vec<CartPart>, Error> {
    let rows: Vec<CartPart> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM purchases p
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = p.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE p.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::{add_to_list, fixtures, RecipeList},
        shopping_list::{aggregate, ShoppingListItem},
    };

    #[sqlx::test(migrations = "./migrations")]
    async fn cart_lines_sum_per_ingredient(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;
        let salt = fixtures::ingredient(&pool, "Salt", "g").await;
        let rice = fixtures::ingredient(&pool, "Rice", "g").await;
        let lunch = fixtures::tag(&pool, "lunch").await;
        let soup = fixtures::recipe(&pool, cook, "Soup", &[(salt, 5)], &[lunch]).await;
        let pilaf = fixtures::recipe(&pool, cook, "Pilaf", &[(salt, 3), (rice, 300)], &[lunch]).await;
        let ignored = fixtures::recipe(&pool, cook, "Bread", &[(salt, 10)], &[lunch]).await;

        add_to_list(RecipeList::ShoppingCart, cook, soup, &pool).await.unwrap();
        add_to_list(RecipeList::ShoppingCart, cook, pilaf, &pool).await.unwrap();
        add_to_list(RecipeList::Favorites, cook, ignored, &pool).await.unwrap();

        let parts = list_cart_parts(cook, &pool).await.unwrap();
        assert_eq!(parts.len(), 3);

        assert_eq!(
            aggregate(parts),
            vec![
                ShoppingListItem {
                    name: String::from("Rice"),
                    measurement_unit: String::from("g"),
                    amount: 300,
                },
                ShoppingListItem {
                    name: String::from("Salt"),
                    measurement_unit: String::from("g"),
                    amount: 8,
                },
            ]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn empty_cart_has_no_lines(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;

        assert!(list_cart_parts(cook, &pool).await.unwrap().is_empty());
    }
}
