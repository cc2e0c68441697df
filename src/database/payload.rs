use std::collections::HashSet;

use serde::{Deserialize, Deserializer};

use crate::{
    error::{Error, HtmlError},
    schema::Uuid,
};

/// Accepts `5` as well as `"5"`, which some clients send for numeric fields.
fn lenient_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("`{s}` is not a number"))),
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientAmountPayload {
    pub id: Uuid,
    #[serde(deserialize_with = "lenient_number")]
    pub amount: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RecipePayload {
    #[serde(default)]
    pub ingredients: Vec<IngredientAmountPayload>,
    #[serde(default)]
    pub tags: Option<Vec<Uuid>>,
    #[serde(default)]
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    #[serde(deserialize_with = "lenient_number")]
    pub cooking_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i32,
}

/// A recipe payload that passed [`RecipePayload::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<String>,
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Uuid>,
}

fn positive(value: i64, message: &str) -> Result<i32, Error> {
    match i32::try_from(value) {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(HtmlError::InvalidRequest.new(message)),
    }
}

impl RecipePayload {
    pub fn validate(self) -> Result<ValidRecipe, Error> {
        if self.ingredients.is_empty() {
            return Err(HtmlError::InvalidRequest.new("A recipe needs at least one ingredient"));
        }

        let mut seen = HashSet::new();
        let mut ingredients = Vec::with_capacity(self.ingredients.len());
        for ingredient in self.ingredients {
            let amount = positive(ingredient.amount, "Ingredient amount must be greater than zero")?;
            if !seen.insert(ingredient.id) {
                return Err(HtmlError::InvalidRequest.new("Ingredients must not repeat"));
            }
            ingredients.push(IngredientAmount {
                id: ingredient.id,
                amount,
            });
        }

        let cooking_time = positive(self.cooking_time, "Cooking time must be greater than zero")?;

        let mut tags = self.tags.unwrap_or_default();
        if tags.is_empty() {
            return Err(HtmlError::InvalidRequest.new("A recipe needs at least one tag"));
        }
        let mut seen_tags = HashSet::new();
        tags.retain(|tag| seen_tags.insert(*tag));

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(HtmlError::InvalidRequest.new("Name must not be empty"));
        }
        if self.text.trim().is_empty() {
            return Err(HtmlError::InvalidRequest.new("Text must not be empty"));
        }

        Ok(ValidRecipe {
            name,
            text: self.text,
            cooking_time,
            image: self.image.filter(|image| !image.trim().is_empty()),
            ingredients,
            tags,
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserPayload {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl UserPayload {
    pub fn validate(self) -> Result<ValidUser, Error> {
        let email = self.email.trim().to_string();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(HtmlError::InvalidRequest.new("Enter a valid email address")),
        }

        let username = self.username.trim().to_string();
        let allowed = |c: char| c.is_alphanumeric() || "_.@+-".contains(c);
        if username.is_empty() || !username.chars().all(allowed) {
            return Err(HtmlError::InvalidRequest.new(
                "Username may contain only letters, digits and @/./+/-/_",
            ));
        }
        if username.eq_ignore_ascii_case("me") {
            return Err(HtmlError::InvalidRequest.new("Username `me` is reserved"));
        }

        validate_password(&self.password)?;

        Ok(ValidUser {
            email,
            username,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            password: self.password,
        })
    }
}

pub fn validate_password(password: &str) -> Result<(), Error> {
    if password.chars().count() < 8 {
        return Err(HtmlError::InvalidRequest.new("Password must be at least 8 characters long"));
    }
    Ok(())
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SetPasswordPayload {
    pub new_password: String,
    pub current_password: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: serde_json::Value) -> RecipePayload {
        serde_json::from_value(value).unwrap()
    }

    fn valid() -> serde_json::Value {
        json!({
            "ingredients": [{"id": 1, "amount": 10}, {"id": 2, "amount": "3"}],
            "tags": [1, 2],
            "image": "data:image/png;base64,iVBORw0KGgo=",
            "name": "Pancakes",
            "text": "Mix and fry.",
            "cooking_time": 20
        })
    }

    #[test]
    fn accepts_a_complete_recipe() {
        let recipe = payload(valid()).validate().unwrap();

        assert_eq!(recipe.cooking_time, 20);
        assert_eq!(
            recipe.ingredients,
            vec![
                IngredientAmount { id: 1, amount: 10 },
                IngredientAmount { id: 2, amount: 3 }
            ]
        );
        assert_eq!(recipe.tags, vec![1, 2]);
    }

    #[test]
    fn rejects_missing_or_empty_tags() {
        let mut value = valid();
        value["tags"] = json!([]);
        assert_eq!(payload(value.clone()).validate().unwrap_err().code, 400);

        value.as_object_mut().unwrap().remove("tags");
        assert!(payload(value).validate().is_err());
    }

    #[test]
    fn rejects_non_positive_amounts() {
        for amount in [json!(0), json!(-4), json!("0")] {
            let mut value = valid();
            value["ingredients"][0]["amount"] = amount;

            let error = payload(value).validate().unwrap_err();
            assert_eq!(
                error.info.as_deref(),
                Some("Ingredient amount must be greater than zero")
            );
        }
    }

    #[test]
    fn rejects_amounts_beyond_i32() {
        let mut value = valid();
        value["ingredients"][0]["amount"] = json!(i64::from(i32::MAX) + 1);

        assert!(payload(value).validate().is_err());
    }

    #[test]
    fn rejects_non_positive_cooking_time() {
        for time in [json!(0), json!(-1)] {
            let mut value = valid();
            value["cooking_time"] = time;

            assert!(payload(value).validate().is_err());
        }
    }

    #[test]
    fn rejects_repeated_ingredients() {
        let mut value = valid();
        value["ingredients"] = json!([{"id": 5, "amount": 1}, {"id": 5, "amount": 2}]);

        let error = payload(value).validate().unwrap_err();
        assert_eq!(error.info.as_deref(), Some("Ingredients must not repeat"));
    }

    #[test]
    fn rejects_empty_ingredients() {
        let mut value = valid();
        value["ingredients"] = json!([]);

        assert!(payload(value).validate().is_err());
    }

    #[test]
    fn repeated_tags_are_collapsed() {
        let mut value = valid();
        value["tags"] = json!([3, 1, 3]);

        assert_eq!(payload(value).validate().unwrap().tags, vec![3, 1]);
    }

    #[test]
    fn non_numeric_strings_fail_to_parse() {
        let mut value = valid();
        value["cooking_time"] = json!("soon");

        assert!(serde_json::from_value::<RecipePayload>(value).is_err());
    }

    #[test]
    fn user_validation() {
        let user = UserPayload {
            email: String::from(" anna@example.com "),
            username: String::from("anna.p"),
            first_name: String::from("Anna"),
            last_name: String::new(),
            password: String::from("long enough"),
        };

        assert_eq!(user.clone().validate().unwrap().email, "anna@example.com");

        let mut bad = user.clone();
        bad.email = String::from("anna");
        assert!(bad.validate().is_err());

        let mut bad = user.clone();
        bad.username = String::from("me");
        assert!(bad.validate().is_err());

        let mut bad = user.clone();
        bad.username = String::from("anna p");
        assert!(bad.validate().is_err());

        let mut bad = user;
        bad.password = String::from("short");
        assert!(bad.validate().is_err());
    }
}
