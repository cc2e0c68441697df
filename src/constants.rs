pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const MAX_COUNT_PER_PAGE: i64 = 100;

pub const SHOPPING_LIST_TITLE: &str = "Shopping list";
pub const SHOPPING_LIST_FOOTER: &str = "Foodgram";
pub const SHOPPING_LIST_SUFFIX: &str = "_shopping_list.txt";
pub const SHOPPING_LIST_TIMESTAMP: &str = "%d/%m/%Y %H:%M";

pub const RECIPE_IMAGE_DIR: &str = "recipes/images";
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub const SESSION_SCHEMES: &[&str] = &["Token", "Bearer"];
