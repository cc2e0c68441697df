mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod payload;
    pub mod representation;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod handlers {
    pub mod catalog;
    pub mod recipes;
    pub mod users;
}
mod constants;

pub mod config;
pub mod error;
pub mod media;
pub mod routes;
pub mod shopping_list;

pub use authentication::*;
pub use constants::*;
pub use database::error::{QueryError, TypeError};
pub use database::{actions, form, pagination, payload, representation, schema};
