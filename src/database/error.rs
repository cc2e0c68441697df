use std::fmt::{self, Display};

use crate::error::{Error, HtmlError};

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

pub struct QueryError {
    info: String,
    conflict: bool,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            conflict: false,
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => Self {
                conflict: e.code().as_deref() == Some(UNIQUE_VIOLATION),
                info: format!("{e}"),
            },
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        if value.conflict {
            log::warn!("> Unique constraint hit: {}", value.info);
            return HtmlError::InvalidRequest.new("Object already exists");
        }

        log::error!("> Query failed: {}", value.info);
        HtmlError::InternalServerError.default()
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}
