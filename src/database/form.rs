use std::str::FromStr;

use warp::{reject::Rejection, Filter};

use super::error::TypeError;

/// Decoded query pairs, in request order. Keys may repeat (`?tags=a&tags=b`).
pub type FormData = Vec<(String, String)>;

#[derive(Debug, Clone, Default)]
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, TypeError>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_e| TypeError::new(&format!("Invalid number for {key}"))),
            None => Ok(None),
        }
    }

    /// `1`/`true` enable a flag, anything else (or absence) leaves it off.
    pub fn get_flag(&self, key: &str) -> bool {
        matches!(self.get_str(key), Some("1") | Some("true"))
    }
}

pub fn with_form() -> impl Filter<Extract = (Form,), Error = Rejection> + Clone {
    warp::query::<FormData>().map(Form::from_data)
}
