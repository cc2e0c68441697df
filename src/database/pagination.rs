use serde::Serialize;
use warp::{reject::Rejection, Filter};

use crate::{
    constants::MAX_COUNT_PER_PAGE,
    error::{Error, HtmlError},
};

use super::form::with_form;

/// Highest page whose offset still fits in an `i64`.
const MAX_PAGE: i64 = i64::MAX / MAX_COUNT_PER_PAGE;

/// The page window requested by the client, extracted once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    path: String,
    query: String,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            limit: limit.clamp(1, MAX_COUNT_PER_PAGE),
            path: String::new(),
            query: String::new(),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Pages past the last row are 404, like a page number that was never
    /// handed out. The first page is always valid, even when empty.
    pub fn ensure_in_range(&self, rows_on_page: usize) -> Result<(), Error> {
        if self.page > 1 && rows_on_page == 0 {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }
        Ok(())
    }

    /// Link to `page`, keeping every other query parameter as sent.
    fn link(&self, page: i64) -> String {
        let mut params: Vec<String> = self
            .query
            .split('&')
            .filter(|p| !p.is_empty() && !p.starts_with("page="))
            .map(|p| p.to_owned())
            .collect();
        params.push(format!("page={page}"));

        format!("{}?{}", self.path, params.join("&"))
    }
}

#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(results: Vec<T>, count: i64, pagination: &Pagination) -> Self {
        let next = (pagination.offset().saturating_add(pagination.limit) < count)
            .then(|| pagination.link(pagination.page + 1));
        let previous = (pagination.page > 1 && count > 0)
            .then(|| pagination.link((pagination.page - 1).min(last_page(count, pagination.limit))));

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

fn last_page(count: i64, limit: i64) -> i64 {
    (count.saturating_add(limit - 1) / limit).max(1)
}

/// Extracts `page`/`limit` from the query string. `default_limit` applies
/// when the client does not send `limit`.
pub fn with_pagination(
    default_limit: i64,
) -> impl Filter<Extract = (Pagination,), Error = Rejection> + Clone {
    warp::path::full()
        .and(
            warp::query::raw()
                .or(warp::any().map(String::new))
                .unify(),
        )
        .and(with_form())
        .and_then(move |path: warp::path::FullPath, query: String, form: super::form::Form| async move {
            let page = form.get_number::<i64>("page").map_err(Error::from)?;
            let limit = form.get_number::<i64>("limit").map_err(Error::from)?;
            if page.is_some_and(|page| page > MAX_PAGE) {
                return Err(HtmlError::NotFound.new("Invalid page.").into());
            }

            let mut pagination = Pagination::new(page.unwrap_or(1), limit.unwrap_or(default_limit));
            pagination.path = path.as_str().to_owned();
            pagination.query = query;

            Ok::<_, Rejection>(pagination)
        })
}


#[cfg(test)]
impl Pagination {
    fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_owned();
        self
    }
}
