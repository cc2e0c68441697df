use std::convert::Infallible;

use serde_json::json;
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        LengthRequired, MethodNotAllowed, MissingHeader, PayloadTooLarge, Rejection,
        UnsupportedMediaType,
    },
    Reply,
};

/// An error that is reported to the client as `{"errors": info}` with the
/// status `code`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {}", .info.as_deref().unwrap_or("-"))]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
}

impl warp::reject::Reject for Error {}

impl Error {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn message(&self) -> String {
        match &self.info {
            Some(info) => info.to_owned(),
            None => self
                .status()
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    Unauthorized,
    InvalidSession,
    Forbidden,
    NotFound,
    InternalServerError,
}

impl HtmlError {
    pub fn code(&self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::Unauthorized => 401,
            HtmlError::InvalidSession => 401,
            HtmlError::Forbidden => 403,
            HtmlError::NotFound => 404,
            HtmlError::InternalServerError => 500,
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
        }
    }

    pub fn default(self) -> Error {
        Error {
            code: self.code(),
            info: None,
        }
    }
}

/// Turns every rejection the route tree can produce into a JSON reply.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let error = if err.is_not_found() {
        HtmlError::NotFound.new("Not found.")
    } else if let Some(e) = err.find::<Error>() {
        e.to_owned()
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        HtmlError::InvalidRequest.new(&format!("Malformed payload: {e}"))
    } else if let Some(e) = err.find::<MissingHeader>() {
        HtmlError::Unauthorized.new(&format!("Missing header {}", e.name()))
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        HtmlError::InvalidRequest.new("Invalid query string")
    } else if err.find::<PayloadTooLarge>().is_some() {
        Error {
            code: 413,
            info: Some(String::from("Payload too large")),
        }
    } else if err.find::<LengthRequired>().is_some() {
        Error {
            code: 411,
            info: Some(String::from("Content-Length header is required")),
        }
    } else if err.find::<UnsupportedMediaType>().is_some() {
        Error {
            code: 415,
            info: Some(String::from("Expected a JSON body")),
        }
    } else if err.find::<MethodNotAllowed>().is_some() {
        Error {
            code: 405,
            info: Some(String::from("Method not allowed.")),
        }
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        HtmlError::InternalServerError.default()
    };

    if error.code >= 500 {
        log::error!("> {}", error);
    }

    let body = warp::reply::json(&json!({ "errors": error.message() }));
    Ok(warp::reply::with_status(body, error.status()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(HtmlError::InvalidRequest.default().status(), StatusCode::BAD_REQUEST);
        assert_eq!(HtmlError::InvalidSession.default().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(HtmlError::Forbidden.default().status(), StatusCode::FORBIDDEN);
        assert_eq!(HtmlError::NotFound.default().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn message_falls_back_to_reason_phrase() {
        assert_eq!(HtmlError::NotFound.default().message(), "Not Found");
        assert_eq!(HtmlError::NotFound.new("No recipe").message(), "No recipe");
    }

    #[tokio::test]
    async fn custom_rejection_keeps_status() {
        let rejection: Rejection = HtmlError::InvalidRequest.new("Recipe already added").into();
        let reply = handle_rejection(rejection).await.unwrap().into_response();

        assert_eq!(reply.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_route_is_not_found() {
        let reply = handle_rejection(warp::reject::not_found())
            .await
            .unwrap()
            .into_response();

        assert_eq!(reply.status(), StatusCode::NOT_FOUND);
    }
}
