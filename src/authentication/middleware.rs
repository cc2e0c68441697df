use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::{
    constants::SESSION_SCHEMES,
    error::{Error, HtmlError},
};

use super::jwt::{verify_jwt_session, SessionData};

/// Pulls the token out of `Authorization: Token <jwt>` (or `Bearer`).
fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() || !SESSION_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return None;
    }

    Some(token)
}

fn resolve_session(header: &str, secret: &[u8]) -> Result<SessionData, Error> {
    let token = parse_authorization(header)
        .ok_or_else(|| HtmlError::InvalidSession.new("Invalid session; Malformed authorization"))?;

    verify_jwt_session(token, secret).map(SessionData::from)
}

pub fn with_session(
    secret: Arc<Vec<u8>>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            let header = header.ok_or_else(|| {
                HtmlError::Unauthorized.new("Authentication credentials were not provided")
            })?;

            resolve_session(&header, &secret).map_err(Rejection::from)
        }
    })
}

/// Like [`with_session`], but anonymous or invalid credentials yield `None`.
pub fn with_possible_session(
    secret: Arc<Vec<u8>>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(move |header: Option<String>| {
        header.and_then(|header| match resolve_session(&header, &secret) {
            Ok(session) => Some(session),
            Err(e) => {
                log::trace!("> Ignoring credentials: {}", e);
                None
            }
        })
    })
}
