//! Request-scoped context extracted from HTTP requests.
//!
//! Authentication happens in front of this service. The gateway forwards the
//! signed-in user as `X-User-*` headers; clients add their realtime
//! connection as `X-Socket-ID` so their own actions are not echoed back.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use notecast_events::AuthorSnapshot;
use notecast_id::{RequestId, SocketId};

use crate::api::error::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const SOCKET_ID_HEADER: &str = "x-socket-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,

    /// Signed-in user, when the gateway supplied one.
    pub author: Option<AuthorSnapshot>,

    /// Realtime connection of the caller.
    pub socket_id: Option<SocketId>,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn author_from_headers(
    headers: &HeaderMap,
    request_id: &str,
) -> Result<Option<AuthorSnapshot>, ApiError> {
    let Some(raw_id) = header_string(headers, USER_ID_HEADER) else {
        return Ok(None);
    };

    let id = raw_id.parse::<i64>().map_err(|_| {
        ApiError::bad_request("invalid_user_id", "X-User-Id must be an integer")
            .with_request_id(request_id.to_string())
    })?;

    let Some(name) = header_string(headers, USER_NAME_HEADER) else {
        return Ok(None);
    };

    Ok(Some(AuthorSnapshot {
        id,
        name,
        email: header_string(headers, USER_EMAIL_HEADER).unwrap_or_default(),
    }))
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = header_string(&parts.headers, REQUEST_ID_HEADER)
            .unwrap_or_else(|| RequestId::new().to_string());

        let author = author_from_headers(&parts.headers, &request_id)?;

        // A malformed socket id only disables echo suppression.
        let socket_id = header_string(&parts.headers, SOCKET_ID_HEADER)
            .and_then(|raw| SocketId::parse(&raw).ok());

        Ok(Self {
            request_id,
            author,
            socket_id,
        })
    }
}
