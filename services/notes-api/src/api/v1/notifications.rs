//! Ad-hoc notification endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use notecast_broadcast::{PublishError, PublishOptions};
use notecast_events::{ChannelSelector, DomainEvent, Envelope, Severity};
use notecast_id::Identity;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(send_notification))
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub message: String,

    /// Severity; `info` when omitted.
    #[serde(rename = "type")]
    pub severity: Option<String>,

    /// Target user. Without one, everyone on the public channel gets it.
    pub user_id: Option<Identity>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct SendNotificationResponse {
    pub accepted: bool,
    pub channel: String,
}

async fn send_notification(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<SendNotificationRequest>,
) -> Result<Response, ApiError> {
    if req.message.trim().is_empty() {
        return Err(
            ApiError::unprocessable("message_required", "message must not be empty")
                .with_request_id(ctx.request_id),
        );
    }

    let severity = match req.severity.as_deref() {
        None => Severity::default(),
        Some(raw) => raw.parse::<Severity>().map_err(|e| {
            ApiError::bad_request("invalid_type", e.to_string())
                .with_request_id(ctx.request_id.clone())
        })?,
    };

    let event = DomainEvent::notification(req.message, severity, req.user_id);
    let channel = Envelope::build(&event)
        .map(|envelope| {
            envelope
                .channels
                .iter()
                .map(ChannelSelector::name)
                .collect::<Vec<_>>()
                .join(",")
        })
        .map_err(|e| {
            ApiError::from(PublishError::from(e)).with_request_id(ctx.request_id.clone())
        })?;
    if let Err(e) = state
        .publisher()
        .publish(&event, PublishOptions::default())
        .await
    {
        warn!(request_id = %ctx.request_id, error = %e, "Notification was not published");
        return Err(ApiError::from(e).with_request_id(ctx.request_id));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SendNotificationResponse {
            accepted: true,
            channel,
        }),
    )
        .into_response())
}
