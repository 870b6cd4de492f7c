//! Notes API endpoints.
//!
//! Creating a note stores it and announces it on the `notes` channel to every
//! connection except the caller's.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use notecast_broadcast::PublishOptions;
use notecast_events::DomainEvent;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::notes::{NewNote, Note};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(create_note).get(list_notes))
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ListNotesResponse {
    pub items: Vec<Note>,
    pub total: usize,
}

async fn create_note(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateNoteRequest>,
) -> Result<Response, ApiError> {
    let new = NewNote {
        title: req.title,
        content: req.content,
        author: ctx.author.clone(),
    };
    if let Err(errors) = new.validate() {
        return Err(ApiError::validation(&errors).with_request_id(ctx.request_id));
    }

    let note = state.notes().create(new).await;
    info!(
        request_id = %ctx.request_id,
        note_id = note.id,
        "Note created"
    );

    let event = DomainEvent::note_created(note.snapshot(), note.author.clone());
    if let Err(e) = state
        .publisher()
        .publish(&event, PublishOptions::to_others(ctx.socket_id))
        .await
    {
        warn!(
            request_id = %ctx.request_id,
            note_id = note.id,
            error = %e,
            "Note stored but its announcement failed"
        );
        return Err(ApiError::from(e).with_request_id(ctx.request_id));
    }

    Ok((StatusCode::CREATED, Json(note)).into_response())
}

async fn list_notes(State(state): State<AppState>) -> impl IntoResponse {
    let items = state.notes().list().await;
    let total = items.len();
    Json(ListNotesResponse { items, total })
}
