//! Event handlers: ingestion, deletion, content resolution.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::dto::{ContentDto, LogEventsRequest, LogEventsResponse};
use crate::app_state::AppState;
use crate::domain::{EventId, NewEvent};
use crate::error::{ErrorResponse, JournalError};

/// `POST /events`: Append events to the log.
///
/// # Errors
///
/// Returns [`JournalError::InvalidRequest`] for an empty batch and
/// [`JournalError::Log`] if the log refuses it.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Log events",
    description = "Appends events to the backing log. Days already loaded receive them through their live subscription.",
    request_body = LogEventsRequest,
    responses(
        (status = 201, description = "Events logged", body = LogEventsResponse),
        (status = 400, description = "Empty batch", body = ErrorResponse),
        (status = 503, description = "Event log unavailable", body = ErrorResponse),
    )
)]
pub async fn log_events(
    State(state): State<AppState>,
    Json(req): Json<LogEventsRequest>,
) -> Result<impl IntoResponse, JournalError> {
    let events: Vec<NewEvent> = req.events.into_iter().map(NewEvent::from).collect();
    let ids = state.journal_service.log_events(events).await?;
    Ok((
        StatusCode::CREATED,
        Json(LogEventsResponse {
            ids: ids.into_iter().map(EventId::get).collect(),
        }),
    ))
}

/// `DELETE /events/{id}`: Delete one event.
///
/// # Errors
///
/// Returns [`JournalError::EventNotFound`] if the log does not know the
/// event.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Delete an event",
    description = "Deletes the event from the backing log. The owning day drops it when the log's deletion notice arrives.",
    params(
        ("id" = u32, Path, description = "Event id"),
    ),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, JournalError> {
    let id = EventId::new(id);
    let deleted = state.journal_service.delete_events(&[id]).await?;
    if deleted.is_empty() {
        return Err(JournalError::EventNotFound(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /events/{id}/content`: Resolved content of an event.
///
/// # Errors
///
/// Returns [`JournalError::EventNotFound`] or [`JournalError::NoSubject`].
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/content",
    tag = "Events",
    summary = "Get event content",
    description = "Resolves the event's primary subject to a display-ready object with title, icon and preview availability.",
    params(
        ("id" = u32, Path, description = "Event id"),
    ),
    responses(
        (status = 200, description = "Content object", body = ContentDto),
        (status = 404, description = "Event or subject not found", body = ErrorResponse),
    )
)]
pub async fn event_content(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, JournalError> {
    let content = state
        .journal_service
        .record_content(EventId::new(id))
        .await?;
    Ok(Json(ContentDto::from(content.as_ref())))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(log_events))
        .route("/events/{id}", delete(delete_event))
        .route("/events/{id}/content", get(event_content))
}
