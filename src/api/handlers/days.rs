//! Day handlers: summaries, filtered events, time map, reload.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Days;

use crate::api::dto::{
    DayEventsResponse, DayListResponse, DayRangeParams, DaySummaryDto, EventDto,
    EventFilterParams, ReloadResponse, TimeMapEntryDto, TimeMapResponse,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, JournalError};

/// Days covered by `GET /days` when no bound is given.
const DEFAULT_WINDOW_DAYS: u64 = 7;

/// `GET /days`: Summaries for a range of days.
///
/// # Errors
///
/// Returns [`JournalError::InvalidDate`] for malformed bounds and
/// [`JournalError::InvalidRequest`] for inverted or oversized ranges.
#[utoipa::path(
    get,
    path = "/api/v1/days",
    tag = "Days",
    summary = "List days",
    description = "Returns one summary per day in the inclusive range, creating day buckets on demand. Defaults to the week ending today.",
    params(DayRangeParams),
    responses(
        (status = 200, description = "Day summaries", body = DayListResponse),
        (status = 400, description = "Invalid date or range", body = ErrorResponse),
    )
)]
pub async fn list_days(
    State(state): State<AppState>,
    Query(params): Query<DayRangeParams>,
) -> Result<impl IntoResponse, JournalError> {
    let service = &state.journal_service;
    let to = match params.to.as_deref() {
        Some(raw) => service.parse_date(raw)?,
        None => service.store().today(),
    };
    let from = match params.from.as_deref() {
        Some(raw) => service.parse_date(raw)?,
        None => to
            .checked_sub_days(Days::new(DEFAULT_WINDOW_DAYS - 1))
            .ok_or_else(|| JournalError::InvalidDate(format!("no week before {to}")))?,
    };

    let data = service
        .list_days(from, to)
        .await?
        .into_iter()
        .map(DaySummaryDto::from)
        .collect();
    Ok(Json(DayListResponse { data }))
}

/// `GET /days/{date}`: Summary of one day.
///
/// # Errors
///
/// Returns [`JournalError::InvalidDate`] for a malformed date.
#[utoipa::path(
    get,
    path = "/api/v1/days/{date}",
    tag = "Days",
    summary = "Get day summary",
    description = "Returns record counts for one day. The first request for a day starts loading it; `loaded` turns true once the initial query has been answered.",
    params(
        ("date" = String, Path, description = "YYYY-MM-DD, `today` or `yesterday`"),
    ),
    responses(
        (status = 200, description = "Day summary", body = DaySummaryDto),
        (status = 400, description = "Invalid date", body = ErrorResponse),
    )
)]
pub async fn get_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, JournalError> {
    let service = &state.journal_service;
    let date = service.parse_date(&date)?;
    let summary = service.day_summary(date).await?;
    Ok(Json(DaySummaryDto::from(summary)))
}

/// `GET /days/{date}/events`: Filtered events of one day.
///
/// # Errors
///
/// Returns [`JournalError::InvalidDate`] for a malformed date and
/// [`JournalError::InvalidRequest`] for an unknown grouping.
#[utoipa::path(
    get,
    path = "/api/v1/days/{date}/events",
    tag = "Days",
    summary = "List events of a day",
    description = "Returns the loaded events of one day that match the query template, optionally collapsed per subject URI. Records whose payload is still being fetched are counted in `pending`.",
    params(
        ("date" = String, Path, description = "YYYY-MM-DD, `today` or `yesterday`"),
        EventFilterParams,
    ),
    responses(
        (status = 200, description = "Matching events", body = DayEventsResponse),
        (status = 400, description = "Invalid date or grouping", body = ErrorResponse),
    )
)]
pub async fn day_events(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(params): Query<EventFilterParams>,
) -> Result<impl IntoResponse, JournalError> {
    let service = &state.journal_service;
    let date = service.parse_date(&date)?;
    let grouping = params.grouping()?;

    let records = service
        .filter_day(date, &params.templates(), grouping)
        .await?;
    let pending = service.day_summary(date).await?.pending_count;

    Ok(Json(DayEventsResponse {
        date,
        grouping: grouping.to_string(),
        pending,
        data: EventDto::from_records(&records),
    }))
}

/// `GET /days/{date}/time-map`: Visit durations of one day.
///
/// # Errors
///
/// Returns [`JournalError::InvalidDate`] for a malformed date.
#[utoipa::path(
    get,
    path = "/api/v1/days/{date}/time-map",
    tag = "Days",
    summary = "Get day time map",
    description = "Pairs each visit with the leave event that ends it, per subject URI.",
    params(
        ("date" = String, Path, description = "YYYY-MM-DD, `today` or `yesterday`"),
    ),
    responses(
        (status = 200, description = "Time map", body = TimeMapResponse),
        (status = 400, description = "Invalid date", body = ErrorResponse),
    )
)]
pub async fn time_map(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, JournalError> {
    let service = &state.journal_service;
    let date = service.parse_date(&date)?;
    let entries = service.time_map(date).await?;
    Ok(Json(TimeMapResponse {
        date,
        entries: entries.iter().map(TimeMapEntryDto::from).collect(),
    }))
}

/// `POST /days/{date}/reload`: Re-run the initial query of a day.
///
/// # Errors
///
/// Returns [`JournalError::Log`] while the event log is unavailable.
#[utoipa::path(
    post,
    path = "/api/v1/days/{date}/reload",
    tag = "Days",
    summary = "Reload a day",
    description = "Re-issues the identifier query for a day, e.g. after the event log was unreachable when the day was first requested. Existing records are kept.",
    params(
        ("date" = String, Path, description = "YYYY-MM-DD, `today` or `yesterday`"),
    ),
    responses(
        (status = 200, description = "Day reloaded", body = ReloadResponse),
        (status = 400, description = "Invalid date", body = ErrorResponse),
        (status = 503, description = "Event log unavailable", body = ErrorResponse),
    )
)]
pub async fn reload_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, JournalError> {
    let service = &state.journal_service;
    let date = service.parse_date(&date)?;
    let created = service.reload_day(date).await?;
    Ok(Json(ReloadResponse { date, created }))
}

/// Day routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/days", get(list_days))
        .route("/days/{date}", get(get_day))
        .route("/days/{date}/events", get(day_events))
        .route("/days/{date}/time-map", get(time_map))
        .route("/days/{date}/reload", post(reload_day))
}
