//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`. The OpenAPI
//! document is served at `/api-docs/openapi.json`, with Swagger UI at
//! `/swagger-ui` when the `swagger-ui` feature is enabled.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "activity-journal",
        description = "Date-partitioned activity journal over an external event log."
    ),
    paths(
        handlers::system::health_handler,
        handlers::days::list_days,
        handlers::days::get_day,
        handlers::days::day_events,
        handlers::days::time_map,
        handlers::days::reload_day,
        handlers::events::log_events,
        handlers::events::delete_event,
        handlers::events::event_content,
    ),
    components(schemas(
        dto::DaySummaryDto,
        dto::DayListResponse,
        dto::TimeMapResponse,
        dto::TimeMapEntryDto,
        dto::TimeSpanDto,
        dto::ReloadResponse,
        dto::DayEventsResponse,
        dto::EventDto,
        dto::SubjectDto,
        dto::NewEventDto,
        dto::LogEventsRequest,
        dto::LogEventsResponse,
        dto::ContentDto,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Days", description = "Per-day views of the journal"),
        (name = "Events", description = "Ingestion, deletion and content of single events"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    );

    router
}

/// Builds the full application: REST routes, the `/ws` endpoint, HTTP
/// tracing and permissive CORS.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::FixedOffset;
    use tower::ServiceExt;

    use super::*;
    use crate::content::ContentResolver;
    use crate::domain::event::interpretation;
    use crate::domain::{EventBus, EventStore, NewEvent, Subject};
    use crate::log::{EventLog, MemoryEventLog};
    use crate::service::JournalService;

    /// 2024-01-15T00:00:00Z
    const JAN_15: i64 = 1_705_276_800;

    fn app_over(log: MemoryEventLog) -> Router {
        let Some(utc) = FixedOffset::east_opt(0) else {
            panic!("valid offset");
        };
        let log: Arc<dyn EventLog> = Arc::new(log);
        let store = Arc::new(EventStore::new(log, utc, EventBus::new(64)));
        let service = Arc::new(JournalService::new(store, Arc::new(ContentResolver::new())));
        build_app(AppState::new(service))
    }

    fn seeded() -> MemoryEventLog {
        let visit = |ts: i64, interp: &str, uri: &str| NewEvent {
            timestamp: ts,
            interpretation: interp.to_string(),
            manifestation: String::new(),
            actor: "application://firefox.desktop".to_string(),
            subjects: vec![Subject::new(uri)],
        };
        MemoryEventLog::seeded(vec![
            visit(JAN_15 + 1_000, interpretation::ACCESS_EVENT, "https://a.org"),
            visit(JAN_15 + 5_000, interpretation::LEAVE_EVENT, "https://a.org"),
            visit(JAN_15 + 6_000, interpretation::ACCESS_EVENT, "https://a.org"),
        ])
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, serde_json::Value) {
        let Ok(request) = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
        else {
            panic!("valid request");
        };
        let Ok(response) = app.clone().oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("readable body");
        };
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        call(app, "GET", uri, Body::empty()).await
    }

    /// Polls until the day reports no pending records.
    async fn wait_until_fetched(app: &Router, date: &str) {
        for _ in 0..100 {
            let (_, day) = get_json(app, &format!("/api/v1/days/{date}")).await;
            if day["loaded"] == true && day["pending_count"] == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{date} never finished loading");
    }

    #[tokio::test]
    async fn health_reports_store_counters() {
        let app = app_over(MemoryEventLog::new());
        let (status, body) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["days_loaded"], 0);
    }

    #[tokio::test]
    async fn malformed_date_is_bad_request() {
        let app = app_over(MemoryEventLog::new());
        let (status, body) = get_json(&app, "/api/v1/days/2024-13-40").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 1001);
    }

    #[tokio::test]
    async fn day_events_with_grouping() {
        let app = app_over(seeded());
        wait_until_fetched(&app, "2024-01-15").await;

        let (status, all) = get_json(&app, "/api/v1/days/2024-01-15/events").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all["data"].as_array().map(Vec::len), Some(3));

        let (_, grouped) = get_json(
            &app,
            "/api/v1/days/2024-01-15/events?grouping=most_recent_subjects",
        )
        .await;
        assert_eq!(grouped["grouping"], "most_recent_subjects");
        assert_eq!(grouped["data"][0]["id"], 3);

        let (status, _) = get_json(&app, "/api/v1/days/2024-01-15/events?grouping=bogus").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn time_map_reports_durations() {
        let app = app_over(seeded());
        wait_until_fetched(&app, "2024-01-15").await;

        let (status, body) = get_json(&app, "/api/v1/days/2024-01-15/time-map").await;
        assert_eq!(status, StatusCode::OK);
        let spans = &body["entries"][0]["spans"];
        assert_eq!(spans[0]["duration"], 4_000);
        assert_eq!(spans[0]["closed"], true);
        assert_eq!(spans[1]["closed"], false);
    }

    #[tokio::test]
    async fn log_then_delete_event() {
        let app = app_over(MemoryEventLog::new());
        let payload = serde_json::json!({
            "events": [{
                "timestamp": JAN_15 + 60,
                "interpretation": interpretation::ACCESS_EVENT,
                "subjects": [{"uri": "https://example.org", "text": "Example"}]
            }]
        });
        let (status, created) =
            call(&app, "POST", "/api/v1/events", Body::from(payload.to_string())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["ids"][0], 1);

        let (status, content) = get_json(&app, "/api/v1/events/1/content").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content["kind"], "web");
        assert_eq!(content["title"], "Example");

        let (status, _) = call(&app, "DELETE", "/api/v1/events/1", Body::empty()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = call(&app, "DELETE", "/api/v1/events/1", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 2001);
    }

    #[tokio::test]
    async fn list_days_rejects_inverted_range() {
        let app = app_over(MemoryEventLog::new());
        let (status, body) =
            get_json(&app, "/api/v1/days?from=2024-01-10&to=2024-01-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 1002);

        let (status, body) = get_json(&app, "/api/v1/days?from=2024-01-01&to=2024-01-03").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn reload_during_outage_is_unavailable() {
        let log = MemoryEventLog::new();
        log.set_available(false);
        let app = app_over(log);
        let (status, body) = call(&app, "POST", "/api/v1/days/2024-01-15/reload", Body::empty()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], 5001);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = app_over(MemoryEventLog::new());
        let (status, body) = get_json(&app, "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v1/days/{date}/events"].is_object());
    }
}
