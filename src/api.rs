// Trip Journal - REST API (axum)
// Report endpoints plus the media cleanup; every request is its own unit of work.

use crate::aggregation::{
    AggregationEngine, CategoryEntry, CategoryTotal, ExpenseSummary, LocationEntry, LocationTotal,
    SecondarySummary,
};
use crate::db::QueryExecutor;
use crate::filter::FilterSpec;
use crate::media::MediaStore;
use crate::photos::{PhotoFilterEngine, PhotoList};
use crate::reconciliation::{CleanupReport, FailedDeletion, ReconciliationEngine};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn QueryExecutor>,
    pub media: Arc<dyn MediaStore>,
    pub image_extensions: Arc<Vec<String>>,
}

// ============================================================================
// Errors
// ============================================================================

/// Any failure inside a handler becomes a 500 with the error chain
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = format!("{:#}", self.0);
        tracing::error!(error = %message, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Responses
// ============================================================================

/// Every `unused` path ends up in exactly one of `deleted`, `failed` or
/// `relinked` (kept because a reference appeared mid-pass)
#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub message: String,
    pub referenced: Vec<String>,
    pub unused: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDeletion>,
    pub relinked: Vec<String>,
    pub referenced_memories: Vec<String>,
    pub unused_memories: Vec<String>,
    pub deleted_memories: Vec<String>,
    pub failed_memories: Vec<FailedDeletion>,
    pub relinked_memories: Vec<String>,
    pub images_directory_missing: bool,
    pub memories_directory_missing: bool,
}

impl From<CleanupReport> for CleanupResponse {
    fn from(report: CleanupReport) -> Self {
        Self {
            message: report.summary(),
            referenced: report.images.referenced,
            unused: report.images.unused,
            deleted: report.images.deleted,
            failed: report.images.failed,
            relinked: report.images.relinked,
            referenced_memories: report.memories.referenced,
            unused_memories: report.memories.unused,
            deleted_memories: report.memories.deleted,
            failed_memories: report.memories.failed,
            relinked_memories: report.memories.relinked,
            images_directory_missing: report.images.directory_missing,
            memories_directory_missing: report.memories.directory_missing,
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "OK" }))
}

/// GET /api/locations/
async fn get_locations(State(state): State<AppState>) -> ApiResult<Vec<LocationEntry>> {
    Ok(Json(AggregationEngine::new(state.db.as_ref()).distinct_locations()?))
}

/// GET /api/categories/
async fn get_categories(State(state): State<AppState>) -> ApiResult<Vec<CategoryEntry>> {
    Ok(Json(AggregationEngine::new(state.db.as_ref()).distinct_categories()?))
}

/// GET /api/report/summary/
async fn get_expense_summary(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<ExpenseSummary> {
    let filter = FilterSpec::from_query(&query);
    Ok(Json(AggregationEngine::new(state.db.as_ref()).expense_summary(&filter)?))
}

/// GET /api/report/category-pie/
async fn get_category_pie(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Vec<CategoryTotal>> {
    let filter = FilterSpec::from_query(&query);
    Ok(Json(AggregationEngine::new(state.db.as_ref()).category_breakdown(&filter)?))
}

/// GET /api/report/location-pie/
async fn get_location_pie(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Vec<LocationTotal>> {
    let filter = FilterSpec::from_query(&query);
    Ok(Json(AggregationEngine::new(state.db.as_ref()).location_breakdown(&filter)?))
}

/// GET /api/report/secondary-summary/
async fn get_secondary_summary(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<SecondarySummary> {
    let filter = FilterSpec::from_query(&query);
    Ok(Json(AggregationEngine::new(state.db.as_ref()).secondary_summary(&filter)?))
}

/// GET /api/report/people-photos/
async fn get_people_photos(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<PhotoList> {
    let filter = FilterSpec::from_query(&query);
    Ok(Json(PhotoFilterEngine::new(state.db.as_ref()).person_photos(&filter)?))
}

/// GET /api/report/memory-photos/
async fn get_memory_photos(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<PhotoList> {
    let filter = FilterSpec::from_query(&query);
    Ok(Json(PhotoFilterEngine::new(state.db.as_ref()).memory_photos(&filter)?))
}

/// DELETE /api/cleanup_unused_images/
async fn cleanup_unused_images(State(state): State<AppState>) -> ApiResult<CleanupResponse> {
    let engine = ReconciliationEngine::with_extensions(
        state.db.as_ref(),
        state.media.as_ref(),
        state.image_extensions.as_ref().clone(),
    );
    Ok(Json(engine.reconcile()?.into()))
}

// ============================================================================
// Router
// ============================================================================

/// API routes, without the `/api` prefix
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/locations/", get(get_locations))
        .route("/categories/", get(get_categories))
        .route("/report/summary/", get(get_expense_summary))
        .route("/report/category-pie/", get(get_category_pie))
        .route("/report/location-pie/", get(get_location_pie))
        .route("/report/secondary-summary/", get(get_secondary_summary))
        .route("/report/people-photos/", get(get_people_photos))
        .route("/report/memory-photos/", get(get_memory_photos))
        .route("/cleanup_unused_images/", delete(cleanup_unused_images))
        .with_state(state)
}

/// Full application: `/api` routes plus read-only `/media` files
pub fn app(state: AppState, media_root: &Path) -> Router {
    Router::new()
        .nest("/api", api_routes(state))
        .nest_service("/media", ServeDir::new(media_root))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        insert_expense, insert_person, insert_person_photo, insert_trip, ExpenseRecord,
        SqliteExecutor,
    };
    use crate::media::FsMediaStore;
    use crate::reconciliation::DEFAULT_IMAGE_EXTENSIONS;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn test_app(media_root: &Path) -> Router {
        test_app_with(media_root, |_, _| {})
    }

    /// Paris trip with two expenses, plus whatever `seed` adds to it
    fn test_app_with(media_root: &Path, seed: impl FnOnce(&SqliteExecutor, i64)) -> Router {
        let db = SqliteExecutor::open_in_memory().unwrap();
        db.setup().unwrap();
        let trip = insert_trip(&db, "Paris").unwrap();
        let lunch = ExpenseRecord::new("Lunch", 50.0, "Food", "Paris", "2024-01-01");
        let dinner = ExpenseRecord::new("Dinner", 30.0, "Food", "Paris", "2024-01-05");
        insert_expense(&db, trip, &lunch).unwrap();
        insert_expense(&db, trip, &dinner).unwrap();
        seed(&db, trip);

        let state = AppState {
            db: Arc::new(db),
            media: Arc::new(FsMediaStore::new(media_root)),
            image_extensions: Arc::new(
                DEFAULT_IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            ),
        };
        app(state, media_root)
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_summary_endpoint() {
        let media = tempfile::tempdir().unwrap();
        let (status, body) = call(
            test_app(media.path()),
            Method::GET,
            "/api/report/summary/?trip_id=1&start_date=2024-01-01",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_expense"], 80.0);
        assert_eq!(body["average_expense"], 40.0);
        assert_eq!(body["number_of_expenses"], 2);
        assert_eq!(body["last_date"], "2024-01-05");
    }

    #[tokio::test]
    async fn test_category_pie_endpoint() {
        let media = tempfile::tempdir().unwrap();
        let (status, body) = call(
            test_app(media.path()),
            Method::GET,
            "/api/report/category-pie/?trip_id=1",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([{ "category": "Food", "total": 80.0 }]));
    }

    #[tokio::test]
    async fn test_people_photos_endpoint_empty() {
        let media = tempfile::tempdir().unwrap();
        let (status, body) = call(
            test_app(media.path()),
            Method::GET,
            "/api/report/people-photos/?trip_id=2",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "photos": [] }));
    }

    #[tokio::test]
    async fn test_cleanup_endpoint_without_images_dir() {
        let media = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(media.path().join("memories")).unwrap();
        std::fs::write(media.path().join("memories/orphan.jpg"), b"x").unwrap();

        let (status, body) = call(
            test_app(media.path()),
            Method::DELETE,
            "/api/cleanup_unused_images/",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["images_directory_missing"], true);
        assert_eq!(body["deleted"], serde_json::json!([]));
        assert_eq!(body["deleted_memories"], serde_json::json!(["memories/orphan.jpg"]));
    }

    #[tokio::test]
    async fn test_cleanup_endpoint_reports_every_outcome() {
        let media = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(media.path().join("images")).unwrap();
        std::fs::write(media.path().join("images/keep.jpg"), b"x").unwrap();
        std::fs::write(media.path().join("images/stale.jpg"), b"x").unwrap();

        let app = test_app_with(media.path(), |db, trip| {
            let person =
                insert_person(db, trip, "Ana", "ana@ex.com", "Paris", "2024-01-02").unwrap();
            insert_person_photo(db, trip, person, "images/keep.jpg").unwrap();
        });
        let (status, body) = call(app, Method::DELETE, "/api/cleanup_unused_images/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["referenced"], serde_json::json!(["images/keep.jpg"]));
        assert_eq!(body["unused"], serde_json::json!(["images/stale.jpg"]));
        assert_eq!(body["deleted"], serde_json::json!(["images/stale.jpg"]));
        assert_eq!(body["failed"], serde_json::json!([]));
        assert_eq!(body["relinked"], serde_json::json!([]));
        assert_eq!(body["referenced_memories"], serde_json::json!([]));
        assert_eq!(body["relinked_memories"], serde_json::json!([]));
        assert_eq!(body["memories_directory_missing"], true);
        assert!(media.path().join("images/keep.jpg").exists());
    }
}
