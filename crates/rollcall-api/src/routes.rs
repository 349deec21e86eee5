use std::hash::{Hash, Hasher};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rollcall_core::db::Database;

use crate::attendance::{attendance_history, attendance_sync};
use crate::auth::{extract_bearer_token, AuthenticatedFaculty, FacultyJwtVerifier};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::rate_limit::{EndpointRateLimiter, ProtectedEndpoint, RateLimitMetricsSnapshot};
use crate::recognizer::{FaceGatewayClient, RecognitionOutcome, RecognitionRequest};
use crate::roster::{
    create_faculty, create_section, create_student, deactivate_student, get_faculty, get_student,
    list_sections, list_students, update_student,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<Database>,
    jwt_verifier: Arc<FacultyJwtVerifier>,
    face_gateway: Option<Arc<FaceGatewayClient>>,
    pub endpoint_rate_limiter: Arc<EndpointRateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: Arc<Database>) -> Self {
        Self {
            jwt_verifier: Arc::new(FacultyJwtVerifier::new(config.clone())),
            face_gateway: FaceGatewayClient::from_config(&config).map(Arc::new),
            endpoint_rate_limiter: Arc::new(EndpointRateLimiter::from_config(config.as_ref())),
            config,
            db,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/attendance/sync", post(attendance_sync))
        .route("/attendance/history", get(attendance_history))
        .route("/students", post(create_student).get(list_students))
        .route(
            "/students/{id}",
            get(get_student).put(update_student).delete(deactivate_student),
        )
        .route("/sections", post(create_section).get(list_sections))
        .route("/faculty", post(create_faculty))
        .route("/faculty/{id}", get(get_faculty))
        .route("/recognition/identify", post(recognition_identify))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.endpoint_rate_limiter.metrics_snapshot(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let faculty = state.jwt_verifier.verify_access_token(token)?;
    request.extensions_mut().insert(faculty);
    Ok(next.run(request).await)
}

async fn recognition_identify(
    State(state): State<AppState>,
    Extension(faculty): Extension<AuthenticatedFaculty>,
    Json(request): Json<RecognitionRequest>,
) -> Result<Json<RecognitionOutcome>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Recognition, &faculty.faculty_id)
        .await?;

    let gateway = state.face_gateway.as_ref().ok_or_else(|| {
        AppError::Config("Face recognition gateway is not configured on the backend".to_string())
    })?;

    if request.image.trim().is_empty() {
        return Err(AppError::bad_request(
            "image must be a non-empty base64 string",
        ));
    }

    let outcome = gateway.identify(&request).await?;
    tracing::info!(
        endpoint = "recognition_identify",
        faculty = faculty_fingerprint(&faculty.faculty_id),
        matches = outcome.matches.len(),
        "Proxied recognition request"
    );
    Ok(Json(outcome))
}

pub(crate) fn faculty_fingerprint(faculty_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    faculty_id.hash(&mut hasher);
    hasher.finish()
}
