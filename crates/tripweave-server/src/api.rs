//! JSON HTTP API over the orchestrator and trip service.
//!
//! The caller's identity comes from the `X-User-Id` header. Authentication
//! is handled in front of this service.

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use tripweave_core::orchestrator::{ChatError, ChatReply, ModifyOutcome, PlanOrchestrator};
use tripweave_core::plan::PlanDocument;
use tripweave_core::session::Message;
use tripweave_core::trips::{TripError, TripRequest, TripService};
use tripweave_db::models::{Trip, TripStatus};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: PlanOrchestrator,
    pub trips: TripService,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    reply_text: Option<String>,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            reply_text: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match err {
            ChatError::Validation(_) => Self::bad_request(message),
            ChatError::NotFound(_) => Self::not_found(message),
            ChatError::Reasoner(e) if e.is_timeout() => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, message)
            }
            ChatError::Reasoner(_) => Self::new(StatusCode::BAD_GATEWAY, message),
            ChatError::StoreWrite {
                reply_text, source, ..
            } if source.is_not_found() => Self {
                status: StatusCode::NOT_FOUND,
                message,
                reply_text: Some(reply_text),
            },
            ChatError::StoreWrite { reply_text, .. } => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message,
                reply_text: Some(reply_text),
            },
            ChatError::Store(_) => Self::internal(message),
        }
    }
}

impl From<TripError> for AppError {
    fn from(err: TripError) -> Self {
        let message = err.to_string();
        match err {
            TripError::Validation(_) => Self::bad_request(message),
            TripError::NotFound(_) => Self::not_found(message),
            TripError::Store(_) => Self::internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        }
        let mut body = serde_json::json!({ "error": self.message });
        if let Some(reply) = self.reply_text {
            body["replyText"] = serde_json::Value::String(reply);
        }
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Caller identity
// ---------------------------------------------------------------------------

/// The caller, from the `X-User-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::bad_request("missing X-User-Id header"))?;
        Ok(Self(value.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub budget: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripResponse {
    pub id: Uuid,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: Option<f64>,
    pub status: TripStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
    pub plan_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Trip> for TripResponse {
    fn from(t: Trip) -> Self {
        Self {
            id: t.id,
            destination: t.destination,
            start_date: t.start_date,
            end_date: t.end_date,
            budget: t.budget,
            status: t.status,
            status_detail: t.status_detail,
            plan_version: t.plan_version,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TripDetailResponse {
    #[serde(flatten)]
    pub trip: TripResponse,
    pub plan: PlanDocument,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub trip_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickActionRequest {
    pub action: String,
    #[serde(default)]
    pub trip_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ModifyRequest {
    pub modification: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyResponse {
    pub modified: bool,
    pub reply_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanDocument>,
}

impl From<ModifyOutcome> for ModifyResponse {
    fn from(outcome: ModifyOutcome) -> Self {
        match outcome {
            ModifyOutcome::Modified { reply_text, plan } => Self {
                modified: true,
                reply_text,
                plan: Some(plan),
            },
            ModifyOutcome::Unchanged { reply_text } => Self {
                modified: false,
                reply_text,
                plan: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    pub trip_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/trips", get(list_trips).post(create_trip))
        .route("/api/trips/{id}", get(get_trip))
        .route("/api/trips/{id}/modify", post(modify_trip))
        .route("/api/chat", post(chat))
        .route("/api/chat/quick-action", post(quick_action))
        .route("/api/chat/history", get(history).delete(clear_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_trips(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<Vec<TripResponse>>, AppError> {
    let trips = state.trips.list_trips(&user).await?;
    Ok(Json(trips.into_iter().map(TripResponse::from).collect()))
}

async fn create_trip(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(body): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<TripResponse>), AppError> {
    let request = TripRequest {
        destination: body.destination,
        start_date: body.start_date,
        end_date: body.end_date,
        budget: body.budget,
    };
    let trip = state.trips.create_trip(&user, &request).await?;
    Ok((StatusCode::ACCEPTED, Json(trip.into())))
}

async fn get_trip(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<TripDetailResponse>, AppError> {
    let detail = state.trips.get_trip_for_user(&user, id).await?;
    Ok(Json(TripDetailResponse {
        trip: detail.trip.into(),
        plan: detail.plan,
    }))
}

/// Reject chats against trips the caller cannot see. A store outage is
/// logged and let through; the orchestrator then chats without plan context.
async fn check_trip_access(
    state: &AppState,
    user: &str,
    trip_id: Option<Uuid>,
) -> Result<(), AppError> {
    let Some(trip_id) = trip_id else {
        return Ok(());
    };
    match state.trips.get_trip_for_user(user, trip_id).await {
        Ok(_) => Ok(()),
        Err(e @ TripError::NotFound(_)) => Err(e.into()),
        Err(e) => {
            tracing::warn!(trip_id = %trip_id, error = %e, "trip access check failed, continuing");
            Ok(())
        }
    }
}

async fn chat(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    check_trip_access(&state, &user, body.trip_id).await?;
    let reply = state
        .orchestrator
        .handle(&user, &body.message, body.trip_id)
        .await?;
    Ok(Json(reply))
}

async fn quick_action(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(body): Json<QuickActionRequest>,
) -> Result<Json<ChatReply>, AppError> {
    check_trip_access(&state, &user, body.trip_id).await?;
    let reply = state
        .orchestrator
        .handle_quick_action(&user, &body.action, body.trip_id)
        .await?;
    Ok(Json(reply))
}

async fn modify_trip(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
    Json(body): Json<ModifyRequest>,
) -> Result<Json<ModifyResponse>, AppError> {
    state.trips.get_trip_for_user(&user, id).await?;
    let outcome = state
        .orchestrator
        .modify_plan(&user, id, &body.modification)
        .await?;
    Ok(Json(outcome.into()))
}

async fn history(
    State(state): State<AppState>,
    UserId(user): UserId,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(state.orchestrator.history(&user, query.trip_id)?))
}

async fn clear_history(
    State(state): State<AppState>,
    UserId(user): UserId,
    Query(query): Query<HistoryQuery>,
) -> Result<StatusCode, AppError> {
    state.orchestrator.clear_history(&user, query.trip_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
