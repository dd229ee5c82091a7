// src/web.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::backend::BackendError;
use crate::engine::Reconciler;
use crate::error::SyncError;
use crate::models::User;
use crate::snapshot::Snapshot;

/// Ошибка синхронизации как HTTP-ответ
pub struct ApiError(SyncError);

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SyncError::Identity { .. } | SyncError::Validation { .. } => StatusCode::BAD_REQUEST,
            SyncError::Backend(BackendError::NotFound(_) | BackendError::NotOrgUnit(_)) => {
                StatusCode::NOT_FOUND
            }
            SyncError::Backend(BackendError::AlreadyExists(_)) => StatusCode::CONFLICT,
            SyncError::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, "Directory request failed");
        }
        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string()
            })),
        )
            .into_response()
    }
}

async fn get_user(
    Path(identity): Path<String>,
    State(engine): State<Arc<Reconciler>>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = engine.pull_user_by_identity(&identity).await?;
    Ok(Json(snapshot))
}

/// Push снимка из тела запроса.
///
/// `baseline` принимается как последнее наблюдавшееся членство: клиент
/// возвращает то, что получил от GET. У ещё не созданного пользователя
/// (нулевой `object_guid`) базовая линия должна быть пустой.
async fn push_user(
    State(engine): State<Arc<Reconciler>>,
    Json(mut snapshot): Json<Snapshot<User>>,
) -> Result<impl IntoResponse, ApiError> {
    if !snapshot.desired.base.is_materialized() && !snapshot.baseline().is_empty() {
        return Err(SyncError::Validation {
            field: "baseline",
            reason: "must be empty for a user without object_guid",
        }
        .into());
    }
    engine.push_user(&mut snapshot).await?;
    info!(name = %snapshot.desired.base.name, "User pushed via API");
    Ok(Json(snapshot))
}

async fn get_group(
    Path(identity): Path<String>,
    State(engine): State<Arc<Reconciler>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(engine.pull_group_by_identity(&identity).await?))
}

async fn get_org_unit(
    Path(identity): Path<String>,
    State(engine): State<Arc<Reconciler>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(engine.pull_org_unit_by_identity(&identity).await?))
}

async fn get_object(
    Path(identity): Path<String>,
    State(engine): State<Arc<Reconciler>>,
) -> Result<impl IntoResponse, ApiError> {
    let object = engine
        .backend()
        .fetch_object(&identity)
        .await
        .map_err(SyncError::from)?;
    Ok(Json(object))
}

/// Маршруты REST API
pub fn create_router(engine: Arc<Reconciler>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/users", put(push_user))
        .route("/api/users/:identity", get(get_user))
        .route("/api/groups/:identity", get(get_group))
        .route("/api/ous/:identity", get(get_org_unit))
        .route("/api/objects/:identity", get(get_object))
        .with_state(engine)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

pub async fn run_web_server(
    engine: Arc<Reconciler>,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(engine);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("🌐 Web API запущен на http://{}", addr);
    info!(addr, "Web API started");

    axum::serve(listener, app).await?;
    Ok(())
}
