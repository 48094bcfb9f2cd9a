use axum::extract::{OriginalUri, Path, State};
use axum::http::Method;
use axum::Json;
use serde_json::Value;

use crate::api::dto::stream_dto::{StreamDetailResponse, StreamListResponse};
use crate::app_state::AppState;
use crate::domain::stream::query::RawQuery;
use crate::errors::AppError;

pub struct StreamController;

impl StreamController {
    pub async fn list(
        State(state): State<AppState>,
        OriginalUri(uri): OriginalUri,
    ) -> Result<Json<StreamListResponse>, AppError> {
        let raw = RawQuery::parse(uri.query().unwrap_or(""));
        state
            .stream_service
            .list_streams(uri.path(), &raw)
            .await
            .map(Json)
    }

    pub async fn detail(
        State(state): State<AppState>,
        Path(id): Path<String>,
        OriginalUri(uri): OriginalUri,
    ) -> Result<Json<StreamDetailResponse>, AppError> {
        let raw = RawQuery::parse(uri.query().unwrap_or(""));
        state
            .stream_service
            .stream_detail(&id, uri.path(), &raw)
            .await
            .map(Json)
    }

    pub async fn schema(State(state): State<AppState>) -> Json<Value> {
        Json(state.stream_service.schema())
    }

    /// The resource is a read-only facade; every mutating method lands here.
    pub async fn reject_write(method: Method, OriginalUri(uri): OriginalUri) -> AppError {
        AppError::MethodNotAllowed(format!("{} {}", method, uri.path()))
    }
}
