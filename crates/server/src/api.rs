//! JSON API over the orchestrator.
//!
//! - `POST /v1/analyses`       run one analysis and store the strategy
//! - `GET  /v1/analyses`       recent stored strategies
//! - `GET  /v1/analyses/{id}`  one stored strategy

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use switchover_agent::Orchestrator;
use switchover_core::domain::request::AnalysisRequest;
use switchover_core::domain::strategy::SwitchingStrategy;
use switchover_core::errors::{ApplicationError, InterfaceError};
use switchover_db::{StrategyRepository, StrategySummary};

pub const CORRELATION_HEADER: &str = "x-correlation-id";
const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 200;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub strategies: Arc<dyn StrategyRepository>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StrategyListItem {
    pub id: Uuid,
    pub industry: String,
    pub competitor: String,
    pub incomplete: bool,
    pub created_at: String,
}

impl From<StrategySummary> for StrategyListItem {
    fn from(summary: StrategySummary) -> Self {
        Self {
            id: summary.id,
            industry: summary.industry,
            competitor: summary.competitor,
            incomplete: summary.incomplete,
            created_at: summary.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
    pub correlation_id: String,
}

/// Interface error rendered as a JSON response with a user-safe message.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            InterfaceError::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };
        let body = ErrorBody {
            error: code,
            message: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/analyses", post(create_analysis).get(list_analyses))
        .route("/v1/analyses/{id}", get(get_analysis))
        .with_state(state)
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}

async fn create_analysis(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<SwitchingStrategy>, ApiError> {
    let correlation_id = correlation_id(&headers);

    let strategy = match state.orchestrator.analyze(&request).await {
        Ok(strategy) => strategy,
        Err(analysis_error) => {
            warn!(
                event_name = "api.analysis.rejected",
                correlation_id = %correlation_id,
                industry = %request.industry,
                error = %analysis_error,
                "analysis request failed"
            );
            let mapped = ApplicationError::from(analysis_error).into_interface(correlation_id);
            return Err(ApiError(mapped));
        }
    };

    if let Err(save_error) = state.strategies.save(&strategy).await {
        error!(
            event_name = "api.analysis.persist_failed",
            correlation_id = %correlation_id,
            analysis_id = %strategy.analysis_id,
            error = %save_error,
            "strategy could not be stored; returning it unsaved"
        );
    }

    info!(
        event_name = "api.analysis.completed",
        correlation_id = %correlation_id,
        analysis_id = %strategy.analysis_id,
        incomplete = strategy.incomplete,
        "analysis served"
    );
    Ok(Json(strategy))
}

async fn get_analysis(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SwitchingStrategy>, ApiError> {
    let correlation_id = correlation_id(&headers);

    match state.strategies.find(id).await {
        Ok(Some(strategy)) => Ok(Json(strategy)),
        Ok(None) => Err(ApiError(InterfaceError::NotFound {
            message: format!("no stored analysis `{id}`"),
            correlation_id,
        })),
        Err(repository_error) => {
            error!(
                event_name = "api.analysis.lookup_failed",
                correlation_id = %correlation_id,
                analysis_id = %id,
                error = %repository_error,
                "stored analysis lookup failed"
            );
            let mapped = ApplicationError::Persistence(repository_error.to_string())
                .into_interface(correlation_id);
            Err(ApiError(mapped))
        }
    }
}

async fn list_analyses(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StrategyListItem>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    match state.strategies.list_recent(limit).await {
        Ok(summaries) => Ok(Json(summaries.into_iter().map(StrategyListItem::from).collect())),
        Err(repository_error) => {
            let correlation_id = correlation_id(&headers);
            error!(
                event_name = "api.analysis.list_failed",
                correlation_id = %correlation_id,
                error = %repository_error,
                "stored analysis listing failed"
            );
            let mapped = ApplicationError::Persistence(repository_error.to_string())
                .into_interface(correlation_id);
            Err(ApiError(mapped))
        }
    }
}
