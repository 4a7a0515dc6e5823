use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use code_exec::{
    supported_languages, CodeExecutionService, ExecutionRequest, ExecutionResult,
    ExecutionStatus, LimitType, ServiceConfig, TierLimits, Verdict, DEFAULT_TIER, PROFILES,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_TIER_HEADER: &str = "x-user-tier";
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    ExecutionError(#[from] code_exec::Error),
    #[error("Server error: {0}")]
    ServerError(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::ExecutionError(code_exec::Error::RateLimited(denied)) => {
                let retry_after = denied.retry_after.as_secs_f64().ceil().max(1.0) as u64;
                let body = json!({
                    "error": denied.to_string(),
                    "limit_type": denied.limit_type,
                    "remaining": denied.remaining,
                    "retry_after": retry_after,
                });
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
            ServerError::ExecutionError(code_exec::Error::Validation(e)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string(), "reason": e.reason() })),
            )
                .into_response(),
            other => {
                error!("{}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Caller identity and tier, as supplied by the fronting auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub identity: String,
    pub tier: String,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };
        Self {
            identity: header(USER_ID_HEADER).unwrap_or(ANONYMOUS).to_string(),
            tier: header(USER_TIER_HEADER)
                .unwrap_or(DEFAULT_TIER)
                .to_ascii_lowercase(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ValidateRequest {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub language: String,
    pub valid: bool,
    pub reason: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock seconds
    pub execution_time: f64,
    pub exit_code: Option<i32>,
    pub classification: Option<ExecutionStatus>,
    pub language: Option<String>,
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            success: result.is_success(),
            classification: result.classification(),
            execution_time: result.execution_time.as_secs_f64(),
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            language: result.language,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    service: CodeExecutionService,
    /// `/languages` body, built once since tool lookup walks `PATH`
    languages: Arc<Value>,
}

/// Builds the service from `config`, starts its rate-limit sweeper and
/// returns the router. Must be called inside a tokio runtime.
pub fn create_app(config: ServiceConfig) -> Result<Router, ServerError> {
    let service = CodeExecutionService::new(config)?;
    service.rate_limiter().spawn_sweeper();

    let state = AppState {
        service,
        languages: Arc::new(language_catalog()),
    };

    let cors = CorsLayer::permissive();

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/languages", get(languages))
        .route("/limits", get(limits))
        .route("/validate", post(validate))
        .route("/execute", post(execute))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(app)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), ServerError> {
    info!("Starting code execution server on {}", addr);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::ServerError(e.to_string()))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::ServerError(e.to_string()))?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

/// Every profile with its commands and whether its tools are installed.
pub fn language_catalog() -> Value {
    let languages: Vec<Value> = PROFILES
        .iter()
        .map(|profile| {
            json!({
                "id": profile.id,
                "name": profile.name,
                "aliases": profile.aliases,
                "extension": profile.extension,
                "compile": profile.compile,
                "run": profile.run,
                "available": profile.is_available(),
            })
        })
        .collect();

    json!({
        "supported": supported_languages(),
        "languages": languages,
    })
}

async fn languages(State(state): State<AppState>) -> Json<Value> {
    Json(state.languages.as_ref().clone())
}

async fn limits(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let caller = Caller::from_headers(&headers);
    let config = state.service.config();
    let tier_limits: TierLimits = state.service.rate_limiter().limits_for(&caller.tier);

    let remaining: Map<String, Value> = LimitType::ALL
        .iter()
        .map(|limit_type| {
            (
                limit_type.to_string(),
                json!(state
                    .service
                    .remaining(&caller.identity, &caller.tier, *limit_type)),
            )
        })
        .collect();

    Json(json!({
        "tier": caller.tier,
        "execution": {
            "default_timeout": config.engine.default_timeout.as_secs_f64(),
            "max_timeout": config.engine.max_timeout.as_secs_f64(),
            "compile_timeout": config.engine.compile_timeout.as_secs_f64(),
            "output_limit": config.engine.output_limit,
            "memory_limit": config.engine.memory_limit,
            "max_memory_limit": config.engine.max_memory_limit,
            "max_source_size": config.validator.max_source_size,
            "max_concurrent_executions": config.max_concurrent_executions,
            "available_slots": state.service.available_slots(),
        },
        "rate_limits": tier_limits,
        "remaining": remaining,
    }))
}

async fn validate(
    State(state): State<AppState>,
    Json(payload): Json<ValidateRequest>,
) -> Json<ValidateResponse> {
    let verdict = Verdict::from(&state.service.validate(&payload.language, &payload.code));
    Json(ValidateResponse {
        language: payload.language,
        valid: verdict.valid,
        reason: verdict.reason.map(str::to_string),
        error: verdict.error,
    })
}

async fn execute(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ExecutionRequest>,
) -> Result<Json<ExecuteResponse>, ServerError> {
    let caller = Caller::from_headers(&headers);

    let result = state
        .service
        .run(&caller.identity, &caller.tier, payload)
        .await?;

    Ok(Json(result.into()))
}
