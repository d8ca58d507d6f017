//! REST API Server for the finance assistant orchestrator
//!
//! Exposes the orchestration graph via HTTP endpoints

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::agent::Orchestrator;
use crate::models::{Attachment, OrchestrationRequest};

/// Statements are scanned PDFs; keep room for a few MB
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Form Parsing
/// =============================

async fn read_form(mut multipart: Multipart) -> Result<OrchestrationRequest, String> {
    let mut question: Option<String> = None;
    let mut attachment: Option<Attachment> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Invalid multipart body: {}", e))?
    {
        let name = field.name().map(str::to_string);

        match name.as_deref() {
            Some("question") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| format!("Invalid question field: {}", e))?;
                question = Some(text);
            }
            Some("pdf_file") => {
                let filename = field.file_name().unwrap_or("statement.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/pdf")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Invalid pdf_file field: {}", e))?;

                if !data.is_empty() {
                    attachment = Some(Attachment::new(filename, content_type, data.to_vec()));
                }
            }
            other => warn!(field = ?other, "Ignoring unknown form field"),
        }
    }

    let question = question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| "Missing required field: question".to_string())?;

    Ok(OrchestrationRequest {
        question,
        attachment,
    })
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Orchestration Endpoint
/// =============================

async fn run_orchestration(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> (StatusCode, Json<ApiResponse>) {
    let request = match read_form(multipart).await {
        Ok(request) => request,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message)));
        }
    };

    info!("Received orchestration request: {}", request.question);

    match state.orchestrator.invoke(request).await {
        Ok(response) => (StatusCode::OK, Json(ApiResponse::success(response))),
        Err(e) => {
            error!(error = %e, "Orchestration failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Orchestration failed".to_string())),
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/orchestrate", post(run_orchestration))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{AssistantClient, DownstreamDispatcher};
    use crate::models::FALLBACK_ANSWER;
    use crate::oracle::{ClassifierOracle, GeminiOracle, PromptRole, ScriptedOracle};
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "orchestrator-test-boundary";

    fn router_with(oracle: ScriptedOracle) -> Router {
        router_with_oracle(Arc::new(oracle))
    }

    fn router_with_oracle(oracle: Arc<dyn ClassifierOracle>) -> Router {
        let client = AssistantClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let dispatcher = Arc::new(DownstreamDispatcher::new(client));
        let orchestrator = Orchestrator::new(oracle, dispatcher, Duration::from_secs(5)).unwrap();
        create_router(Arc::new(orchestrator))
    }

    fn form_request(fields: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        Request::builder()
            .method("POST")
            .uri("/api/v1/orchestrate")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let router = router_with(ScriptedOracle::new());
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_orchestrate_returns_fallback_on_stop() {
        let router = router_with(ScriptedOracle::new().reply(PromptRole::TopicGuardrail, "STOP"));
        let response = router
            .oneshot(form_request(&[("question", "Quiero comprar droga")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["question"], "Quiero comprar droga");
        assert_eq!(body["data"]["response"], FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_orchestrate_requires_question() {
        let router = router_with(ScriptedOracle::new());
        let response = router
            .oneshot(form_request(&[("note", "sin pregunta")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_server_error() {
        let router =
            router_with(ScriptedOracle::new().fail(PromptRole::TopicGuardrail, "unavailable"));
        let response = router
            .oneshot(form_request(&[("question", "tips para ahorrar")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Orchestration failed");
    }

    #[tokio::test]
    async fn test_unreachable_gemini_does_not_leak_api_key() {
        let oracle = GeminiOracle::new(
            "SECRET-KEY-123".to_string(),
            Some("http://127.0.0.1:9/v1beta/models/x:generateContent".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        let router = router_with_oracle(Arc::new(oracle));
        let response = router
            .oneshot(form_request(&[("question", "hola")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8_lossy(&bytes);
        assert!(!body.contains("SECRET-KEY-123"));
        assert!(body.contains("Orchestration failed"));
    }
}
