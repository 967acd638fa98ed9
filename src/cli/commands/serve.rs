//! HTTP chat server.
//!
//! Provides the streaming chat and explanation endpoints, the mock exam
//! endpoint, and catalog/health endpoints.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::context::TurnContext;
use crate::error::VidyaError;
use crate::exam::QuestionGenerator;
use crate::llm::{ChatMessage, WireMessage};
use crate::orchestrator::{Orchestrator, StreamEvent};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, KeepAliveStream, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
struct AppState {
    orchestrator: Arc<Orchestrator>,
    generator: QuestionGenerator,
    settings: Settings,
}

/// Run the HTTP server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Chat) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }
    for warning in preflight::warnings(Operation::Chat) {
        Output::warning(&warning);
    }

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let orchestrator = Arc::new(Orchestrator::from_settings(&settings, prompts.clone())?);
    let generator = QuestionGenerator::new(orchestrator.model(), prompts);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let state = Arc::new(AppState {
        orchestrator,
        generator,
        settings,
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Vidya Tutor Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Chat (SSE)", "POST /send_message");
    Output::kv("Explain (SSE)", "POST /generate_explanation");
    Output::kv("Mock exam", "POST /mock_exam");
    Output::kv("Exams", "GET  /exams");
    Output::kv("Health", "GET  /health");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/exams", get(list_exams))
        .route("/send_message", post(send_message))
        .route("/generate_explanation", post(generate_explanation))
        .route("/mock_exam", post(mock_exam))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SendMessageRequest {
    #[serde(default)]
    chat_history: Vec<WireMessage>,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    exam_type: Option<String>,
}

#[derive(Deserialize)]
struct ExplanationRequest {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    exam_type: String,
}

#[derive(Deserialize)]
struct MockExamRequest {
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    is_initial: bool,
    #[serde(default)]
    exam_type: String,
}

fn default_language() -> String {
    "en-US".to_string()
}

#[derive(Serialize)]
struct ExamInfo {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct CatalogResponse {
    exams: Vec<ExamInfo>,
    languages: Vec<LanguageInfo>,
}

#[derive(Serialize)]
struct LanguageInfo {
    code: String,
    name: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// An error returned as `{"error": ...}` with a status code.
struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }
}

impl From<VidyaError> for ApiError {
    fn from(e: VidyaError) -> Self {
        let status = match e {
            VidyaError::UnknownExam(_) | VidyaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_server_error() {
            error!("Request failed: {}", self.1);
        }
        (self.0, Json(ErrorResponse { error: self.1 })).into_response()
    }
}

type EventStream = Sse<KeepAliveStream<BoxStream<'static, Result<Event, Infallible>>>>;

fn sse(events: impl Stream<Item = StreamEvent> + Send + 'static) -> EventStream {
    let stream = events
        .map(|event| Ok::<Event, Infallible>(Event::default().data(event.data())))
        .boxed();

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Build the explanation request message: the rendered explanation prompt is
/// prepended to the submitted message's text.
fn explanation_message(prompts: &Prompts, ctx: &TurnContext, message: WireMessage) -> ChatMessage {
    let vars = HashMap::from([
        ("language".to_string(), ctx.language.clone()),
        ("exam_name".to_string(), ctx.exam_name.clone()),
    ]);
    let prefix = prompts.render_with_custom(&prompts.explanation.prefix, &vars);

    let mut message = ChatMessage::from(message);
    match &mut message {
        ChatMessage::User { content } => content.prepend_text(&prefix),
        ChatMessage::System { content }
        | ChatMessage::Assistant { content, .. }
        | ChatMessage::Tool { content, .. } => content.insert_str(0, &prefix),
    }
    message
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_exams(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(CatalogResponse {
        exams: state
            .settings
            .exams
            .iter()
            .map(|(id, exam)| ExamInfo {
                id: id.clone(),
                name: exam.name.clone(),
            })
            .collect(),
        languages: state
            .settings
            .languages
            .iter()
            .map(|(code, name)| LanguageInfo {
                code: code.clone(),
                name: name.clone(),
            })
            .collect(),
    })
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<EventStream, ApiError> {
    if req.chat_history.is_empty() {
        return Err(ApiError::bad_request("Chat history required"));
    }

    let ctx = TurnContext::resolve(&state.settings, req.exam_type.as_deref(), Some(&req.language))?;
    info!(
        "Chat turn with {} messages for {} in {}",
        req.chat_history.len(),
        ctx.exam_id,
        ctx.language
    );

    let messages = req.chat_history.into_iter().map(ChatMessage::from).collect();
    Ok(sse(state.orchestrator.stream(messages, ctx)))
}

async fn generate_explanation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExplanationRequest>,
) -> Result<EventStream, ApiError> {
    let message = req
        .message
        .ok_or_else(|| ApiError::bad_request("Message is required and must be an object"))?;

    if !state.settings.exams.contains_key(&req.exam_type) {
        return Err(ApiError::bad_request("Valid exam_type is required"));
    }
    let ctx = TurnContext::resolve(&state.settings, Some(&req.exam_type), Some(&req.language))?;

    let message = explanation_message(state.orchestrator.prompts(), &ctx, message);
    Ok(sse(state.orchestrator.stream(vec![message], ctx)))
}

async fn mock_exam(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MockExamRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.settings.exams.contains_key(&req.exam_type) {
        return Err(ApiError::bad_request("Valid exam_type is required"));
    }

    let question = state
        .generator
        .next_question(&state.settings, &req.exam_type, &req.messages, req.is_initial)
        .await?;
    Ok(Json(question))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::{ContentPart, MessageContent};
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn ctx() -> TurnContext {
        TurnContext::resolve(&Settings::default(), Some("mf_foundation"), Some("mr-IN")).unwrap()
    }

    fn wire(value: Value) -> WireMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_explanation_prefixes_text() {
        let message = explanation_message(
            &Prompts::default(),
            &ctx(),
            wire(json!({"role": "user", "content": "Q: What is NAV? My answer: B"})),
        );
        match message {
            ChatMessage::User { content } => {
                let text = content.text();
                assert!(text.contains("Always respond in Marathi language."));
                assert!(text.ends_with("---\n\nQ: What is NAV? My answer: B"));
            }
            other => panic!("Expected user message, got {:?}", other),
        }
    }

    #[test]
    fn test_explanation_multimodal() {
        let message = explanation_message(
            &Prompts::default(),
            &ctx(),
            wire(json!({"role": "user", "content": [
                {"type": "image_url", "image_url": {"url": "https://example.com/q.png"}}
            ]})),
        );
        match message {
            ChatMessage::User {
                content: MessageContent::Parts(parts),
            } => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(&parts[0], ContentPart::Text { text } if text.contains("Marathi")));
            }
            other => panic!("Expected multimodal user message, got {:?}", other),
        }
    }

    fn state() -> Arc<AppState> {
        let model: Arc<dyn crate::llm::ChatModel> =
            Arc::new(ScriptedModel::new(vec![vec![crate::llm::ModelDelta::text("NAV")]]));
        Arc::new(AppState {
            orchestrator: Arc::new(Orchestrator::new(model.clone(), ToolRegistry::new(), Prompts::default())),
            generator: QuestionGenerator::new(model, Prompts::default()),
            settings: Settings::default(),
        })
    }

    #[tokio::test]
    async fn test_send_message_streams_or_rejects() {
        let empty: SendMessageRequest = serde_json::from_value(json!({"chat_history": []})).unwrap();
        match send_message(State(state()), Json(empty)).await {
            Err(ApiError(status, message)) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Chat history required");
            }
            Ok(_) => panic!("Expected an empty history to be rejected"),
        }

        let req: SendMessageRequest = serde_json::from_value(json!({
            "chat_history": [{"role": "user", "content": "What is NAV?"}],
            "exam_type": "mf_foundation"
        }))
        .unwrap();
        let response = send_message(State(state()), Json(req)).await.ok().unwrap().into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
    }

    #[tokio::test]
    async fn test_explanation_requires_known_exam() {
        let req: ExplanationRequest = serde_json::from_value(json!({
            "message": {"role": "user", "content": "Q1"},
            "exam_type": "nism_xyz"
        }))
        .unwrap();
        let err = generate_explanation(State(state()), Json(req)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1, "Valid exam_type is required");
    }

    #[test]
    fn test_api_error_status() {
        let err: ApiError = VidyaError::UnknownExam("x".into()).into();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        let err: ApiError = VidyaError::Model("down".into()).into();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_request_defaults() {
        let req: SendMessageRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.chat_history.is_empty());
        assert_eq!(req.language, "en-US");

        let req: MockExamRequest = serde_json::from_value(json!({"exam_type": "mf_foundation"})).unwrap();
        assert!(!req.is_initial);
        assert!(req.messages.is_empty());
    }
}
