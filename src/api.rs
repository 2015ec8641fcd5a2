//! REST API server for the chat relay
//!
//! Exposes the chat endpoint, history lookup and health check, and serves the
//! prebuilt widget bundle for every other path.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::conversational::{ChatReply, PromptAssembler};
use crate::error::ChatError;
use crate::memory::ConversationStore;
use crate::models::{ChatOptions, Turn};
use crate::Result;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: String,
    #[serde(default)]
    pub config: Option<ChatOptions>,
}

impl ChatRequest {
    fn validate(&self) -> Result<()> {
        if self.message.is_empty() {
            return Err(ChatError::Validation("message is required".into()));
        }
        if self.conversation_id.is_empty() {
            return Err(ChatError::Validation("conversationId is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation: Vec<Turn>,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub assembler: Arc<PromptAssembler>,
}

impl ApiState {
    pub fn new(assembler: PromptAssembler) -> Self {
        Self {
            assembler: Arc::new(assembler),
        }
    }

    fn store(&self) -> &ConversationStore {
        self.assembler.store()
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "conversations": state.store().conversation_count().await,
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>> {
    let Json(req) = payload.map_err(rejection_error)?;
    req.validate()?;

    let span = info_span!(
        "chat",
        request_id = %Uuid::new_v4(),
        conversation_id = %req.conversation_id
    );

    async move {
        info!(message_chars = req.message.len(), "Received chat request");

        let options = req.config.unwrap_or_default();
        let reply = state
            .assembler
            .respond(&req.conversation_id, &req.message, &options)
            .await?;

        Ok::<_, ChatError>(Json(reply))
    }
    .instrument(span)
    .await
}

/// Body-size and content-type rejections keep their own status codes
fn rejection_error(rejection: JsonRejection) -> ChatError {
    let detail = rejection.body_text();
    match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ChatError::PayloadTooLarge(detail),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => ChatError::UnsupportedMediaType(detail),
        _ => ChatError::Validation(detail),
    }
}

/// =============================
/// History Endpoint
/// =============================

async fn conversation_handler(
    State(state): State<ApiState>,
    Path(conversation_id): Path<String>,
) -> Json<ConversationResponse> {
    let conversation = state.store().get(&conversation_id).await;
    Json(ConversationResponse { conversation })
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState, static_dir: Option<&FsPath>) -> Router {
    let router = Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/conversation/:id", get(conversation_handler))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            router.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    bind_address: &str,
    static_dir: &FsPath,
) -> Result<()> {
    let static_dir = if static_dir.is_dir() {
        info!("Serving static assets from {}", static_dir.display());
        Some(static_dir)
    } else {
        warn!(
            "Static asset directory {} not found, serving API only",
            static_dir.display()
        );
        None
    };

    let router = create_router(state, static_dir);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    info!("API Server listening on http://{}", bind_address);

    axum::serve(listener, router).await?;

    Ok(())
}
