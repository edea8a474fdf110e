//! Request handlers and wire DTOs.
//!
//! Wire field names use camelCase (`userName` etc.) to match what the
//! frontend sends.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::history::Message;
use crate::server::AppState;

const MAX_MESSAGE_CHARS: usize = 1000;
const MAX_USERNAME_CHARS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(rename = "userName")]
    pub user_name: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub is_crisis: bool,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    #[serde(rename = "userName")]
    pub user_name: String,
    pub messages: Vec<Message>,
    pub total_messages: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub messages_cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    #[serde(rename = "userName")]
    pub user_name: String,
    pub export_date: DateTime<Utc>,
    pub message_count: usize,
    pub messages: Vec<Message>,
}

/// Error wrapper that maps the chat taxonomy onto HTTP statuses.
pub struct ApiError(ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            ChatError::InvalidRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            ChatError::UpstreamBusy => (StatusCode::TOO_MANY_REQUESTS, self.0.to_string()),
            ChatError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "The AI service could not process this message".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

/// Trim and bound-check an inbound chat request.
fn validate(request: &ChatRequest) -> Result<(String, String), ChatError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ChatError::InvalidRequest(
            "message cannot be empty".to_string(),
        ));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::InvalidRequest(format!(
            "message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let user = request.user_name.trim();
    if user.is_empty() {
        return Err(ChatError::InvalidRequest(
            "userName cannot be empty".to_string(),
        ));
    }
    if user.chars().count() > MAX_USERNAME_CHARS {
        return Err(ChatError::InvalidRequest(format!(
            "userName exceeds {MAX_USERNAME_CHARS} characters"
        )));
    }
    if !user
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(ChatError::InvalidRequest(
            "userName may only contain letters, numbers, spaces, hyphens, underscores".to_string(),
        ));
    }

    Ok((user.to_string(), message.to_string()))
}

pub async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.session.stats().await;
    Json(serde_json::json!({
        "message": "Wellspring API is running",
        "status": "healthy",
        "model": state.session.model(),
        "active_users": stats.active_users,
        "max_users": state.limits.max_users,
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.session.stats().await;
    Json(serde_json::json!({
        "status": "ok",
        "model_name": state.session.model(),
        "conversations_active": stats.active_users,
        "timestamp": Utc::now(),
    }))
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let (user, message) = validate(&request)?;
    tracing::info!(user, chars = message.len(), "Inbound chat message");

    let reply = state.session.respond(&user, &message).await?;

    Ok(Json(ChatResponse {
        response: reply.message.content,
        timestamp: reply.message.timestamp,
        is_crisis: reply.is_crisis,
        model: state.session.model().to_string(),
    }))
}

pub async fn history(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Json<HistoryResponse> {
    let messages = state.session.history(&user).await;
    Json(HistoryResponse {
        total_messages: messages.len(),
        user_name: user,
        messages,
    })
}

pub async fn clear(State(state): State<AppState>, Path(user): Path<String>) -> Json<ClearResponse> {
    let removed = state.session.clear(&user).await;
    let message = if removed > 0 {
        format!("Conversation history cleared for {user}")
    } else {
        format!("No conversation history found for {user}")
    };
    Json(ClearResponse {
        message,
        messages_cleared: removed,
    })
}

pub async fn export(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<ExportResponse>, Response> {
    match state.session.export(&user).await {
        Ok(messages) => Ok(Json(ExportResponse {
            user_name: user,
            export_date: Utc::now(),
            message_count: messages.len(),
            messages,
        })),
        Err(e) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "detail": e.to_string() })),
        )
            .into_response()),
    }
}

pub async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.session.stats().await;
    Json(serde_json::json!({
        "active_conversations": stats.active_users,
        "total_messages": stats.total_messages,
        "max_users": state.limits.max_users,
        "max_messages_per_user": state.limits.max_messages_per_user,
        "model": state.session.model(),
        "timestamp": Utc::now(),
    }))
}
