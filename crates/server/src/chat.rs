use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use poolchat_agent::Coordinator;
use poolchat_core::domain::query::{Query, SessionId};
use poolchat_core::errors::{ApplicationError, InterfaceError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    pub coordinator: Arc<Coordinator>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new().route("/api/chat", post(chat)).with_state(ChatState { coordinator })
}

pub async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    let request_id = Uuid::new_v4().to_string();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(
                event_name = "ingress.http.chat_rejected",
                correlation_id = %request_id,
                error = %rejection,
                "chat request body was not valid json"
            );
            return Err(bad_request(
                ApplicationError::InvalidRequest(rejection.body_text()),
                &request_id,
            ));
        }
    };

    let Some(message) = request.message.filter(|message| !message.trim().is_empty()) else {
        return Err(bad_request(
            ApplicationError::InvalidRequest("message is required".to_string()),
            &request_id,
        ));
    };
    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("api:{request_id}"));

    info!(
        event_name = "ingress.http.chat_received",
        correlation_id = %request_id,
        session_id = %session_id,
        "chat request received"
    );
    let query = Query::new(SessionId::new(session_id.clone()), message);
    let reply = state.coordinator.handle(query).await;

    Ok(Json(ChatResponse {
        response: reply.text,
        session_id,
        correlation_id: reply.correlation_id,
    }))
}

fn bad_request(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ChatError>) {
    let mapped = error.into_interface(correlation_id);
    let status = match mapped {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ChatError {
            error: mapped.user_message().to_string(),
            correlation_id: mapped.correlation_id().to_string(),
        }),
    )
}
