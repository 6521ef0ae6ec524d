use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::error;

use crate::error::ProxyError;
use crate::metrics::UPSTREAM_LATENCY;
use crate::models::{ChatReply, ChatRequest, UpstreamChatRequest};
use crate::state::AppState;

const NO_PROMPT_TEXT: &str = "Kein Prompt empfangen.";
const CONNECTION_FAILED_TEXT: &str = "Verbindung zum KI-Dienst fehlgeschlagen.";

pub async fn ai_chat_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    // unreadable bodies are treated like empty ones
    let request: ChatRequest = serde_json::from_slice(&body).unwrap_or_default();

    let Some(prompt) = request.prompt() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "text": NO_PROMPT_TEXT, "error": "Empty prompt" })),
        )
            .into_response();
    };

    let system_instruction = request
        .system_instruction()
        .unwrap_or(&state.upstreams.system_instruction);

    match forward_chat(&state, prompt, system_instruction).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => {
            error!(error = %e, "AI request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "AI request failed",
                    "message": e.to_string(),
                    "text": CONNECTION_FAILED_TEXT,
                })),
            )
                .into_response()
        }
    }
}

async fn forward_chat(state: &AppState, prompt: &str, system_instruction: &str) -> Result<ChatReply, ProxyError> {
    let url = state
        .upstreams
        .ai_url
        .as_deref()
        .ok_or(ProxyError::NotConfigured("AI_UPSTREAM_URL"))?;

    let start = Instant::now();
    let res = state
        .client
        .post(url)
        .json(&UpstreamChatRequest {
            prompt,
            message: prompt,
            system_instruction,
            rag_id: &state.upstreams.rag_id,
            max_results: state.upstreams.max_search_results,
            gateway_id: &state.upstreams.ai_gateway_id,
        })
        .send()
        .await;
    UPSTREAM_LATENCY
        .with_label_values(&["ai"])
        .observe(start.elapsed().as_secs_f64());

    let res = res?;
    if !res.status().is_success() {
        return Err(ProxyError::UpstreamStatus(res.status()));
    }

    let data: Value = res.json().await?;
    Ok(ChatReply::from_upstream(&data))
}
