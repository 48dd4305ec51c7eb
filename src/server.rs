//! HTTP surface — the single webhook endpoint plus a liveness probe.

use std::sync::{Arc, LazyLock};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use regex::Regex;
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::pipeline::types::{Outcome, OriginRole, Stage, TranslationRequest};
use crate::pipeline::RelayPipeline;

/// ISO-639-ish language code, optionally with a region subtag.
static LANG_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,3}(-[A-Za-z]{2})?$").unwrap());

/// Shared state for the relay routes.
#[derive(Clone)]
pub struct RelayState {
    pub pipeline: Arc<RelayPipeline>,
    /// Source language assumed when the webhook omits `from`.
    pub default_source: String,
    /// Target language assumed when the webhook omits `to`.
    pub default_target: String,
}

/// Wire format of the webhook payload. Required fields are optional here
/// so that a missing field yields our own 400, not the extractor's 422.
#[derive(Debug, Deserialize)]
struct TranslateBody {
    text: Option<String>,
    from: Option<String>,
    to: Option<String>,
    ticket_id: Option<String>,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    origin: OriginRole,
}

/// POST /translate
///
/// Runs one webhook event through the relay pipeline. Skips are reported
/// as success with `skipped: true` — a policy decision, not a fault.
async fn translate_handler(
    State(state): State<RelayState>,
    Json(body): Json<TranslateBody>,
) -> impl IntoResponse {
    let (Some(text), Some(ticket_id)) = (body.text, body.ticket_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Text or ticket_id missing"})),
        );
    };
    if text.trim().is_empty() || ticket_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Text or ticket_id missing"})),
        );
    }

    let from = body
        .from
        .unwrap_or_else(|| state.default_source.clone())
        .to_lowercase();
    let to = body
        .to
        .unwrap_or_else(|| state.default_target.clone())
        .to_lowercase();

    for (field, code) in [("from", &from), ("to", &to)] {
        let is_auto = field == "from" && code == "auto";
        if !is_auto && !LANG_CODE.is_match(code) {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": format!("Invalid language code in '{field}': {code}")
                })),
            );
        }
    }

    let request = TranslationRequest::new(text, from, to, ticket_id, body.origin, body.public);

    match state.pipeline.process(request).await {
        Outcome::Skipped { reason } => (
            StatusCode::OK,
            Json(serde_json::json!({
                "skipped": true,
                "reason": reason.as_str(),
            })),
        ),
        Outcome::Posted {
            translated,
            direction,
            comments,
        } => (
            StatusCode::OK,
            Json(serde_json::json!({
                "translated": translated,
                "direction": direction,
                "comments_posted": comments.len(),
            })),
        ),
        Outcome::Failed {
            stage,
            comments_posted,
            cause,
        } => {
            let body = match stage {
                Stage::Translate => serde_json::json!({"error": cause}),
                Stage::TicketWrite => serde_json::json!({
                    "error": cause,
                    "comments_posted": comments_posted,
                }),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
        }
    }
}

/// GET / — liveness probe.
async fn liveness() -> &'static str {
    "Polyglot Relay is running"
}

/// Build the relay router.
pub fn relay_routes(state: RelayState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/translate", post(translate_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
