use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, warn};

use super::commands::CommandDispatcher;
use super::domain::{Candidate, CandidateVoters, TallyEntry};
use super::store::ElectionStore;
use super::telegram::{Inbound, Update, WebhookReply};
use crate::error::AppError;

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state behind the election routes.
pub struct ElectionApi<S> {
    dispatcher: CommandDispatcher<S>,
    webhook_secret: Option<String>,
}

impl<S> ElectionApi<S>
where
    S: ElectionStore + 'static,
{
    pub fn new(dispatcher: CommandDispatcher<S>, webhook_secret: Option<String>) -> Self {
        Self {
            dispatcher,
            webhook_secret,
        }
    }

    fn secret_matches(&self, headers: &HeaderMap) -> bool {
        match self.webhook_secret.as_deref() {
            None => true,
            Some(expected) => headers
                .get(SECRET_TOKEN_HEADER)
                .is_some_and(|provided| tokens_equal(provided.as_bytes(), expected.as_bytes())),
        }
    }
}

/// Router builder exposing the chat webhook and read-only poll endpoints.
pub fn election_router<S>(api: Arc<ElectionApi<S>>) -> Router
where
    S: ElectionStore + 'static,
{
    Router::new()
        .route("/telegram/webhook", post(webhook_handler::<S>))
        .route("/api/v1/poll/phase", get(phase_handler::<S>))
        .route("/api/v1/poll/candidates", get(candidates_handler::<S>))
        .route("/api/v1/poll/tally", get(tally_handler::<S>))
        .route("/api/v1/poll/voters", get(voters_handler::<S>))
        .with_state(api)
}

/// Compare secrets without stopping at the first differing byte.
fn tokens_equal(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Run store-bound work off the async executor; SQLite calls block.
async fn run_blocking<S, T, F>(api: Arc<ElectionApi<S>>, work: F) -> Result<T, AppError>
where
    S: ElectionStore + 'static,
    T: Send + 'static,
    F: FnOnce(&ElectionApi<S>) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&api))
        .await
        .map_err(|err| {
            error!(error = %err, "election worker task failed");
            AppError::from(err)
        })
}

/// The secret header is checked before the body is parsed, so unauthenticated
/// callers never reach the JSON decoder.
pub(crate) async fn webhook_handler<S>(
    State(api): State<Arc<ElectionApi<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError>
where
    S: ElectionStore + 'static,
{
    if !api.secret_matches(&headers) {
        warn!("webhook call with bad secret token");
        let payload = json!({ "error": "invalid secret token" });
        return Ok((StatusCode::UNAUTHORIZED, Json(payload)).into_response());
    }

    let update: Update = serde_json::from_slice(&body)?;
    let update_id = update.update_id;

    let reply = run_blocking(api, move |api| match update.classify() {
        Inbound::Command { request, target } => api
            .dispatcher
            .dispatch(&request)
            .map(|reply| WebhookReply::render(reply, target)),
        Inbound::MembersJoined(members) => {
            // A lost join event must not make the platform redeliver the update.
            if let Err(err) = api.dispatcher.members_joined(&members) {
                warn!(update_id, error = %err, "failed to record membership event");
            }
            None
        }
        Inbound::Ignored => None,
    })
    .await?;

    Ok(match reply {
        Some(reply) => (StatusCode::OK, Json(reply)).into_response(),
        None => (StatusCode::OK, Json(json!({}))).into_response(),
    })
}

pub(crate) async fn phase_handler<S>(
    State(api): State<Arc<ElectionApi<S>>>,
) -> Result<Json<Value>, AppError>
where
    S: ElectionStore + 'static,
{
    let phase = run_blocking(api, |api| api.dispatcher.engine().phase()).await??;
    Ok(Json(json!({
        "phase": phase,
        "registration_open": phase.is_registration_open(),
        "label": phase.label(),
    })))
}

pub(crate) async fn candidates_handler<S>(
    State(api): State<Arc<ElectionApi<S>>>,
) -> Result<Json<Vec<Candidate>>, AppError>
where
    S: ElectionStore + 'static,
{
    let candidates = run_blocking(api, |api| api.dispatcher.engine().list_candidates()).await??;
    Ok(Json(candidates))
}

pub(crate) async fn tally_handler<S>(
    State(api): State<Arc<ElectionApi<S>>>,
) -> Result<Json<Vec<TallyEntry>>, AppError>
where
    S: ElectionStore + 'static,
{
    let entries = run_blocking(api, |api| api.dispatcher.engine().tally()).await??;
    Ok(Json(entries))
}

pub(crate) async fn voters_handler<S>(
    State(api): State<Arc<ElectionApi<S>>>,
) -> Result<Json<Vec<CandidateVoters>>, AppError>
where
    S: ElectionStore + 'static,
{
    let groups = run_blocking(api, |api| api.dispatcher.engine().voters_by_candidate()).await??;
    Ok(Json(groups))
}
