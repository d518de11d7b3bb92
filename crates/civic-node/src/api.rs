use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use civic_core::constants::BLOCKS_PER_BATCH;
use civic_core::{
    Amount, Audit, Block, BlockFilter, Ledger, LedgerError, Metadata, Stats, Transaction,
    TransactionType, VerificationRecord,
};
use civic_storage::SledStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::constants::DEFAULT_VERIFICATION_LIMIT;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) ledger: Arc<Ledger<SledStore>>,
}

pub(crate) fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chain/head", get(chain_head))
        .route("/chain/verify", post(verify_chain))
        .route("/chain/verifications", get(list_verifications))
        .route("/blocks", get(list_blocks).post(submit_transaction))
        .route("/blocks/{index}", get(get_block))
        .route("/stats", get(stats))
        .route("/transaction-ids", post(new_transaction_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// JSON error body `{"error": "..."}` with a status derived from the failure.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidInput(_) | LedgerError::InvalidDifficulty { .. } => StatusCode::BAD_REQUEST,
        LedgerError::StoreAppendConflict(_) => StatusCode::CONFLICT,
        LedgerError::MiningExhausted { .. } | LedgerError::MiningCancelled => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!(error = %err, "ledger task failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Mining and full-chain scans are CPU bound; keep them off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> civic_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Head {
    index: Option<u64>,
    hash: Option<String>,
    difficulty: u32,
}

async fn chain_head(State(state): State<AppState>) -> Result<Json<Head>, ApiError> {
    let tip = state.ledger.tip()?;
    Ok(Json(Head {
        index: tip.as_ref().map(|b| b.index),
        hash: tip.as_ref().map(Block::hash_hex),
        difficulty: state.ledger.difficulty().get(),
    }))
}

/// Body of `POST /blocks`. A missing `transactionId` is generated.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitTransaction {
    #[serde(default)]
    transaction_id: Option<String>,
    user_id: String,
    #[serde(rename = "type")]
    kind: TransactionType,
    amount: Amount,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    campaign_id: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

async fn submit_transaction(
    State(state): State<AppState>,
    payload: Result<Json<SubmitTransaction>, JsonRejection>,
) -> Result<(StatusCode, Json<Block>), ApiError> {
    let Json(body) = payload?;
    let transaction_id = body
        .transaction_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| state.ledger.generate_transaction_id());
    let mut data = Transaction::new(transaction_id, body.user_id, body.kind, body.amount);
    data.category = body.category;
    data.campaign_id = body.campaign_id;
    data.metadata = body.metadata;

    let ledger = Arc::clone(&state.ledger);
    let block = run_blocking(move || ledger.create_and_append_block(data)).await?;
    Ok((StatusCode::CREATED, Json(block)))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BlocksQuery {
    limit: Option<usize>,
    search: Option<String>,
    #[serde(rename = "type")]
    kind: Option<TransactionType>,
}

async fn list_blocks(
    State(state): State<AppState>,
    Query(query): Query<BlocksQuery>,
) -> Result<Json<Vec<Block>>, ApiError> {
    let limit = query.limit.unwrap_or(BLOCKS_PER_BATCH);
    let filter = BlockFilter {
        search: query.search,
        kind: query.kind,
    };
    let ledger = Arc::clone(&state.ledger);
    let blocks = run_blocking(move || ledger.search_blocks(&filter, limit)).await?;
    Ok(Json(blocks))
}

async fn get_block(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    match state.ledger.block(index)? {
        Some(block) => Ok(Json(block)),
        None => Err(ApiError::not_found(format!("block {index} not found"))),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyParams {
    verified_by: Option<String>,
}

async fn verify_chain(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<Audit>, ApiError> {
    let ledger = Arc::clone(&state.ledger);
    let audit = run_blocking(move || ledger.audit_chain(params.verified_by.as_deref())).await?;
    Ok(Json(audit))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LimitParams {
    limit: Option<usize>,
}

async fn list_verifications(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<VerificationRecord>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_VERIFICATION_LIMIT);
    Ok(Json(state.ledger.verifications(limit)?))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Stats>, ApiError> {
    let ledger = Arc::clone(&state.ledger);
    Ok(Json(run_blocking(move || ledger.stats()).await?))
}

async fn new_transaction_id(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "transactionId": state.ledger.generate_transaction_id() }))
}
