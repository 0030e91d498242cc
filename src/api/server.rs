//! API Server Module
//!
//! This module implements a JSON-RPC server exposing the batching engine.
//! Every method is a direct pass-through to one engine operation; the
//! server adds parameter decoding and error-code mapping only.

use crate::{
    BatchId, BatchType, BatchUpdate, MembershipId,
    analytics::AnalyticsAggregator,
    config::ApiConfig,
    error::BatchingError,
    ledger::MembershipLedger,
    lifecycle::BatchLifecycleManager,
    policy::DemandPolicyEngine,
};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32000;
const NOT_FOUND: i32 = -32004;
const STATE_CONFLICT: i32 = -32009;

/// Shared application state that is accessible across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<BatchLifecycleManager>,
    pub ledger: Arc<MembershipLedger>,
    pub demand: Arc<DemandPolicyEngine>,
    pub analytics: Arc<AnalyticsAggregator>,
}

/// The main API server struct
pub struct Server {
    config: ApiConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: ApiConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind to the configured address and serve until the process stops
    pub async fn start(self) -> anyhow::Result<()> {
        let app = router(self.state);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Router with the single JSON-RPC endpoint at "/"
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_rpc))
        .with_state(state)
}

/// JSON-RPC 2.0 request structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Value,
}

/// JSON-RPC 2.0 response structure
///
/// Either `result` or `error` is populated, never both.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<BatchingError> for JsonRpcError {
    fn from(err: BatchingError) -> Self {
        let code = match &err {
            BatchingError::Validation(_) => INVALID_PARAMS,
            BatchingError::NotFound { .. } => NOT_FOUND,
            BatchingError::StateConflict(_) => STATE_CONFLICT,
            BatchingError::Catalog(_) | BatchingError::Store(_) => INTERNAL_ERROR,
        };
        if code == INTERNAL_ERROR {
            error!("Request failed: {}", err);
        }
        Self::new(code, err.to_string())
    }
}

type RpcResult = Result<Value, JsonRpcError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchParams {
    batch_id: BatchId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductParams {
    product_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserParams {
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBatchParams {
    product_id: String,
    /// Unknown names fall back to "standard"
    batch_type: String,
    price: f64,
    buyers_required: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinParams {
    batch_id: BatchId,
    user_id: String,
    quantity: u32,
    shipping_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelParams {
    membership_id: MembershipId,
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipParams {
    batch_id: BatchId,
    #[serde(default)]
    tracking_numbers: HashMap<MembershipId, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    batch_id: BatchId,
    updates: BatchUpdate,
}

fn params<T: DeserializeOwned>(value: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(value)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")))
}

fn to_value<T: Serialize>(value: T) -> RpcResult {
    serde_json::to_value(value).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
}

/// Main RPC request handler, routing by method name
async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    info!("Received RPC request: {}", request.method);

    let outcome = dispatch(&state, &request.method, request.params).await;
    if let Err(e) = &outcome {
        warn!("RPC {} failed with {}: {}", request.method, e.code, e.message);
    }

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    };
    Json(JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        result,
        error,
        id: request.id,
    })
}

async fn dispatch(state: &AppState, method: &str, raw: Value) -> RpcResult {
    match method {
        "getBatch" => {
            let p: BatchParams = params(raw)?;
            to_value(state.lifecycle.get_batch(p.batch_id).await?)
        }
        "listBatches" => {
            let p: ProductParams = params(raw)?;
            to_value(state.ledger.list_for_batch_product(&p.product_id).await?)
        }
        "listUserMemberships" => {
            let p: UserParams = params(raw)?;
            to_value(state.ledger.list_for_user(&p.user_id).await?)
        }
        "listBatchMemberships" => {
            let p: BatchParams = params(raw)?;
            to_value(state.ledger.list_for_batch(p.batch_id).await?)
        }
        "createBatch" => {
            let p: CreateBatchParams = params(raw)?;
            let batch_type = BatchType::parse_lenient(&p.batch_type);
            to_value(
                state
                    .lifecycle
                    .create_batch(&p.product_id, batch_type, p.price, p.buyers_required)
                    .await?,
            )
        }
        "joinBatch" => {
            let p: JoinParams = params(raw)?;
            to_value(
                state
                    .ledger
                    .join(p.batch_id, &p.user_id, p.quantity, &p.shipping_address)
                    .await?,
            )
        }
        "cancelMembership" => {
            let p: CancelParams = params(raw)?;
            to_value(state.ledger.cancel(p.membership_id, &p.user_id).await?)
        }
        "processBatch" => {
            let p: BatchParams = params(raw)?;
            to_value(state.lifecycle.process_batch(p.batch_id).await?)
        }
        "markShipped" => {
            let p: ShipParams = params(raw)?;
            to_value(
                state
                    .lifecycle
                    .mark_shipped(p.batch_id, &p.tracking_numbers)
                    .await?,
            )
        }
        "markDelivered" => {
            let p: BatchParams = params(raw)?;
            to_value(state.lifecycle.mark_delivered(p.batch_id).await?)
        }
        "updateBatch" => {
            let p: UpdateParams = params(raw)?;
            to_value(state.lifecycle.update_batch(p.batch_id, p.updates).await?)
        }
        "deactivateBatch" => {
            let p: BatchParams = params(raw)?;
            to_value(state.lifecycle.deactivate(p.batch_id).await?)
        }
        "autoCreateBatches" => {
            let p: ProductParams = params(raw)?;
            to_value(state.demand.auto_create_batches(&p.product_id).await?)
        }
        "getBatchAnalytics" => {
            let p: ProductParams = params(raw)?;
            to_value(state.analytics.compute_batch_analytics(&p.product_id).await?)
        }
        _ => Err(JsonRpcError::new(METHOD_NOT_FOUND, "Method not found")),
    }
}
