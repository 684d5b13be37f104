//! HTTP surface over the traceability ledger.
//!
//! Thin JSON layer: every handler parses a request, takes the ledger lock,
//! calls one facade operation, and maps the result. Callers are identified by
//! the `caller` address in each mutating request body; authorization itself
//! lives in the core crate.

use std::{
    env,
    str::FromStr,
    sync::{Arc, RwLock},
};

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use agrotrace_core::{
    Address, AnchorCommit, Batch, BatchStatus, Certificate, Clock, EventType, Hash32,
    LedgerConfig, Organization, Product, RoleSet, TelemetryRecord, TraceError, TraceEvent,
    TraceLedger,
};

const BIND_ADDR_ENV: &str = "AGROTRACE_BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const OWNER_ENV: &str = "AGROTRACE_OWNER";
const CREATE_BATCH_FEE_ENV: &str = "AGROTRACE_CREATE_BATCH_FEE";
const CLOSE_ON_TERMINAL_ENV: &str = "AGROTRACE_CLOSE_ON_TERMINAL";
const MAX_SPLIT_ENV: &str = "AGROTRACE_MAX_SPLIT";

const CODE_BAD_ADDRESS: &str = "BAD_ADDRESS";
const CODE_BAD_HASH: &str = "BAD_HASH";

#[derive(Clone)]
pub struct AppState {
    ledger: Arc<RwLock<TraceLedger>>,
}

impl AppState {
    pub fn new(ledger: TraceLedger) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Builds the ledger from `AGROTRACE_*` environment variables. The owner
    /// address is required; policy knobs fall back to their defaults.
    pub fn from_env() -> Self {
        let owner_hex = env::var(OWNER_ENV)
            .unwrap_or_else(|_| panic!("{} must be set to the owner address", OWNER_ENV));
        let owner = Address::from_str(&owner_hex)
            .unwrap_or_else(|err| panic!("{} is not a valid address: {}", OWNER_ENV, err));

        let mut config = LedgerConfig::default();
        if let Ok(fee) = env::var(CREATE_BATCH_FEE_ENV) {
            config.create_batch_fee = fee
                .parse()
                .unwrap_or_else(|err| panic!("{} is invalid: {}", CREATE_BATCH_FEE_ENV, err));
        }
        if let Ok(flag) = env::var(CLOSE_ON_TERMINAL_ENV) {
            config.close_on_terminal =
                matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(max) = env::var(MAX_SPLIT_ENV) {
            config.max_split = max
                .parse()
                .unwrap_or_else(|err| panic!("{} is invalid: {}", MAX_SPLIT_ENV, err));
        }

        Self::new(TraceLedger::with_components(
            owner,
            config,
            Clock::system(),
        ))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, TraceLedger> {
        self.ledger.read().expect("ledger lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, TraceLedger> {
        self.ledger.write().expect("ledger lock poisoned")
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }
}

impl From<TraceError> for ApiError {
    fn from(err: TraceError) -> Self {
        Self {
            status: StatusCode::from_u16(err.suggested_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
    error_code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(code = self.code, status = %self.status, "rejected request: {}", self.message);
        let body = ErrorResponse {
            error: self.message,
            error_code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

pub async fn serve() {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = app_router(AppState::from_env()).layer(cors);
    let bind_addr = env::var(BIND_ADDR_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    info!(%bind_addr, "starting traceability service");
    let listener = TcpListener::bind(&bind_addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/trace/status", get(get_status))
        .route("/trace/roles", post(set_roles_handler))
        .route("/trace/roles/:addr", get(get_roles))
        .route("/trace/pause", post(pause_handler))
        .route("/trace/unpause", post(unpause_handler))
        .route("/trace/committers", post(add_committer_handler))
        .route("/trace/committers/remove", post(remove_committer_handler))
        .route("/trace/committers/set", post(set_committer_handler))
        .route("/trace/products", post(create_product_handler))
        .route("/trace/products/:id", get(get_product_handler))
        .route("/trace/batches", post(create_batch_handler))
        .route("/trace/batches/merge", post(merge_batches_handler))
        .route("/trace/batches/:id", get(get_batch_handler))
        .route("/trace/batches/:id/events", get(get_batch_events_handler))
        .route("/trace/batches/:id/events", post(record_event_handler))
        .route("/trace/batches/:id/transfer", post(transfer_handler))
        .route("/trace/batches/:id/status", post(update_status_handler))
        .route("/trace/batches/:id/split", post(split_batch_handler))
        .route("/trace/batches/:id/code", post(bind_code_handler))
        .route("/trace/codes/:code/batch", get(batch_by_code_handler))
        .route("/trace/codes/:code/targets", get(targets_by_code_handler))
        .route("/trace/codes/:code/anchors", get(anchors_by_code_handler))
        .route("/trace/anchors", post(commit_root_handler))
        .route("/trace/anchors/:id", get(get_anchor_handler))
        .route("/trace/orgs", post(register_org_handler))
        .route("/trace/orgs/:id", get(get_org_handler))
        .route("/trace/orgs/:id", post(update_org_handler))
        .route("/trace/orgs/by-wallet/:wallet", get(org_by_wallet_handler))
        .route("/trace/certs", post(issue_cert_handler))
        .route("/trace/certs/:id", get(get_cert_handler))
        .route("/trace/certs/:id/revoke", post(revoke_cert_handler))
        .route("/trace/telemetry", post(anchor_telemetry_handler))
        .route("/trace/telemetry/:id", get(get_telemetry_handler))
        .route(
            "/trace/telemetry/by-ref/:ref_type/:ref_id",
            get(telemetry_by_ref_handler),
        )
        .route("/trace/fees", get(get_fees_handler))
        .route("/trace/fees", post(set_fee_handler))
        .route("/trace/fees/withdraw", post(withdraw_fees_handler))
        .with_state(state)
}

fn parse_address(value: &str) -> Result<Address, ApiError> {
    Address::from_str(value)
        .map_err(|err| ApiError::bad_request(CODE_BAD_ADDRESS, format!("invalid address: {err}")))
}

fn parse_hash(value: &str) -> Result<Hash32, ApiError> {
    Hash32::from_str(value)
        .map_err(|err| ApiError::bad_request(CODE_BAD_HASH, format!("invalid digest: {err}")))
}

// ----------------------------------------------------------------------
// Status & access control
// ----------------------------------------------------------------------

#[derive(serde::Serialize)]
struct StatusResponse {
    owner: Address,
    paused: bool,
    total_anchors: u64,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let ledger = state.read();
    Json(StatusResponse {
        owner: ledger.owner(),
        paused: ledger.paused(),
        total_anchors: ledger.total_anchors(),
    })
}

#[derive(serde::Deserialize)]
struct SetRolesRequest {
    caller: Address,
    addr: Address,
    roles: u32,
}

async fn set_roles_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRolesRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .write()
        .set_roles(req.caller, req.addr, RoleSet(req.roles))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Serialize)]
struct RolesResponse {
    addr: Address,
    roles: u32,
}

async fn get_roles(
    State(state): State<AppState>,
    AxumPath(addr): AxumPath<String>,
) -> Result<Json<RolesResponse>, ApiError> {
    let addr = parse_address(&addr)?;
    let roles = state.read().roles_of(addr).bits();
    Ok(Json(RolesResponse { addr, roles }))
}

#[derive(serde::Deserialize)]
struct CallerRequest {
    caller: Address,
}

async fn pause_handler(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().pause(req.caller)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unpause_handler(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().unpause(req.caller)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct CommitterRequest {
    caller: Address,
    addr: Address,
}

async fn add_committer_handler(
    State(state): State<AppState>,
    Json(req): Json<CommitterRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().add_committer(req.caller, req.addr)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_committer_handler(
    State(state): State<AppState>,
    Json(req): Json<CommitterRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().remove_committer(req.caller, req.addr)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_committer_handler(
    State(state): State<AppState>,
    Json(req): Json<CommitterRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().set_committer(req.caller, req.addr)?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Product catalog
// ----------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct CreateProductRequest {
    caller: Address,
    name: String,
    #[serde(default)]
    metadata_uri: String,
}

#[derive(serde::Serialize)]
struct CreatedResponse {
    id: u64,
}

async fn create_product_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state
        .write()
        .create_product(req.caller, &req.name, &req.metadata_uri)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn get_product_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<Product>, ApiError> {
    let ledger = state.read();
    let product = ledger.get_product(id)?;
    Ok(Json(product.clone()))
}

// ----------------------------------------------------------------------
// Batch custody
// ----------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct CreateBatchRequest {
    caller: Address,
    product_id: u64,
    data_hash: String,
    #[serde(default)]
    payment: u128,
}

async fn create_batch_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let data_hash = parse_hash(&req.data_hash)?;
    let id = state
        .write()
        .create_batch_paid(req.caller, req.product_id, data_hash, req.payment)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn get_batch_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<Batch>, ApiError> {
    let ledger = state.read();
    let batch = ledger.get_batch(id)?;
    Ok(Json(batch.clone()))
}

async fn get_batch_events_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<Vec<TraceEvent>>, ApiError> {
    let ledger = state.read();
    let events = ledger.get_batch_events(id)?;
    Ok(Json(events.to_vec()))
}

#[derive(serde::Deserialize)]
struct RecordEventRequest {
    caller: Address,
    event_type: EventType,
    data_hash: String,
    #[serde(default)]
    counterparty: Option<Address>,
}

async fn record_event_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
    Json(req): Json<RecordEventRequest>,
) -> Result<StatusCode, ApiError> {
    let data_hash = parse_hash(&req.data_hash)?;
    state.write().record_trace_event(
        req.caller,
        id,
        req.event_type,
        data_hash,
        req.counterparty,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct TransferRequest {
    caller: Address,
    new_owner: Address,
}

async fn transfer_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
    Json(req): Json<TransferRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .write()
        .transfer_batch_owner(req.caller, id, req.new_owner)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct UpdateStatusRequest {
    caller: Address,
    status: BatchStatus,
}

async fn update_status_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .write()
        .update_batch_status(req.caller, id, req.status)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct SplitRequest {
    caller: Address,
    count: u32,
    data_hash: String,
}

#[derive(serde::Serialize)]
struct SplitResponse {
    children: Vec<u64>,
}

async fn split_batch_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
    Json(req): Json<SplitRequest>,
) -> Result<(StatusCode, Json<SplitResponse>), ApiError> {
    let data_hash = parse_hash(&req.data_hash)?;
    let children = state
        .write()
        .split_batch(req.caller, id, req.count, data_hash)?;
    Ok((StatusCode::CREATED, Json(SplitResponse { children })))
}

#[derive(serde::Deserialize)]
struct MergeRequest {
    caller: Address,
    sources: Vec<u64>,
    product_id: u64,
    data_hash: String,
}

async fn merge_batches_handler(
    State(state): State<AppState>,
    Json(req): Json<MergeRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let data_hash = parse_hash(&req.data_hash)?;
    let id = state
        .write()
        .merge_batches(req.caller, &req.sources, req.product_id, data_hash)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

// ----------------------------------------------------------------------
// Batch codes
// ----------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct BindCodeRequest {
    caller: Address,
    code: String,
}

async fn bind_code_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
    Json(req): Json<BindCodeRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().bind_batch_code(req.caller, id, &req.code)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Serialize)]
struct BatchByCodeResponse {
    batch_id: Option<u64>,
}

async fn batch_by_code_handler(
    State(state): State<AppState>,
    AxumPath(code): AxumPath<String>,
) -> Json<BatchByCodeResponse> {
    Json(BatchByCodeResponse {
        batch_id: state.read().get_batch_id_by_code(&code),
    })
}

#[derive(serde::Serialize)]
struct IdsResponse {
    ids: Vec<u64>,
}

async fn targets_by_code_handler(
    State(state): State<AppState>,
    AxumPath(code): AxumPath<String>,
) -> Json<IdsResponse> {
    Json(IdsResponse {
        ids: state.read().get_batch_ids_by_batch_code(&code),
    })
}

async fn anchors_by_code_handler(
    State(state): State<AppState>,
    AxumPath(code): AxumPath<String>,
) -> Json<IdsResponse> {
    Json(IdsResponse {
        ids: state.read().get_anchor_ids_by_code(&code),
    })
}

// ----------------------------------------------------------------------
// Merkle anchors
// ----------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct CommitRootRequest {
    caller: Address,
    root: String,
    from_event_id: u64,
    to_event_id: u64,
    /// When present, the code is bound to the new anchor atomically.
    #[serde(default)]
    batch_code: Option<String>,
}

async fn commit_root_handler(
    State(state): State<AppState>,
    Json(req): Json<CommitRootRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let root = parse_hash(&req.root)?;
    let mut ledger = state.write();
    let id = match req.batch_code {
        Some(code) => ledger.commit_with_batch_code(
            req.caller,
            root,
            req.from_event_id,
            req.to_event_id,
            &code,
        )?,
        None => ledger.commit_merkle_root(req.caller, root, req.from_event_id, req.to_event_id)?,
    };
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn get_anchor_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<AnchorCommit>, ApiError> {
    let ledger = state.read();
    let anchor = ledger.get_anchor(id)?;
    Ok(Json(anchor.clone()))
}

// ----------------------------------------------------------------------
// Organizations
// ----------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct RegisterOrgRequest {
    caller: Address,
    wallet: Address,
    org_type: u8,
    name: String,
    #[serde(default)]
    metadata_cid: String,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

async fn register_org_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterOrgRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state.write().register_organization(
        req.caller,
        req.wallet,
        req.org_type,
        &req.name,
        &req.metadata_cid,
        req.active,
    )?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn update_org_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
    Json(req): Json<RegisterOrgRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().update_organization(
        req.caller,
        id,
        req.wallet,
        req.org_type,
        &req.name,
        &req.metadata_cid,
        req.active,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_org_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<Organization>, ApiError> {
    let ledger = state.read();
    let org = ledger.get_organization(id)?;
    Ok(Json(org.clone()))
}

async fn org_by_wallet_handler(
    State(state): State<AppState>,
    AxumPath(wallet): AxumPath<String>,
) -> Result<Json<Option<Organization>>, ApiError> {
    let wallet = parse_address(&wallet)?;
    let ledger = state.read();
    Ok(Json(ledger.organization_by_wallet(wallet).cloned()))
}

// ----------------------------------------------------------------------
// Certificates
// ----------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct IssueCertRequest {
    caller: Address,
    subject: String,
    #[serde(default)]
    metadata_cid: String,
    expire_at: u64,
}

async fn issue_cert_handler(
    State(state): State<AppState>,
    Json(req): Json<IssueCertRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let subject = parse_hash(&req.subject)?;
    let id = state
        .write()
        .issue_cert(req.caller, subject, &req.metadata_cid, req.expire_at)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn revoke_cert_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
    Json(req): Json<CallerRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().revoke_cert(req.caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_cert_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<Certificate>, ApiError> {
    let ledger = state.read();
    let cert = ledger.get_cert(id)?;
    Ok(Json(cert.clone()))
}

// ----------------------------------------------------------------------
// Telemetry
// ----------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct AnchorTelemetryRequest {
    caller: Address,
    root: String,
    ref_type: u8,
    ref_id: u64,
    from_ts: u64,
    to_ts: u64,
    #[serde(default)]
    storage_uri: String,
}

async fn anchor_telemetry_handler(
    State(state): State<AppState>,
    Json(req): Json<AnchorTelemetryRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let root = parse_hash(&req.root)?;
    let id = state.write().anchor_telemetry(
        req.caller,
        root,
        req.ref_type,
        req.ref_id,
        req.from_ts,
        req.to_ts,
        &req.storage_uri,
    )?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn get_telemetry_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<TelemetryRecord>, ApiError> {
    let ledger = state.read();
    let record = ledger.get_telemetry(id)?;
    Ok(Json(record.clone()))
}

async fn telemetry_by_ref_handler(
    State(state): State<AppState>,
    AxumPath((ref_type, ref_id)): AxumPath<(u8, u64)>,
) -> Json<Vec<TelemetryRecord>> {
    let ledger = state.read();
    let records = ledger
        .telemetry_by_ref(ref_type, ref_id)
        .into_iter()
        .cloned()
        .collect();
    Json(records)
}

// ----------------------------------------------------------------------
// Fees
// ----------------------------------------------------------------------

#[derive(serde::Serialize)]
struct FeesResponse {
    fee_create_batch: u128,
    total_collected: u128,
    balance: u128,
}

async fn get_fees_handler(State(state): State<AppState>) -> Json<FeesResponse> {
    let ledger = state.read();
    Json(FeesResponse {
        fee_create_batch: ledger.fee_create_batch(),
        total_collected: ledger.total_fee_collected(),
        balance: ledger.fee_balance(),
    })
}

#[derive(serde::Deserialize)]
struct SetFeeRequest {
    caller: Address,
    fee: u128,
}

async fn set_fee_handler(
    State(state): State<AppState>,
    Json(req): Json<SetFeeRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().set_create_batch_fee(req.caller, req.fee)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct WithdrawRequest {
    caller: Address,
    to: Address,
    amount: u128,
}

async fn withdraw_fees_handler(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<StatusCode, ApiError> {
    state.write().withdraw_fees(req.caller, req.to, req.amount)?;
    Ok(StatusCode::NO_CONTENT)
}
