//! API Routes
//!
//! HTTP endpoint definitions.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::{
    Aggregate, PaymentProvider, RechargeStatus, Wallet, WalletLedgerEntry, WalletRecharge,
};
use crate::error::AppError;
use crate::gateway::PaymentGatewayRegistry;
use crate::handlers::{
    CompleteRechargeCommand, CompleteRechargeHandler, DeactivateWalletCommand,
    DeactivateWalletHandler, PayLectureCommand, PayLectureHandler, ReactivateWalletCommand,
    ReactivateWalletHandler, RechargeWalletCommand, RechargeWalletHandler,
};
use crate::store::{RechargeStore, WalletStore};

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub gateways: Arc<PaymentGatewayRegistry>,
    /// Currency assumed when a recharge request does not name one
    pub default_currency: String,
}

// =========================================================================
// Request/Response types
// =========================================================================

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl PageQuery {
    /// Normalized (limit, offset) pair for the store
    fn bounds(&self) -> (i64, i64) {
        let page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        let page = self.page.max(1);
        (page_size, (page - 1) * page_size)
    }
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Wallet> for WalletResponse {
    fn from(wallet: &Wallet) -> Self {
        Self {
            id: wallet.id(),
            student_id: wallet.student_id(),
            balance: wallet.balance().amount(),
            currency: wallet.currency().to_string(),
            is_active: wallet.is_active(),
            created_at: wallet.created_at(),
            updated_at: wallet.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WalletListResponse {
    pub wallets: Vec<WalletResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub entry_type: String,
    pub source: String,
    pub reference_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&WalletLedgerEntry> for LedgerEntryResponse {
    fn from(entry: &WalletLedgerEntry) -> Self {
        Self {
            id: entry.id(),
            wallet_id: entry.wallet_id(),
            amount: entry.amount().amount(),
            currency: entry.amount().currency().to_string(),
            entry_type: entry.entry_type().as_str().to_string(),
            source: entry.source().as_str().to_string(),
            reference_id: entry.reference_id(),
            created_at: entry.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub wallet_id: Uuid,
    pub entries: Vec<LedgerEntryResponse>,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Deserialize)]
pub struct RechargeRequest {
    pub amount: Decimal,
    /// Falls back to the platform default currency when omitted
    #[serde(default)]
    pub currency: Option<String>,
    pub payment_provider: String,
    pub callback_url: String,
}

#[derive(Debug, Serialize)]
pub struct RechargeResponse {
    pub recharge_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: RechargeStatus,
    pub payment_provider: PaymentProvider,
    pub provider_reference_id: String,
    pub client_payment_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RechargeDetailResponse {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: RechargeStatus,
    pub payment_provider: PaymentProvider,
    pub provider_reference_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&WalletRecharge> for RechargeDetailResponse {
    fn from(recharge: &WalletRecharge) -> Self {
        Self {
            id: recharge.id(),
            wallet_id: recharge.wallet_id(),
            amount: recharge.amount().amount(),
            currency: recharge.amount().currency().to_string(),
            status: recharge.status(),
            payment_provider: recharge.payment_provider(),
            provider_reference_id: recharge.provider_reference_id().to_string(),
            created_at: recharge.created_at(),
            completed_at: recharge.completed_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingRechargesResponse {
    pub wallet_id: Uuid,
    pub recharges: Vec<RechargeDetailResponse>,
}

#[derive(Debug, Serialize)]
pub struct TotalRechargedResponse {
    pub wallet_id: Uuid,
    pub total: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub wallet_id: Uuid,
    pub student_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub entry_id: Uuid,
    pub wallet_id: Uuid,
    pub lecture_id: Uuid,
    pub amount: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WalletStatusResponse {
    pub wallet_id: Uuid,
    pub is_active: bool,
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    /// Whether the signal moved a recharge to a terminal state
    pub applied: bool,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Wallet queries
        .route("/wallets", get(list_wallets))
        .route("/wallets/:wallet_id", get(get_wallet))
        .route("/students/:student_id/wallet", get(get_student_wallet))
        .route("/wallets/:wallet_id/ledger-entries", get(get_ledger))
        // Recharge queries
        .route(
            "/wallets/:wallet_id/recharges/pending",
            get(get_pending_recharges),
        )
        .route(
            "/wallets/:wallet_id/recharges/total",
            get(get_total_recharged),
        )
        // Commands
        .route("/wallets/:wallet_id/recharges", post(issue_recharge))
        .route("/lectures/:lecture_id/purchases/wallet", post(purchase_lecture))
        .route("/wallets/:wallet_id/deactivate", patch(deactivate_wallet))
        .route("/wallets/:wallet_id/reactivate", patch(reactivate_wallet))
        // Provider callbacks
        .route("/webhooks/:provider", post(handle_webhook))
}

// =========================================================================
// GET /wallets
// =========================================================================

/// List wallets, newest first
async fn list_wallets(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<WalletListResponse>, AppError> {
    let wallets = WalletStore::new(state.pool.clone());
    let (page_size, offset) = query.bounds();

    let total = wallets.count().await?;
    let page = wallets.list_page(page_size, offset).await?;

    Ok(Json(WalletListResponse {
        wallets: page.iter().map(WalletResponse::from).collect(),
        total,
        page: query.page.max(1),
        page_size,
    }))
}

// =========================================================================
// GET /wallets/:wallet_id
// =========================================================================

/// Get wallet by ID
async fn get_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = WalletStore::new(state.pool.clone())
        .get(wallet_id)
        .await?
        .ok_or_else(|| AppError::WalletNotFound(wallet_id.to_string()))?;

    Ok(Json(WalletResponse::from(&wallet)))
}

// =========================================================================
// GET /students/:student_id/wallet
// =========================================================================

/// Get the wallet owned by a student
async fn get_student_wallet(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = WalletStore::new(state.pool.clone())
        .get_by_student(student_id)
        .await?
        .ok_or_else(|| AppError::WalletNotFound(format!("student {student_id}")))?;

    Ok(Json(WalletResponse::from(&wallet)))
}

// =========================================================================
// GET /wallets/:wallet_id/ledger-entries
// =========================================================================

/// Page through a wallet's ledger, newest first
async fn get_ledger(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<LedgerResponse>, AppError> {
    let wallets = WalletStore::new(state.pool.clone());

    if wallets.get(wallet_id).await?.is_none() {
        return Err(AppError::WalletNotFound(wallet_id.to_string()));
    }

    let (page_size, offset) = query.bounds();
    let entries = wallets.ledger_page(wallet_id, page_size, offset).await?;

    Ok(Json(LedgerResponse {
        wallet_id,
        entries: entries.iter().map(LedgerEntryResponse::from).collect(),
        page: query.page.max(1),
        page_size,
    }))
}

// =========================================================================
// GET /wallets/:wallet_id/recharges/pending
// =========================================================================

/// Pending recharges for a wallet; the reconciliation view for sessions
/// whose provider signal never arrived
async fn get_pending_recharges(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<PendingRechargesResponse>, AppError> {
    if WalletStore::new(state.pool.clone())
        .get(wallet_id)
        .await?
        .is_none()
    {
        return Err(AppError::WalletNotFound(wallet_id.to_string()));
    }

    let recharges = RechargeStore::new(state.pool.clone())
        .pending_by_wallet(wallet_id)
        .await?;

    Ok(Json(PendingRechargesResponse {
        wallet_id,
        recharges: recharges.iter().map(RechargeDetailResponse::from).collect(),
    }))
}

// =========================================================================
// GET /wallets/:wallet_id/recharges/total
// =========================================================================

/// Total amount ever recharged into a wallet (completed recharges only)
async fn get_total_recharged(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<TotalRechargedResponse>, AppError> {
    if WalletStore::new(state.pool.clone())
        .get(wallet_id)
        .await?
        .is_none()
    {
        return Err(AppError::WalletNotFound(wallet_id.to_string()));
    }

    let total = RechargeStore::new(state.pool.clone())
        .total_recharged(wallet_id)
        .await?;

    Ok(Json(TotalRechargedResponse { wallet_id, total }))
}

// =========================================================================
// POST /wallets/:wallet_id/recharges
// =========================================================================

/// Issue a recharge: a pending recharge plus a provider checkout session
/// the client pays against
async fn issue_recharge(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Json(request): Json<RechargeRequest>,
) -> Result<(StatusCode, Json<RechargeResponse>), AppError> {
    let handler = RechargeWalletHandler::new(state.pool.clone(), state.gateways.clone());

    let currency = request
        .currency
        .unwrap_or_else(|| state.default_currency.clone());
    let command =
        RechargeWalletCommand::new(wallet_id, request.amount, currency, request.payment_provider)
            .with_callback_url(request.callback_url);

    let result = handler.execute(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(RechargeResponse {
            recharge_id: result.recharge_id,
            wallet_id: result.wallet_id,
            amount: result.amount,
            currency: result.currency,
            status: result.status,
            payment_provider: result.payment_provider,
            provider_reference_id: result.provider_reference_id,
            client_payment_token: result.client_payment_token,
        }),
    ))
}

// =========================================================================
// POST /lectures/:lecture_id/purchases/wallet
// =========================================================================

/// Pay for a lecture from the wallet balance
async fn purchase_lecture(
    State(state): State<AppState>,
    Path(lecture_id): Path<Uuid>,
    Json(request): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let handler = PayLectureHandler::new(state.pool.clone());

    let command = PayLectureCommand::new(
        request.wallet_id,
        request.student_id,
        lecture_id,
        request.amount,
    );

    let result = handler.execute(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            entry_id: result.entry_id,
            wallet_id: result.wallet_id,
            lecture_id: result.lecture_id,
            amount: result.amount,
            balance: result.balance,
        }),
    ))
}

// =========================================================================
// PATCH /wallets/:wallet_id/deactivate
// =========================================================================

/// Freeze a wallet
async fn deactivate_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<WalletStatusResponse>, AppError> {
    let handler = DeactivateWalletHandler::new(state.pool.clone());

    let result = handler
        .execute(DeactivateWalletCommand::new(wallet_id))
        .await?;

    Ok(Json(WalletStatusResponse {
        wallet_id: result.wallet_id,
        is_active: result.is_active,
        changed: result.changed,
    }))
}

// =========================================================================
// PATCH /wallets/:wallet_id/reactivate
// =========================================================================

/// Unfreeze a wallet
async fn reactivate_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<WalletStatusResponse>, AppError> {
    let handler = ReactivateWalletHandler::new(state.pool.clone());

    let result = handler
        .execute(ReactivateWalletCommand::new(wallet_id))
        .await?;

    Ok(Json(WalletStatusResponse {
        wallet_id: result.wallet_id,
        is_active: result.is_active,
        changed: result.changed,
    }))
}

// =========================================================================
// POST /webhooks/:provider
// =========================================================================

/// Provider webhook intake. The raw body goes to the gateway adapter for
/// authenticity checks before anything is interpreted.
async fn handle_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckResponse>, AppError> {
    let provider_tag = provider;
    let provider = provider_tag
        .parse::<PaymentProvider>()
        .map_err(|_| AppError::UnsupportedProvider(provider_tag.clone()))?;
    let gateway = state.gateways.resolve(provider)?;

    let notification = gateway.parse_webhook(&body, &headers);
    if !notification.is_valid {
        tracing::warn!(provider = %provider, "Rejected webhook with bad authenticity proof");
        return Err(AppError::InvalidWebhookSignature);
    }

    // A non-terminal notification is acknowledged without touching state
    if notification.status == RechargeStatus::Pending {
        tracing::debug!(provider = %provider, "Webhook acknowledged, no terminal outcome");
        return Ok(Json(WebhookAckResponse {
            received: true,
            applied: false,
        }));
    }

    let handler = CompleteRechargeHandler::new(state.pool.clone());

    let command =
        CompleteRechargeCommand::new(notification.provider_reference_id, notification.status);
    let command = if let Some(amount) = notification.amount {
        command.with_amount(amount)
    } else {
        command
    };

    let result = handler.execute(command).await?;

    Ok(Json(WebhookAckResponse {
        received: true,
        applied: result.applied,
    }))
}
