use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::{TransactionEnvelope, TransactionListEnvelope};
use crate::domain::{Amount, NewTransaction, TxStatus, TxType};
use crate::error::AppError;
use crate::middleware::auth::authorize_status_override;
use crate::service::StatusOverride;
use crate::store::{Page, TransactionFilter};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionPayload {
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub tx_hash: Option<String>,
    pub amount: Option<Amount>,
    pub wallet_address: Option<String>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: String,
    pub details: Option<String>,
    pub tx_hash: Option<String>,
    pub wallet_address: Option<String>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub campaign_id: Option<String>,
    pub user_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let tx_type = payload
        .tx_type
        .as_deref()
        .map(str::parse::<TxType>)
        .transpose()
        .map_err(AppError::Validation)?;

    let record = state
        .service
        .create(
            tx_type,
            NewTransaction {
                tx_hash: payload.tx_hash,
                amount: payload.amount,
                wallet_address: payload.wallet_address,
                source_id: payload.source_id,
                source_type: payload.source_type,
                metadata: payload.metadata,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(TransactionEnvelope::new(record))))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.service.get(&key).await?;
    Ok(Json(TransactionEnvelope::new(record)))
}

/// Forces a reconciliation round against the ledger.
pub async fn check_transaction(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.service.get(&key).await?;
    let tx_hash = record.tx_hash.clone().ok_or_else(|| {
        AppError::Validation("transaction has no ledger hash to check".to_string())
    })?;

    let record = state.service.check_transaction_status(&tx_hash).await?;
    Ok(Json(TransactionEnvelope::new(record)))
}

/// Admin/webhook status override. The body is read raw so the callback
/// signature can be verified over the exact bytes.
pub async fn override_transaction(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    authorize_status_override(&state.admin_api_key, &state.webhook_secret, &headers, &body)?;

    let payload: UpdateStatusPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("invalid payload: {}", e)))?;
    let status = payload
        .status
        .parse::<TxStatus>()
        .map_err(AppError::Validation)?;

    let record = state
        .service
        .update_transaction_status(
            &key,
            status,
            payload.details,
            StatusOverride {
                tx_hash: payload.tx_hash,
                wallet_address: payload.wallet_address,
                source_id: payload.source_id,
                source_type: payload.source_type,
                metadata: payload.metadata,
            },
        )
        .await?;

    Ok(Json(TransactionEnvelope::new(record)))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<TxStatus>)
        .transpose()
        .map_err(AppError::Validation)?;

    let filter = TransactionFilter {
        status,
        source_type: params.campaign_id.as_ref().map(|_| "campaign".to_string()),
        source_id: params.campaign_id,
        user_id: params.user_id,
    };
    let page = Page::new(params.page, params.limit);

    let transactions = state.service.list(filter, page).await?;

    Ok(Json(TransactionListEnvelope {
        success: true,
        transactions,
        page: page.page,
        limit: page.limit,
    }))
}
