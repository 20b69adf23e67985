pub mod transactions;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::domain::TransactionRecord;
use crate::store::{Page, TransactionFilter};
use crate::AppState;

/// `{success, transaction}` response envelope.
#[derive(Debug, Serialize)]
pub struct TransactionEnvelope {
    pub success: bool,
    pub transaction: TransactionRecord,
}

impl TransactionEnvelope {
    pub fn new(transaction: TransactionRecord) -> Self {
        Self {
            success: true,
            transaction,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionListEnvelope {
    pub success: bool,
    pub transactions: Vec<TransactionRecord>,
    pub page: i64,
    pub limit: i64,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store_status = match state
        .service
        .list(TransactionFilter::default(), Page::new(Some(1), Some(1)))
        .await
    {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let status_code = if store_status == "connected" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if store_status == "connected" { "healthy" } else { "unhealthy" },
            "version": env!("CARGO_PKG_VERSION"),
            "store": store_status,
        })),
    )
}
