pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod service;
pub mod store;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::service::TransactionService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TransactionService>,
    pub admin_api_key: String,
    pub webhook_secret: String,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::list_transactions),
        )
        .route(
            "/transactions/:key",
            get(handlers::transactions::get_transaction)
                .put(handlers::transactions::override_transaction),
        )
        .route(
            "/transactions/:key/check",
            post(handlers::transactions::check_transaction),
        )
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
