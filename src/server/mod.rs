pub mod api;

use crate::services::{AccessGate, ApiLogger, PaymentProvider, Pipeline};
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub gate: Arc<AccessGate>,
    pub payments: Arc<PaymentProvider>,
    pub api_log: ApiLogger,
    pub started_at: Instant,
}

impl FromRef<AppState> for Arc<AccessGate> {
    fn from_ref(app_state: &AppState) -> Arc<AccessGate> {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for Arc<Pipeline> {
    fn from_ref(app_state: &AppState) -> Arc<Pipeline> {
        app_state.pipeline.clone()
    }
}

pub fn router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/predict/{symbol}", post(api::predict_handler))
        .route("/create-payment-session", post(api::create_payment_session_handler))
        .route("/stripe-webhook", post(api::stripe_webhook_handler))
        .route("/health", get(api::health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the axum server
pub async fn serve(app_state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Registering routes:");
    tracing::info!("  POST /predict/{{symbol}}  (header: api_key)");
    tracing::info!("  POST /create-payment-session  (header: api_key)");
    tracing::info!("  POST /stripe-webhook");
    tracing::info!("  GET  /health");

    let app = router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
