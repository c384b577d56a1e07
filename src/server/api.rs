use crate::error::AppError;
use crate::server::AppState;
use crate::services::{ApiRequestMetrics, ApiStatus};
use crate::utils::normalize_symbol;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Header carrying the caller's API key
pub const API_KEY_HEADER: &str = "api_key";

/// Header carrying the Stripe webhook signature
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentRequest {
    pub amount: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentSessionResponse {
    pub payment_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub uptime_secs: u64,
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

async fn require_key(app_state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    if app_state.gate.verify(api_key(headers)).await {
        Ok(())
    } else {
        Err(AppError::InvalidApiKey)
    }
}

/// POST /predict/{symbol}
///
/// `symbol` may be `BTC_USD`, `BTC-USD` or URL-encoded `BTC%2FUSD`.
pub async fn predict_handler(
    State(app_state): State<AppState>,
    Path(symbol): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PredictResponse>, AppError> {
    let mut metrics = ApiRequestMetrics::new(Utc::now(), "/predict", &symbol);
    let result = predict(&app_state, &symbol, &headers).await;
    metrics.complete();

    match &result {
        Ok(predictions) => {
            metrics.forecast_len = predictions.len();
            info!(symbol = %symbol, duration_ms = metrics.duration_ms, "Prediction served");
        }
        Err(e) => {
            metrics.status = match e {
                AppError::InvalidApiKey => ApiStatus::Denied,
                _ => ApiStatus::Fail,
            };
            metrics.http_status = e.status_code().as_u16();
            metrics.error_message = Some(e.to_string());
            warn!(symbol = %symbol, error = %e, "Prediction failed");
        }
    }
    app_state.api_log.write(&metrics);

    result.map(|predictions| Json(PredictResponse { predictions }))
}

async fn predict(app_state: &AppState, raw_symbol: &str, headers: &HeaderMap) -> Result<Vec<f64>, AppError> {
    require_key(app_state, headers).await?;

    let symbol = normalize_symbol(raw_symbol).ok_or_else(|| {
        AppError::InvalidInput(format!("symbol must look like BASE_QUOTE, got '{}'", raw_symbol))
    })?;
    debug!(symbol = %symbol, "Running forecast");

    app_state.pipeline.forecast(&symbol).await
}

/// POST /create-payment-session
///
/// The amount comes from a JSON body `{"amount": 9.99}` or an `?amount=` query.
pub async fn create_payment_session_handler(
    State(app_state): State<AppState>,
    Query(query): Query<PaymentRequest>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PaymentSessionResponse>, AppError> {
    require_key(&app_state, &headers).await?;

    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        PaymentRequest::default()
    } else {
        serde_json::from_slice::<PaymentRequest>(&body)
            .map_err(|e| AppError::InvalidInput(format!("invalid JSON body: {}", e)))?
    };
    let amount = from_body
        .amount
        .or(query.amount)
        .ok_or_else(|| AppError::InvalidInput("amount is required".to_string()))?;

    let payment_url = app_state.payments.create_payment_session(amount).await?;
    Ok(Json(PaymentSessionResponse { payment_url }))
}

/// POST /stripe-webhook
pub async fn stripe_webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Signature("missing Stripe-Signature header".to_string()))?;

    let event = app_state.payments.verify_webhook(&body, signature).map_err(|e| {
        warn!(error = %e, "Rejected webhook");
        e
    })?;

    if event.is_checkout_completed() {
        app_state.gate.on_payment_completed(event.customer_id()).await?;
    } else {
        debug!(event_type = %event.event_type, "Ignoring webhook event");
    }

    Ok(Json(WebhookResponse {
        status: "success".to_string(),
    }))
}

/// GET /health
pub async fn health_handler(State(app_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: app_state.pipeline.model_loaded().await,
        uptime_secs: app_state.started_at.elapsed().as_secs(),
    })
}
