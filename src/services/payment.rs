//! Stripe Checkout sessions and webhook verification

use crate::constants::{CHECKOUT_COMPLETED_EVENT, WEBHOOK_TOLERANCE_SECS};
use crate::error::{AppError, Result};
use crate::models::MonetizationConfig;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use tracing::{error, info, warn};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Product name shown on the hosted checkout page
const PRODUCT_NAME: &str = "API Access";

#[derive(Clone)]
pub struct PaymentProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
    currency: String,
}

/// Webhook event envelope; only the fields used here are decoded
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl WebhookEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED_EVENT
    }

    /// `data.object.customer`, or "unknown" when absent or null
    pub fn customer_id(&self) -> &str {
        self.data
            .object
            .get("customer")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    url: Option<String>,
}

impl PaymentProvider {
    pub fn from_config(config: &MonetizationConfig) -> Result<Self> {
        if !config.payment_provider.eq_ignore_ascii_case("stripe") {
            return Err(AppError::Config(format!(
                "unsupported payment provider '{}'",
                config.payment_provider
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: STRIPE_API_BASE.to_string(),
            api_key: config.stripe_api_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
            currency: config.currency.to_lowercase(),
        })
    }

    /// Create a monthly subscription checkout for `amount` (major units); returns the hosted URL
    pub async fn create_payment_session(&self, amount: f64) -> Result<String> {
        let unit_amount = to_minor_units(amount)?;
        if self.api_key.is_empty() {
            return Err(AppError::Payment("Stripe API key is not configured".to_string()));
        }

        let unit_amount = unit_amount.to_string();
        let form = [
            ("payment_method_types[]", "card"),
            ("line_items[0][price_data][currency]", self.currency.as_str()),
            ("line_items[0][price_data][product_data][name]", PRODUCT_NAME),
            ("line_items[0][price_data][unit_amount]", unit_amount.as_str()),
            ("line_items[0][price_data][recurring][interval]", "month"),
            ("line_items[0][quantity]", "1"),
            ("mode", "subscription"),
            ("success_url", self.success_url.as_str()),
            ("cancel_url", self.cancel_url.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Stripe request failed");
                AppError::Payment(e.to_string())
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Payment(format!("invalid Stripe response: {}", e)))?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            error!(status = %status, message = message, "Stripe rejected checkout session");
            return Err(AppError::Payment(format!("Stripe error {}: {}", status, message)));
        }

        let session: CheckoutSession = serde_json::from_value(body)
            .map_err(|e| AppError::Payment(format!("unexpected Stripe session: {}", e)))?;
        let url = session
            .url
            .ok_or_else(|| AppError::Payment(format!("session {} has no checkout url", session.id)))?;

        info!(session_id = %session.id, amount_cents = %unit_amount, "Checkout session created");
        Ok(url)
    }

    /// Check the `Stripe-Signature` header against `payload` and decode the event
    pub fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent> {
        self.verify_webhook_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    pub fn verify_webhook_at(&self, payload: &[u8], signature_header: &str, now: i64) -> Result<WebhookEvent> {
        if self.webhook_secret.is_empty() {
            return Err(AppError::Signature("webhook secret is not configured".to_string()));
        }

        let (timestamp, signatures) = parse_signature_header(signature_header)?;
        if (now - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
            warn!(timestamp = timestamp, now = now, "Webhook timestamp outside tolerance");
            return Err(AppError::Signature("timestamp outside the tolerance zone".to_string()));
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|e| AppError::Signature(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(AppError::Signature("no matching v1 signature".to_string()));
        }

        serde_json::from_slice(payload).map_err(|e| AppError::Parse(format!("invalid webhook payload: {}", e)))
    }
}

/// Dollars to cents, rejecting non-positive or non-finite amounts
fn to_minor_units(amount: f64) -> Result<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::InvalidInput(format!("amount must be positive, got {}", amount)));
    }
    Ok((amount * 100.0).round() as i64)
}

/// `t=<unix>,v1=<hex>[,v1=<hex>...]`; other schemes are ignored
fn parse_signature_header(header: &str) -> Result<(i64, Vec<String>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| AppError::Signature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(AppError::Signature("missing v1 signature".to_string()));
    }
    Ok((timestamp, signatures))
}

/// Header value Stripe would send for `payload` at `timestamp`
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::Signature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    fn provider() -> PaymentProvider {
        let config = MonetizationConfig {
            stripe_webhook_secret: SECRET.to_string(),
            ..MonetizationConfig::default()
        };
        PaymentProvider::from_config(&config).unwrap()
    }

    fn completed_event(customer: Value) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_1", "customer": customer}}
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature() {
        let payload = completed_event(Value::from("cus_42"));
        let header = sign_payload(SECRET, NOW, &payload).unwrap();

        let event = provider().verify_webhook_at(&payload, &header, NOW + 10).unwrap();
        assert!(event.is_checkout_completed());
        assert_eq!(event.customer_id(), "cus_42");
    }

    #[test]
    fn test_null_customer_is_unknown() {
        let payload = completed_event(Value::Null);
        let header = sign_payload(SECRET, NOW, &payload).unwrap();
        let event = provider().verify_webhook_at(&payload, &header, NOW).unwrap();
        assert_eq!(event.customer_id(), "unknown");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = completed_event(Value::from("cus_42"));
        let header = sign_payload("whsec_other", NOW, &payload).unwrap();
        assert!(matches!(
            provider().verify_webhook_at(&payload, &header, NOW),
            Err(AppError::Signature(_))
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let payload = completed_event(Value::from("cus_42"));
        let header = sign_payload(SECRET, NOW, &payload).unwrap();
        let tampered = completed_event(Value::from("cus_evil"));
        assert!(provider().verify_webhook_at(&tampered, &header, NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = completed_event(Value::from("cus_42"));
        let header = sign_payload(SECRET, NOW, &payload).unwrap();
        assert!(provider()
            .verify_webhook_at(&payload, &header, NOW + WEBHOOK_TOLERANCE_SECS + 1)
            .is_err());
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let payload = completed_event(Value::from("cus_42"));
        let good = sign_payload(SECRET, NOW, &payload).unwrap();
        let sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v0=abc,v1=deadbeef,v1={}", NOW, sig);
        assert!(provider().verify_webhook_at(&payload, &header, NOW).is_ok());
    }

    #[test]
    fn test_malformed_header() {
        assert!(parse_signature_header("garbage").is_err());
        assert!(parse_signature_header("t=123").is_err());
        assert!(parse_signature_header("v1=abc").is_err());
        assert_eq!(
            parse_signature_header("t=5, v1=ab").unwrap(),
            (5, vec!["ab".to_string()])
        );
    }

    #[test]
    fn test_signed_garbage_is_payload_error() {
        let payload = b"not json";
        let header = sign_payload(SECRET, NOW, payload).unwrap();
        assert!(matches!(
            provider().verify_webhook_at(payload, &header, NOW),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_amount_conversion() {
        assert_eq!(to_minor_units(9.99).unwrap(), 999);
        assert_eq!(to_minor_units(10.0).unwrap(), 1000);
        assert!(to_minor_units(0.0).is_err());
        assert!(to_minor_units(f64::NAN).is_err());
    }

    #[test]
    fn test_unsupported_provider() {
        let config = MonetizationConfig {
            payment_provider: "paypal".to_string(),
            ..MonetizationConfig::default()
        };
        assert!(matches!(
            PaymentProvider::from_config(&config),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_session_requires_api_key() {
        let result = provider().create_payment_session(10.0).await;
        assert!(matches!(result, Err(AppError::Payment(_))));
    }
}
