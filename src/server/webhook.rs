//! Carrier webhook endpoint handler.
//!
//! Verifies the signature over the raw body, parses, and enqueues at high
//! priority before returning 202 Accepted. Processing happens asynchronously
//! in the queue consumer; any failure before the enqueue leaves no side
//! effect at all.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::queue::{QueuePriority, WebhookMessage};
use crate::store::StoreError;
use crate::webhooks::{SignatureError, WebhookEnvelope, verify_webhook};

/// Header carrying the signing key ID.
const HEADER_KEY_ID: &str = "x-carrier-key-id";
/// Header carrying the RFC 3339 signing timestamp.
const HEADER_TIMESTAMP: &str = "x-carrier-timestamp";
/// Header carrying the base64 RSA-SHA256 signature.
const HEADER_SIGNATURE: &str = "x-carrier-signature";

/// Errors that can occur when processing a webhook request.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("enqueue failed: {0}")]
    Enqueue(#[from] StoreError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) | WebhookError::InvalidJson(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Signature(e) => match e {
                SignatureError::InvalidTimestamp(_) | SignatureError::InvalidEncoding(_) => {
                    StatusCode::BAD_REQUEST
                }
                SignatureError::StaleTimestamp { .. }
                | SignatureError::UnknownKeyId(_)
                | SignatureError::InvalidSignature => StatusCode::UNAUTHORIZED,
                SignatureError::KeyFetch(_) | SignatureError::InvalidKey(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            WebhookError::Enqueue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Carrier webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers: `x-carrier-key-id`, `x-carrier-timestamp` (RFC 3339),
///   `x-carrier-signature` (base64 RSA-SHA256 over `timestamp + "." + body`)
/// - Body: JSON `{resourceType, shipment}` envelope
///
/// # Response
///
/// - 202 Accepted: event enqueued for processing
/// - 400 Bad Request: missing header, malformed timestamp/encoding, or
///   invalid JSON
/// - 401 Unauthorized: stale timestamp, unknown key, or bad signature
/// - 500 Internal Server Error: key-set fetch or enqueue failure
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let key_id = get_header(&headers, HEADER_KEY_ID)?;
    let timestamp = get_header(&headers, HEADER_TIMESTAMP)?;
    let signature = get_header(&headers, HEADER_SIGNATURE)?;

    // Verify BEFORE parsing: unauthenticated bytes get no further work.
    if let Err(e) = verify_webhook(
        app_state.keys().as_ref(),
        &key_id,
        &timestamp,
        &signature,
        &body,
        Utc::now(),
    )
    .await
    {
        warn!(key_id, error = %e, "webhook rejected at the boundary");
        return Err(e.into());
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)?;
    let kind = envelope.kind();
    debug!(
        ?kind,
        carrier_shipment_id = ?envelope.shipment.shipment_id,
        "verified carrier webhook"
    );

    app_state
        .queue()
        .push(WebhookMessage::new(QueuePriority::High, envelope.shipment))
        .await?;

    // Nudge the consumer; a full wake channel just means one is pending.
    let _ = app_state.consumer_wake().try_send(());

    info!(?kind, "carrier webhook enqueued");
    Ok((StatusCode::ACCEPTED, "Accepted"))
}

fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
