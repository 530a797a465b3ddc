//! Webhook endpoints
//!
//! - `GET /webhooks/{platform}` answers the subscription handshake
//! - `POST /webhooks/{platform}` receives deliveries
//!
//! `{platform}` is one of `facebook`, `instagram`, `whatsapp` or `web`.
//! Deliveries are processed synchronously before answering; Meta allows
//! 20 seconds, which the AI and HTTP timeouts stay under.

use ntex::{util::Bytes, web};
use serde::Deserialize;
use serde_json::json;
use tracing::Instrument;

use super::{
    AppState,
    errors::WebhookError,
    events,
    security::{self, SignatureCheck},
};
use crate::{
    consts::HUB_MODE_SUBSCRIBE, metric, models::audit::AuditLogEntry,
    models::integration::Platform,
};

/// Query parameters of the subscription handshake
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    /// Should be "subscribe"
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    /// Token configured in the app dashboard
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    /// Echoed back on success
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

fn parse_platform(raw: &str) -> Result<Platform, WebhookError> {
    raw.parse()
        .map_err(|_| WebhookError::UnknownPlatform(raw.to_string()))
}

/// Returns the challenge when mode and token match the platform configuration
fn check_handshake(
    expected_token: Option<&str>,
    platform: Platform,
    query: &VerifyQuery,
) -> Result<String, WebhookError> {
    let (Some(mode), Some(verify_token), Some(challenge)) =
        (&query.mode, &query.verify_token, &query.challenge)
    else {
        let missing = [
            ("hub.mode", query.mode.is_none()),
            ("hub.verify_token", query.verify_token.is_none()),
            ("hub.challenge", query.challenge.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect::<Vec<_>>()
        .join(", ");
        return Err(WebhookError::MissingParameter(missing));
    };

    let Some(expected_token) = expected_token else {
        return Err(WebhookError::NotConfigured(format!(
            "{platform} verify token"
        )));
    };

    if mode != HUB_MODE_SUBSCRIBE || verify_token != expected_token {
        return Err(WebhookError::VerificationFailed);
    }

    Ok(challenge.clone())
}

/// Subscription handshake (GET)
///
/// # Returns
/// - 200 with the challenge as `text/plain` if verification succeeds
/// - 400 when a `hub.*` parameter is missing
/// - 403 when the mode or token do not match
/// - 404 for an unknown platform
/// - 500 when the platform has no verify token configured
#[web::get("/{platform}")]
pub async fn verify(
    path: web::types::Path<String>,
    query: web::types::Query<VerifyQuery>,
    app_state: web::types::State<AppState>,
) -> Result<web::HttpResponse, web::Error> {
    let platform = parse_platform(&path)?;
    let expected_token = app_state.webhooks.secrets(platform).verify_token.as_deref();
    let challenge = check_handshake(expected_token, platform, &query)?;

    logfire::info!("Webhook verified for {platform}", platform = platform.to_string());
    Ok(web::HttpResponse::Ok()
        .content_type("text/plain")
        .body(challenge))
}

/// Delivery receiver (POST)
///
/// Verifies the signature on the raw body, then parses and dispatches every
/// entry. Answers 200 `{ok, processed, total}` even when single entries
/// fail so the platform does not redeliver. Only signature and
/// configuration failures produce an error status.
#[web::post("/{platform}")]
pub async fn receive(
    req: web::HttpRequest,
    path: web::types::Path<String>,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> Result<web::HttpResponse, web::Error> {
    let platform = parse_platform(&path)?;
    let platform_name = platform.to_string();

    let check =
        security::authorize_delivery(&app_state.webhooks, platform, req.headers(), &body)
            .inspect_err(|_| metric::incr_webhook_statds(&platform_name, "rejected"))?;

    let delivery_id = uuid::Uuid::new_v4().to_string();
    if let SignatureCheck::Bypassed(reason) = check {
        app_state.audit.record(AuditLogEntry::warn(
            None,
            "Signature verification bypassed",
            json!({
                "delivery_id": delivery_id,
                "platform": platform,
                "reason": reason,
            }),
        ));
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            metric::incr_webhook_statds(&platform_name, "malformed");
            logfire::warn!(
                "Failed to parse webhook payload: {error}",
                error = e.to_string()
            );
            return Ok(web::HttpResponse::Ok().json(&json!({
                "ok": false,
                "error": format!("invalid json payload: {e}"),
                "processed": 0,
                "total": 0,
            })));
        }
    };

    metric::incr_webhook_statds(&platform_name, "received");
    let delivery = events::parse_delivery(platform, &payload);
    let span = logfire::span!(
        "webhook delivery {platform}",
        platform = platform_name.clone(),
        delivery_id = delivery_id.clone()
    );
    let summary = app_state
        .dispatcher()
        .process_delivery(&delivery, &delivery_id)
        .instrument(span)
        .await;

    Ok(web::HttpResponse::Ok().json(&json!({
        "ok": true,
        "processed": summary.processed,
        "total": summary.total,
    })))
}

/// Public endpoints, the signature check replaces authentication
pub fn webhooks(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhooks").service((verify, receive)));
}
