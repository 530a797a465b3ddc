use derive_more::{Display, Error};
use ntex::{http, web};

/// Failures surfaced to the platform calling a webhook endpoint
#[derive(Debug, Display, Error)]
pub enum WebhookError {
    #[display("unknown platform: {_0}")]
    UnknownPlatform(#[error(not(source))] String),
    #[display("missing parameter: {_0}")]
    MissingParameter(#[error(not(source))] String),
    #[display("verification failed")]
    VerificationFailed,
    #[display("missing signature")]
    MissingSignature,
    #[display("invalid signature")]
    InvalidSignature,
    #[display("not configured: {_0}")]
    NotConfigured(#[error(not(source))] String),
}

impl web::error::WebResponseError for WebhookError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        match self {
            WebhookError::NotConfigured(_) => tracing::error!(error = %self, "webhook rejected"),
            _ => tracing::warn!(error = %self, "webhook rejected"),
        }

        web::HttpResponse::build(self.status_code()).json(&serde_json::json!({
            "ok": false,
            "error": self.to_string(),
        }))
    }

    fn status_code(&self) -> http::StatusCode {
        match *self {
            WebhookError::UnknownPlatform(_) => http::StatusCode::NOT_FOUND,
            WebhookError::MissingParameter(_) => http::StatusCode::BAD_REQUEST,
            WebhookError::VerificationFailed => http::StatusCode::FORBIDDEN,
            WebhookError::MissingSignature => http::StatusCode::UNAUTHORIZED,
            WebhookError::InvalidSignature => http::StatusCode::FORBIDDEN,
            WebhookError::NotConfigured(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
