//! Error taxonomy for the proxy, mapped to HTTP responses at the edge.

use actix_web::HttpResponse;
use serde_json::json;

/// Errors observable at the downstream HTTP boundary.
///
/// Each variant carries enough context to build a useful JSON error body;
/// the mapping to a status code lives in [`ProxyError::status_code`].
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("All refresh credentials exhausted: {0}")]
    AllCredentialsExhausted(String),

    #[error("Rate limit exceeded for model '{model}': {reason}")]
    RateLimitExceeded { model: String, reason: String },

    #[error("Client cancelled the request")]
    ClientCancelled,

    #[error("Upstream I/O error: {0}")]
    UpstreamIoError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl actix_web::error::ResponseError for ProxyError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::AllCredentialsExhausted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::ClientCancelled => StatusCode::from_u16(499).unwrap(),
            ProxyError::UpstreamIoError(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = self.to_string();
        let kind = match self {
            ProxyError::BadRequest(_) => "bad_request",
            ProxyError::Upstream { .. } => "upstream",
            ProxyError::AllCredentialsExhausted(_) => "all_credentials_exhausted",
            ProxyError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            ProxyError::ClientCancelled => "client_cancelled",
            ProxyError::UpstreamIoError(_) => "upstream_io_error",
            ProxyError::Internal(_) => "internal",
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": message,
            "type": kind,
        }))
    }
}
