//! Error taxonomy for the balance service.
//!
//! Chain errors split into transient and permanent variants; the retry layer
//! classifies them, everything else surfaces the original cause verbatim.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::types::{ErrorDetail, ErrorResponse};

/// Errors raised by the chain adapter.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("chain request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("rate limited by chain provider: {0}")]
    RateLimited(String),

    #[error("node is syncing: {0}")]
    NodeSyncing(String),

    #[error("chain provider unavailable: {0}")]
    ServiceUnavailable(String),

    /// Non-success HTTP status from the RPC endpoint.
    #[error("rpc endpoint returned http {status}: {message}")]
    Http { status: u16, message: String },

    /// Structured JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: String, message: String },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("contract not found: {0}")]
    ContractNotFound(String),

    #[error("malformed rpc response: {0}")]
    MalformedResponse(String),
}

/// Errors raised by the cache store. Never fatal to a read path.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization failed: {0}")]
    Serialization(String),
}

/// Errors raised by the durable store.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(String),

    #[error("database migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Request validation errors.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("invalid {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("validation failed: {0}")]
    Multiple(String),
}

/// Top-level application error.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Terminal failure of a balance read: cache missed and the chain fetch
    /// exhausted its retries. Carries the underlying cause.
    #[error("failed to get balance for {account}/{token}: {source}")]
    Fetch {
        account: String,
        token: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Wrap a failure as a terminal fetch error for one (account, token) pair.
    #[must_use]
    pub fn fetch(account: &str, token: &str, source: AppError) -> Self {
        Self::Fetch {
            account: account.to_string(),
            token: token.to_string(),
            source: Box::new(source),
        }
    }

    /// Stable machine-readable tag used in HTTP error bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chain(_) => "chain_error",
            Self::Cache(_) => "cache_error",
            Self::Database(_) => "database_error",
            Self::Validation(_) => "validation_error",
            Self::Fetch { .. } => "fetch_error",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Chain(ChainError::InvalidAddress(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Chain(ChainError::ContractNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Database(DatabaseError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Fetch { .. } | Self::Chain(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cache(_) | Self::Database(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                r#type: self.kind().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_preserves_cause() {
        let cause = AppError::Chain(ChainError::RateLimited("429 from provider".to_string()));
        let err = AppError::fetch("0xabc", "0xdef", cause);
        let message = err.to_string();
        assert!(message.contains("0xabc"));
        assert!(message.contains("429 from provider"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Chain(ChainError::Timeout("t".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Chain(ChainError::InvalidAddress("xyz".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Database(DatabaseError::NotFound("id".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Validation(ValidationError::Multiple("bad".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_kind_tags() {
        let err = AppError::fetch(
            "a",
            "t",
            AppError::Chain(ChainError::Network("down".into())),
        );
        assert_eq!(err.kind(), "fetch_error");
        assert_eq!(AppError::Cancelled.kind(), "cancelled");
    }
}
