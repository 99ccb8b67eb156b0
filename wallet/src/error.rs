use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use btc_wallet_sync::{StorageError, SyncError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// Every upstream provider failed
    #[error("{0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Validation(msg) | SyncError::Parse(msg) => ApiError::InvalidInput(msg),
            SyncError::ProviderExhausted(msg) => ApiError::Unavailable(msg),
            SyncError::Storage(StorageError::WalletNotFound(id)) => ApiError::WalletNotFound(id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        SyncError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::WalletNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let invalid: ApiError = SyncError::Validation("Invalid BTC address format".into()).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let exhausted: ApiError = SyncError::ProviderExhausted("all failed".into()).into();
        assert_eq!(exhausted.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let missing: ApiError = StorageError::WalletNotFound("42".into()).into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let other: ApiError = SyncError::decode("bad body").into();
        assert_eq!(other.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
