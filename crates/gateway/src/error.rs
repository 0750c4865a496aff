//! # Gateway エラー型
//!
//! リレーのエラー分類をHTTPステータスとJSONボディに対応付ける。

use axum::http::StatusCode;
use axum::Json;
use docsign_core::{OperationId, RelayError};
use docsign_types::ErrorResponse;

use crate::endpoints::operation_response;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// ボディがJSONとして解釈できない
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// リレー処理の失敗
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Relay(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            GatewayError::Relay(RelayError::PollTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn operation_id(&self) -> Option<OperationId> {
        match self {
            GatewayError::BadRequest(_) => None,
            GatewayError::Relay(e) => e.operation_id(),
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        // リバートは通常の結果ボディ（status: failed）で返す
        if let GatewayError::Relay(RelayError::OperationReverted(outcome)) = &self {
            return (StatusCode::BAD_REQUEST, Json(operation_response(outcome))).into_response();
        }

        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "リクエストの処理に失敗しました");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            operation_id: self.operation_id().map(|id| id.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
