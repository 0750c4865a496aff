//! # POST /sign, POST /invalidate
//!
//! 同じリクエスト・レスポンス形式で、呼び出すコントラクト関数だけが異なる。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use docsign_core::{Action, OperationOutcome, TerminalState};
use docsign_types::{OperationResponse, OperationStatus, SignDocumentRequest};

use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /sign — 署名をレジャーに記録し、確定まで待つ。
pub async fn handle_sign(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<SignDocumentRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, GatewayError> {
    relay_document(&state, Action::Record, body).await
}

/// POST /invalidate — 記録済みの署名を無効化し、確定まで待つ。
pub async fn handle_invalidate(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<SignDocumentRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, GatewayError> {
    relay_document(&state, Action::Invalidate, body).await
}

async fn relay_document(
    state: &GatewayState,
    action: Action,
    body: Result<Json<SignDocumentRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, GatewayError> {
    let Json(request) = body.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    let outcome = state.relay.process(action, &request).await?;
    Ok(Json(operation_response(&outcome)))
}

/// 終端状態をレスポンスボディに変換する。
pub fn operation_response(outcome: &OperationOutcome) -> OperationResponse {
    let (message, status) = match outcome.terminal_state {
        TerminalState::Confirmed => ("オペレーションが確定しました", OperationStatus::Success),
        TerminalState::Reverted => (
            "オペレーションは取り込まれましたがリバートしました",
            OperationStatus::Failed,
        ),
    };
    OperationResponse {
        message: message.to_string(),
        operation_id: outcome.operation_id.to_string(),
        block_reference: outcome.block_reference,
        fee_consumed: outcome.fee_consumed,
        status,
    }
}
