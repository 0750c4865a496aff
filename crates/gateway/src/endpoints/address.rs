//! # GET /address

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use docsign_types::AddressResponse;

use crate::config::GatewayState;

/// GET /address — リレーのアドレスをEIP-55形式で返す。
pub async fn handle_address(State(state): State<Arc<GatewayState>>) -> Json<AddressResponse> {
    Json(AddressResponse {
        identifier: state.relay.address().to_string(),
    })
}
