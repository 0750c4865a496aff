//! # Docsign Relay Gateway
//!
//! リレーのHTTPフロントエンド。
//!
//! ## 役割
//! - 起動時に署名鍵を読み込み（なければ生成し）、レジャーへの疎通を確認する
//! - リクエストをリレーコアに渡し、結果をHTTPステータスに対応付ける
//!
//! ## API エンドポイント
//! - `GET /address` — リレーのアドレス
//! - `POST /sign` — 署名の記録
//! - `POST /invalidate` — 署名の無効化
//!
//! 既存クライアント向けに旧パス（`/get_address`, `/sign_document_contract`,
//! `/invalidate_signature_contract`）も受け付ける。

mod config;
mod endpoints;
mod error;

use std::sync::Arc;

use docsign_core::ledger::http_client;
use docsign_core::{
    CredentialStore, DocumentRelay, JsonRpcLedger, LedgerClient, LedgerMode, MockBehavior,
    MockLedger, RelayConfig,
};
use tower_http::cors::CorsLayer;

use crate::config::{GatewayState, ListenConfig};
use crate::endpoints::{handle_address, handle_invalidate, handle_sign};

/// ルーティングを構築する。
fn router(state: Arc<GatewayState>) -> axum::Router {
    axum::Router::new()
        .route("/address", axum::routing::get(handle_address))
        .route("/sign", axum::routing::post(handle_sign))
        .route("/invalidate", axum::routing::post(handle_invalidate))
        .route("/get_address", axum::routing::get(handle_address))
        .route("/sign_document_contract", axum::routing::post(handle_sign))
        .route(
            "/invalidate_signature_contract",
            axum::routing::post(handle_invalidate),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let relay_config = RelayConfig::from_env()?;
    let listen = ListenConfig::from_env()?;

    // 鍵を保存できなければ起動しない
    let credential = CredentialStore::new(&relay_config.secret_file).load_or_create()?;

    let ledger: Arc<dyn LedgerClient> = match &relay_config.ledger {
        LedgerMode::Rpc(endpoint) => {
            let client = http_client(relay_config.ledger_timeout)?;
            Arc::new(JsonRpcLedger::connect(endpoint.clone(), client).await?)
        }
        LedgerMode::Mock => {
            tracing::warn!("モックレジャーで起動します（開発環境用）");
            Arc::new(MockLedger::new(MockBehavior::Confirm))
        }
    };

    let relay = DocumentRelay::new(credential, ledger, &relay_config);
    tracing::info!(
        address = %relay.address(),
        contract = %relay_config.contract_address,
        gas_limit = relay_config.gas_limit,
        "リレーを初期化しました"
    );

    let app = router(Arc::new(GatewayState { relay }));

    let addr = listen.addr();
    tracing::info!("Gatewayを {} で起動します", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;
    use docsign_core::Credential;
    use docsign_crypto::{generate_signing_key, Address};
    use docsign_types::{AddressResponse, OperationResponse, OperationStatus, SignDocumentRequest};

    const SIGNER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    /// テスト用GatewayStateを構築するヘルパー
    fn test_state(ledger: Arc<MockLedger>) -> Arc<GatewayState> {
        test_state_with_timeout(ledger, Duration::from_secs(5))
    }

    fn test_state_with_timeout(ledger: Arc<MockLedger>, timeout: Duration) -> Arc<GatewayState> {
        let config = RelayConfig {
            ledger: LedgerMode::Mock,
            contract_address: Address([0x11; 20]),
            secret_file: "unused".into(),
            gas_limit: 500_000,
            poll_interval: Duration::from_millis(5),
            confirmation_timeout: Some(timeout),
            ledger_timeout: Duration::from_secs(30),
        };
        let relay = DocumentRelay::new(
            Credential::from_signing_key(generate_signing_key()),
            ledger,
            &config,
        );
        Arc::new(GatewayState { relay })
    }

    fn valid_request() -> SignDocumentRequest {
        SignDocumentRequest {
            document_hash: Some(format!("0x{}", "0".repeat(64))),
            signer_identifier: Some(SIGNER.to_string()),
            signature_blob: Some("0xabc123".to_string()),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// テスト用のGatewayを起動し、ベースURLを返す。
    async fn start_gateway(state: Arc<GatewayState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn test_sign_confirmed_is_200_success() {
        let ledger = Arc::new(MockLedger::new(MockBehavior::Confirm));
        let state = test_state(ledger.clone());

        let Json(response) = handle_sign(State(state), Ok(Json(valid_request())))
            .await
            .unwrap();
        assert_eq!(response.status, OperationStatus::Success);
        assert_eq!(response.operation_id.len(), 66);
        assert_eq!(response.block_reference, 1);
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_reverted_is_400_failed() {
        let ledger = Arc::new(MockLedger::new(MockBehavior::Revert));
        let state = test_state(ledger);

        let err = handle_sign(State(state), Ok(Json(valid_request())))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["status"], "failed");
        assert!(body["operationId"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn test_malformed_hash_is_400_without_ledger_calls() {
        let ledger = Arc::new(MockLedger::new(MockBehavior::Confirm));
        let state = test_state(ledger.clone());

        let mut request = valid_request();
        request.document_hash = Some(format!("0x{}", "0".repeat(63)));
        let err = handle_invalidate(State(state), Ok(Json(request)))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("documentHash"));
        assert_eq!(ledger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_submission_rejection_is_500() {
        let ledger = Arc::new(MockLedger::new(MockBehavior::Confirm));
        ledger.reject_next_submission("insufficient funds for gas * price + value");
        let state = test_state(ledger);

        let err = handle_sign(State(state), Ok(Json(valid_request())))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_receipt_poll_failure_is_500_with_operation_id() {
        let ledger = Arc::new(MockLedger::new(MockBehavior::Confirm));
        ledger.fail_polls_with("connection reset by peer");
        let state = test_state(ledger.clone());

        let err = handle_sign(State(state), Ok(Json(valid_request())))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("connection reset by peer"));
        let operation_id = body["operationId"].as_str().unwrap();
        assert_eq!(operation_id.len(), 66);
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_timeout_is_504_with_operation_id() {
        let ledger = Arc::new(MockLedger::new(MockBehavior::NeverTerminal));
        let state = test_state_with_timeout(ledger.clone(), Duration::from_millis(50));

        let err = handle_sign(State(state), Ok(Json(valid_request())))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let body = body_json(response).await;
        assert!(body["error"].is_string());
        assert!(body["operationId"].as_str().unwrap().starts_with("0x"));
        // 送信済みのオペレーションは取り消されない
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_address_endpoint() {
        let state = test_state(Arc::new(MockLedger::new(MockBehavior::Confirm)));
        let expected = state.relay.address().to_string();

        let Json(AddressResponse { identifier }) = handle_address(State(state)).await;
        assert_eq!(identifier, expected);
        assert!(Address::is_checksummed(&identifier));
    }

    #[tokio::test]
    async fn test_http_routes_and_legacy_aliases() {
        let ledger = Arc::new(MockLedger::new(MockBehavior::Confirm));
        let base = start_gateway(test_state(ledger.clone())).await;
        let client = reqwest::Client::new();

        // 旧クライアントのsnake_caseボディと旧パス
        let resp = client
            .post(format!("{base}/sign_document_contract"))
            .json(&serde_json::json!({
                "document_hash": format!("0x{}", "0".repeat(64)),
                "signer_address": SIGNER,
                "signature": "0xabc",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: OperationResponse = resp.json().await.unwrap();
        assert_eq!(body.status, OperationStatus::Success);

        let resp = client.get(format!("{base}/get_address")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        // JSONでないボディ
        let resp = client
            .post(format!("{base}/invalidate"))
            .header("content-type", "application/json")
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());

        // CORS
        let resp = client
            .get(format!("{base}/address"))
            .header("origin", "http://example.com")
            .send()
            .await
            .unwrap();
        assert!(resp.headers().contains_key("access-control-allow-origin"));

        assert_eq!(ledger.submitted().len(), 1);
    }
}
