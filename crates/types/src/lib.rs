//! # Docsign Relay 共有型定義
//!
//! HTTPフロントエンドとレジャーJSON-RPCの双方で使うワイヤ形式をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - 0x付き16進文字列: ドキュメントハッシュ、署名者アドレス、署名、トランザクションハッシュ
//! - JSON-RPCの数量（quantity）: 0x付き16進、先頭ゼロなし

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /sign, /invalidate リクエスト
// ---------------------------------------------------------------------------

/// 署名記録・署名無効化リクエスト。
///
/// 各フィールドは欠落を検出できるよう`Option`で受ける。
/// 旧クライアントのsnake_caseフィールド名（`document_hash`等）も受け付ける。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignDocumentRequest {
    /// 0x付き32バイトのドキュメントハッシュ
    #[serde(default, alias = "document_hash")]
    pub document_hash: Option<String>,
    /// EIP-55チェックサム形式の署名者アドレス
    #[serde(default, alias = "signer_address")]
    pub signer_identifier: Option<String>,
    /// 0x付き16進の署名データ
    #[serde(default, alias = "signature")]
    pub signature_blob: Option<String>,
}

// ---------------------------------------------------------------------------
// レスポンス
// ---------------------------------------------------------------------------

/// オペレーションの最終結果（レスポンスの`status`フィールド）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// ブロックに取り込まれ成功した
    Success,
    /// ブロックに取り込まれたがリバートした
    Failed,
}

/// /sign, /invalidate の成功・リバート時レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    /// 人間向けメッセージ
    pub message: String,
    /// 0x付きトランザクションハッシュ
    pub operation_id: String,
    /// 取り込まれたブロック番号
    pub block_reference: u64,
    /// 消費したガス量
    pub fee_consumed: u64,
    /// 成功 / 失敗
    pub status: OperationStatus,
}

/// GET /address レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressResponse {
    /// EIP-55チェックサム形式のリレーアドレス
    pub identifier: String,
}

/// エラーレスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// エラーメッセージ
    pub error: String,
    /// 送信済みオペレーションがある場合のトランザクションハッシュ（手動照合用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

// ---------------------------------------------------------------------------
// JSON-RPC 2.0
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 リクエスト。
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    /// 常に "2.0"
    pub jsonrpc: &'static str,
    /// リクエストID
    pub id: u64,
    /// メソッド名（例: "eth_sendRawTransaction"）
    pub method: &'a str,
    /// 位置引数
    pub params: serde_json::Value,
}

impl<'a> JsonRpcRequest<'a> {
    /// JSON-RPC 2.0 リクエストを構築する。
    pub fn new(id: u64, method: &'a str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 レスポンス。`result`と`error`はどちらか一方のみ存在する。
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// 成功時の結果
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// 失敗時のエラー
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 エラーオブジェクト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// エラーコード
    pub code: i64,
    /// ノードが返したメッセージ
    pub message: String,
}

/// `eth_getTransactionReceipt` の結果のうち、リレーが参照するフィールド。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    /// 0x付きトランザクションハッシュ
    pub transaction_hash: String,
    /// ブロック番号（quantity）
    pub block_number: String,
    /// 消費ガス（quantity）
    pub gas_used: String,
    /// "0x1" = 成功, "0x0" = リバート
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_camel_and_legacy_names() {
        let camel: SignDocumentRequest = serde_json::from_value(serde_json::json!({
            "documentHash": "0x01",
            "signerIdentifier": "0xabc",
            "signatureBlob": "0xdead",
        }))
        .unwrap();
        assert_eq!(camel.document_hash.as_deref(), Some("0x01"));
        assert_eq!(camel.signer_identifier.as_deref(), Some("0xabc"));
        assert_eq!(camel.signature_blob.as_deref(), Some("0xdead"));

        let legacy: SignDocumentRequest = serde_json::from_value(serde_json::json!({
            "document_hash": "0x01",
            "signer_address": "0xabc",
            "signature": "0xdead",
        }))
        .unwrap();
        assert_eq!(legacy.document_hash.as_deref(), Some("0x01"));
        assert_eq!(legacy.signer_identifier.as_deref(), Some("0xabc"));
        assert_eq!(legacy.signature_blob.as_deref(), Some("0xdead"));
    }

    #[test]
    fn test_request_missing_fields_are_none() {
        let req: SignDocumentRequest =
            serde_json::from_value(serde_json::json!({"documentHash": "0x01"})).unwrap();
        assert!(req.signer_identifier.is_none());
        assert!(req.signature_blob.is_none());
    }

    #[test]
    fn test_operation_response_wire_names() {
        let resp = OperationResponse {
            message: "ok".into(),
            operation_id: "0xff".into(),
            block_reference: 7,
            fee_consumed: 21000,
            status: OperationStatus::Failed,
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["operationId"], "0xff");
        assert_eq!(v["blockReference"], 7);
        assert_eq!(v["feeConsumed"], 21000);
        assert_eq!(v["status"], "failed");
    }

    #[test]
    fn test_error_response_omits_missing_operation_id() {
        let v = serde_json::to_value(ErrorResponse {
            error: "boom".into(),
            operation_id: None,
        })
        .unwrap();
        assert!(v.get("operationId").is_none());
    }
}
