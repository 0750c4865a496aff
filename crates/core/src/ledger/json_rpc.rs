//! # JSON-RPCレジャークライアント
//!
//! EVM互換ノードのJSON-RPCに接続する本番用実装。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use docsign_crypto::Address;
use docsign_types::{JsonRpcRequest, JsonRpcResponse, RpcReceipt};

use super::{LedgerClient, LedgerError, OperationId, Receipt, ReceiptStatus, RejectionReason};

/// JSON-RPCでノードに接続するレジャークライアント。
pub struct JsonRpcLedger {
    /// ノードのエンドポイントURL
    endpoint: String,
    /// HTTPクライアント
    http_client: reqwest::Client,
    /// 接続時に取得したチェーンID
    chain_id: u64,
    /// JSON-RPCリクエストID
    next_id: AtomicU64,
}

/// リクエストごとのタイムアウトを設定したHTTPクライアントを作る。
/// 応答しないノードは`LedgerError::Connectivity`として扱われる。
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, LedgerError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LedgerError::Connectivity(format!("HTTPクライアントの初期化に失敗: {e}")))
}

impl JsonRpcLedger {
    /// ノードに接続する。`eth_chainId`で疎通を確認し、チェーンIDを保持する。
    /// 失敗は起動時の致命的エラーとして扱う。
    pub async fn connect(
        endpoint: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self {
            endpoint: endpoint.into(),
            http_client,
            chain_id: 0,
            next_id: AtomicU64::new(1),
        };

        let chain_id = ledger.call("eth_chainId", serde_json::json!([])).await.map_err(|e| {
            LedgerError::Connectivity(format!("{} に接続できません: {e}", ledger.endpoint))
        })?;
        ledger.chain_id = to_u64(parse_quantity(&chain_id, "eth_chainId")?, "eth_chainId")?;

        tracing::info!(endpoint = %ledger.endpoint, chain_id = ledger.chain_id, "レジャーに接続しました");
        Ok(ledger)
    }

    /// JSON-RPCを1回呼び出す。
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Connectivity(format!("{method} の送信に失敗: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Connectivity(format!(
                "{method}: ノードがHTTP {status} を返しました"
            )));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{method} のレスポンスのパースに失敗: {e}")))?;

        if let Some(error) = body.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(body.result.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait::async_trait]
impl LedgerClient for JsonRpcLedger {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn current_sequence_number(&self, address: &Address) -> Result<u64, LedgerError> {
        // 保留中のトランザクションも数える
        let result = self
            .call(
                "eth_getTransactionCount",
                serde_json::json!([address.to_string(), "pending"]),
            )
            .await?;
        to_u64(
            parse_quantity(&result, "eth_getTransactionCount")?,
            "eth_getTransactionCount",
        )
    }

    async fn current_fee_rate(&self) -> Result<u128, LedgerError> {
        let result = self.call("eth_gasPrice", serde_json::json!([])).await?;
        parse_quantity(&result, "eth_gasPrice")
    }

    async fn submit(&self, signed_operation: &[u8]) -> Result<OperationId, LedgerError> {
        let raw = format!("0x{}", hex::encode(signed_operation));
        let result = self
            .call("eth_sendRawTransaction", serde_json::json!([raw]))
            .await
            .map_err(|e| match e {
                LedgerError::Rpc { message, .. } => LedgerError::Rejected {
                    reason: RejectionReason::classify(&message),
                    message,
                },
                other => other,
            })?;

        result
            .as_str()
            .ok_or_else(|| LedgerError::InvalidResponse("eth_sendRawTransaction の結果が文字列ではありません".into()))?
            .parse()
    }

    async fn poll_receipt(&self, operation_id: &OperationId) -> Result<ReceiptStatus, LedgerError> {
        let result = self
            .call(
                "eth_getTransactionReceipt",
                serde_json::json!([operation_id.to_string()]),
            )
            .await?;
        if result.is_null() {
            return Ok(ReceiptStatus::Pending);
        }

        let receipt: RpcReceipt = serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(format!("受領証のパースに失敗: {e}")))?;

        Ok(ReceiptStatus::Terminal(Receipt {
            succeeded: parse_hex_str(&receipt.status, "status")? == 1,
            block_number: to_u64(parse_hex_str(&receipt.block_number, "blockNumber")?, "blockNumber")?,
            gas_used: to_u64(parse_hex_str(&receipt.gas_used, "gasUsed")?, "gasUsed")?,
        }))
    }
}

/// JSON-RPCの数量（0x付き16進文字列）を解釈する。
fn parse_quantity(value: &serde_json::Value, what: &str) -> Result<u128, LedgerError> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::InvalidResponse(format!("{what} の結果が文字列ではありません: {value}")))?;
    parse_hex_str(s, what)
}

fn parse_hex_str(s: &str, what: &str) -> Result<u128, LedgerError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::InvalidResponse(format!("{what} が0xで始まっていません: {s}")))?;
    u128::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::InvalidResponse(format!("{what} の16進パースに失敗 ({s}): {e}")))
}

fn to_u64(value: u128, what: &str) -> Result<u64, LedgerError> {
    u64::try_from(value)
        .map_err(|_| LedgerError::InvalidResponse(format!("{what} がu64の範囲外です: {value}")))
}
