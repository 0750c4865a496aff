//! # レジャークライアント
//!
//! 外部レジャーを不透明なサービスとして扱うための抽象インターフェース。
//!
//! ## 実装
//! - `JsonRpcLedger`: EVM互換ノードのJSON-RPCに接続する（本番用）
//! - `MockLedger`: プロセス内で動くスタブ（テスト・ローカル開発用）

pub mod json_rpc;
pub mod mock;

pub use json_rpc::{http_client, JsonRpcLedger};
pub use mock::{MockBehavior, MockLedger};

use std::fmt;
use std::str::FromStr;

use docsign_crypto::Address;

/// レジャーが割り当てるオペレーションID（トランザクションハッシュ）。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(pub [u8; 32]);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({self})")
    }
}

impl FromStr for OperationId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut out = [0u8; 32];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|e| LedgerError::InvalidResponse(format!("トランザクションハッシュが不正 ({s}): {e}")))?;
        Ok(Self(out))
    }
}

/// 終端状態の受領証。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// 実行が成功したか（falseならリバート）
    pub succeeded: bool,
    /// 取り込まれたブロック番号
    pub block_number: u64,
    /// 消費したガス量
    pub gas_used: u64,
}

/// `poll_receipt` の結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// まだブロックに取り込まれていない
    Pending,
    /// 終端状態に到達した
    Terminal(Receipt),
}

/// 送信拒否の分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// シーケンス番号が古い（別の送信が先に取り込まれた）
    StaleSequence,
    /// 手数料不足・残高不足
    InsufficientFee,
    /// エンコードが不正
    MalformedEncoding,
    /// その他
    Other,
}

impl RejectionReason {
    /// ノードのエラーメッセージから拒否理由を分類する。
    pub fn classify(message: &str) -> Self {
        let m = message.to_ascii_lowercase();
        if m.contains("nonce too low")
            || m.contains("nonce too high")
            || m.contains("already known")
            || m.contains("replacement transaction")
            || m.contains("invalid nonce")
        {
            Self::StaleSequence
        } else if m.contains("insufficient funds")
            || m.contains("underpriced")
            || m.contains("fee too low")
            || m.contains("gas price")
            || m.contains("intrinsic gas")
        {
            Self::InsufficientFee
        } else if m.contains("rlp")
            || m.contains("decode")
            || m.contains("invalid sender")
            || m.contains("invalid transaction")
        {
            Self::MalformedEncoding
        } else {
            Self::Other
        }
    }

    /// 呼び出し側がシーケンス番号を取り直して再試行できるか。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleSequence)
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StaleSequence => "シーケンス番号が古い",
            Self::InsufficientFee => "手数料不足",
            Self::MalformedEncoding => "エンコード不正",
            Self::Other => "その他",
        };
        f.write_str(s)
    }
}

/// レジャー通信のエラー型
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    /// 接続・通信の失敗
    #[error("レジャーに接続できません: {0}")]
    Connectivity(String),
    /// 送信がノードに拒否された
    #[error("送信が拒否されました（{reason}）: {message}")]
    Rejected {
        /// 分類
        reason: RejectionReason,
        /// ノードのメッセージ
        message: String,
    },
    /// 送信以外のRPCがエラーを返した
    #[error("RPCエラー {code}: {message}")]
    Rpc {
        /// エラーコード
        code: i64,
        /// ノードのメッセージ
        message: String,
    },
    /// レスポンスを解釈できない
    #[error("レジャーのレスポンスが不正: {0}")]
    InvalidResponse(String),
}

/// レジャーの抽象インターフェース。
///
/// すべてのメソッドはネットワーク呼び出しで、1回の問い合わせで戻る。
/// 待機・再試行は呼び出し側の責務。
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// 接続時に取得したチェーンID
    fn chain_id(&self) -> u64;

    /// アドレスの次に使うシーケンス番号（保留中のトランザクションを含む）
    async fn current_sequence_number(&self, address: &Address) -> Result<u64, LedgerError>;

    /// 現在の推奨ガス単価
    async fn current_fee_rate(&self) -> Result<u128, LedgerError>;

    /// 署名済みトランザクションを送信し、オペレーションIDを返す。
    async fn submit(&self, signed_operation: &[u8]) -> Result<OperationId, LedgerError>;

    /// 受領証を1回だけ問い合わせる。
    async fn poll_receipt(&self, operation_id: &OperationId) -> Result<ReceiptStatus, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rejections() {
        assert_eq!(RejectionReason::classify("nonce too low"), RejectionReason::StaleSequence);
        assert_eq!(
            RejectionReason::classify("replacement transaction underpriced"),
            RejectionReason::StaleSequence
        );
        assert_eq!(
            RejectionReason::classify("insufficient funds for gas * price + value"),
            RejectionReason::InsufficientFee
        );
        assert_eq!(
            RejectionReason::classify("transaction underpriced"),
            RejectionReason::InsufficientFee
        );
        assert_eq!(
            RejectionReason::classify("rlp: expected input list"),
            RejectionReason::MalformedEncoding
        );
        assert_eq!(RejectionReason::classify("execution aborted"), RejectionReason::Other);
        assert!(RejectionReason::StaleSequence.is_retryable());
        assert!(!RejectionReason::InsufficientFee.is_retryable());
    }

    #[test]
    fn test_operation_id_display_and_parse() {
        let id = OperationId([0xab; 32]);
        let s = id.to_string();
        assert_eq!(s.len(), 66);
        assert_eq!(s.parse::<OperationId>().unwrap(), id);
        assert!("0x1234".parse::<OperationId>().is_err());
    }
}
