//! # リレーのエラー分類
//!
//! パイプライン全体の失敗を、呼び出し側がパターンマッチできる種類に分類する。

use crate::credential::CredentialError;
use crate::ledger::{LedgerError, OperationId, RejectionReason};
use crate::sequencer::SequencerError;
use crate::tracker::{OperationOutcome, TrackerError};
use crate::validator::ValidationError;

/// リレー処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// リクエストの形式が不正（レジャーには触れていない）
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// レジャーとの通信に失敗
    #[error("レジャーとの通信に失敗: {message}")]
    LedgerConnectivity {
        message: String,
        /// 取得済みならオペレーションID
        operation_id: Option<OperationId>,
    },

    /// 送信がノードに拒否された
    #[error("送信が拒否されました（{reason}）: {message}")]
    SubmissionRejected {
        reason: RejectionReason,
        message: String,
    },

    /// 取り込まれたが実行がリバートした
    #[error("オペレーションがリバートしました: {}", .0.operation_id)]
    OperationReverted(OperationOutcome),

    /// 受領確認を打ち切った（オペレーション自体は失敗していない）
    #[error("受領確認を打ち切りました: {operation_id}")]
    PollTimeout { operation_id: OperationId },

    /// 署名鍵の読み込み・保存に失敗
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// 署名に失敗
    #[error("署名に失敗: {0}")]
    Signing(docsign_crypto::CryptoError),
}

impl RelayError {
    /// リクエスト側に原因がある（400系）か。
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::OperationReverted(_))
    }

    /// シーケンス番号を取り直して再試行できるか。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SubmissionRejected { reason, .. } if reason.is_retryable())
    }

    /// 取得済みのオペレーションID（手動での突き合わせ用）
    pub fn operation_id(&self) -> Option<OperationId> {
        match self {
            Self::LedgerConnectivity { operation_id, .. } => *operation_id,
            Self::OperationReverted(outcome) => Some(outcome.operation_id),
            Self::PollTimeout { operation_id } => Some(*operation_id),
            _ => None,
        }
    }

    fn from_ledger(error: LedgerError, operation_id: Option<OperationId>) -> Self {
        match error {
            LedgerError::Rejected { reason, message } => Self::SubmissionRejected { reason, message },
            other => Self::LedgerConnectivity {
                message: other.to_string(),
                operation_id,
            },
        }
    }
}

impl From<SequencerError> for RelayError {
    fn from(error: SequencerError) -> Self {
        match error {
            SequencerError::Ledger(e) => Self::from_ledger(e, None),
            SequencerError::Signing(e) => Self::Signing(e),
        }
    }
}

impl From<TrackerError> for RelayError {
    fn from(error: TrackerError) -> Self {
        match error {
            TrackerError::PollTimeout { operation_id } => Self::PollTimeout { operation_id },
            TrackerError::Ledger {
                operation_id,
                source,
            } => Self::from_ledger(source, Some(operation_id)),
        }
    }
}
