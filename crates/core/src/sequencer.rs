//! # トランザクション順序付け
//!
//! 署名鍵ごとに「シーケンス番号取得 → 構築 → 署名 → 送信」を直列化し、
//! 並行リクエスト下でもシーケンス番号の重複・欠番が起きないようにする。
//!
//! ## 排他区間
//! 鍵とシーケンス番号キャッシュは1つの`tokio::sync::Mutex`に入っている。
//! ガス単価の取得はロック外、受領確認のポーリングはこのモジュールの外で行う。
//!
//! ## シーケンス番号
//! ノードの保留ビュー（pending）とローカルキャッシュの大きい方を使う。
//! 送信に失敗したらキャッシュを捨て、次の呼び出しはノードから読み直す。

use std::sync::Arc;

use docsign_crypto::{sign_prehash, Address, CryptoError};
use tokio::sync::Mutex;

use crate::builder::{Action, OperationBuilder, UnsignedOperation};
use crate::credential::Credential;
use crate::ledger::{LedgerClient, LedgerError, OperationId};
use crate::validator::SignedRequestPayload;

/// 送信に成功したオペレーション。
#[derive(Debug, Clone)]
pub struct SubmittedOperation {
    /// レジャーが割り当てたID
    pub operation_id: OperationId,
    /// 送信した内容
    pub operation: UnsignedOperation,
}

/// 順序付けのエラー型
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    /// シーケンス番号・ガス単価の取得、または送信に失敗
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// 署名に失敗
    #[error(transparent)]
    Signing(#[from] CryptoError),
}

impl SequencerError {
    /// シーケンス番号を取り直せば再試行できるか。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Ledger(LedgerError::Rejected { reason, .. }) if reason.is_retryable())
    }
}

struct SequencerState {
    credential: Credential,
    /// 次に使うシーケンス番号（直前の送信成功時のみ有効）
    next_sequence: Option<u64>,
}

/// 鍵を排他的に所有し、署名と送信を直列化する。
pub struct TransactionSequencer {
    ledger: Arc<dyn LedgerClient>,
    builder: OperationBuilder,
    address: Address,
    state: Mutex<SequencerState>,
}

impl TransactionSequencer {
    pub fn new(credential: Credential, ledger: Arc<dyn LedgerClient>, builder: OperationBuilder) -> Self {
        Self {
            ledger,
            builder,
            address: credential.address(),
            state: Mutex::new(SequencerState {
                credential,
                next_sequence: None,
            }),
        }
    }

    /// リレーのアドレス
    pub fn address(&self) -> Address {
        self.address
    }

    /// オペレーションを構築・署名・送信する。自動再試行はしない。
    pub async fn sign_and_submit(
        &self,
        action: Action,
        payload: &SignedRequestPayload,
    ) -> Result<SubmittedOperation, SequencerError> {
        let fee_rate = self.ledger.current_fee_rate().await?;

        let mut state = self.state.lock().await;

        let pending = match self.ledger.current_sequence_number(&self.address).await {
            Ok(pending) => pending,
            Err(e) => {
                state.next_sequence = None;
                return Err(e.into());
            }
        };
        let sequence_number = state
            .next_sequence
            .map_or(pending, |cached| cached.max(pending));

        let operation = self
            .builder
            .build(action, payload, sequence_number, fee_rate, self.address);
        let signature = sign_prehash(state.credential.signing_key(), &operation.signing_hash())?;
        let raw = operation.encode_signed(&signature);

        match self.ledger.submit(&raw).await {
            Ok(operation_id) => {
                state.next_sequence = Some(sequence_number + 1);
                tracing::info!(
                    %operation_id,
                    %action,
                    nonce = sequence_number,
                    "オペレーションを送信しました"
                );
                Ok(SubmittedOperation {
                    operation_id,
                    operation,
                })
            }
            Err(e) => {
                state.next_sequence = None;
                tracing::warn!(%action, nonce = sequence_number, error = %e, "送信に失敗しました");
                Err(e.into())
            }
        }
    }
}
