//! # 受領確認の追跡
//!
//! 送信済みオペレーションが終端状態に達するまで受領証をポーリングし、結果を分類する。
//! 監視をやめてもオペレーション自体は取り消されない。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::ledger::{LedgerClient, LedgerError, OperationId, ReceiptStatus};

/// 終端状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// 成功
    Confirmed,
    /// ブロックに取り込まれたが実行がリバートした
    Reverted,
}

/// オペレーションの最終結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub operation_id: OperationId,
    pub terminal_state: TerminalState,
    /// 取り込まれたブロック番号
    pub block_reference: u64,
    /// 消費したガス量
    pub fee_consumed: u64,
}

/// 追跡のエラー型
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// 期限までに終端状態にならなかった（オペレーションは後で確定しうる）
    #[error("受領確認を打ち切りました: {operation_id}")]
    PollTimeout {
        /// 監視していたオペレーション
        operation_id: OperationId,
    },
    /// ポーリング中のレジャーエラー
    #[error("受領証の取得に失敗 ({operation_id}): {source}")]
    Ledger {
        /// 監視していたオペレーション
        operation_id: OperationId,
        /// 原因
        source: LedgerError,
    },
}

/// 受領証をポーリングするトラッカー。ロックを持たないため並行に使える。
#[derive(Clone)]
pub struct ConfirmationTracker {
    ledger: Arc<dyn LedgerClient>,
    poll_interval: Duration,
}

impl ConfirmationTracker {
    pub fn new(ledger: Arc<dyn LedgerClient>, poll_interval: Duration) -> Self {
        Self {
            ledger,
            poll_interval,
        }
    }

    /// 終端状態まで待つ。`deadline`を渡すと、経過後に`PollTimeout`を返す。
    pub async fn await_terminal(
        &self,
        operation_id: OperationId,
        deadline: Option<Duration>,
    ) -> Result<OperationOutcome, TrackerError> {
        match deadline {
            Some(deadline) => {
                self.watch_until(operation_id, tokio::time::sleep(deadline))
                    .await
            }
            None => {
                self.watch_until(operation_id, std::future::pending::<()>())
                    .await
            }
        }
    }

    /// `cancel`が完了するまで終端状態を待つ。
    pub async fn watch_until<F>(
        &self,
        operation_id: OperationId,
        cancel: F,
    ) -> Result<OperationOutcome, TrackerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let mut polls: u64 = 0;

        loop {
            let status = tokio::select! {
                biased;
                _ = &mut cancel => return Err(self.timed_out(operation_id, polls)),
                status = self.ledger.poll_receipt(&operation_id) => status,
            };
            polls += 1;

            match status {
                Ok(ReceiptStatus::Terminal(receipt)) => {
                    let terminal_state = if receipt.succeeded {
                        TerminalState::Confirmed
                    } else {
                        TerminalState::Reverted
                    };
                    tracing::info!(
                        %operation_id,
                        state = ?terminal_state,
                        block = receipt.block_number,
                        gas_used = receipt.gas_used,
                        "オペレーションが終端状態に達しました"
                    );
                    return Ok(OperationOutcome {
                        operation_id,
                        terminal_state,
                        block_reference: receipt.block_number,
                        fee_consumed: receipt.gas_used,
                    });
                }
                Ok(ReceiptStatus::Pending) => {
                    tracing::debug!(%operation_id, polls, "受領証はまだありません");
                }
                Err(source) => {
                    tracing::error!(%operation_id, error = %source, "受領証の取得に失敗しました");
                    return Err(TrackerError::Ledger {
                        operation_id,
                        source,
                    });
                }
            }

            tokio::select! {
                biased;
                _ = &mut cancel => return Err(self.timed_out(operation_id, polls)),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    fn timed_out(&self, operation_id: OperationId, polls: u64) -> TrackerError {
        tracing::warn!(%operation_id, polls, "受領確認を打ち切りました");
        TrackerError::PollTimeout { operation_id }
    }
}
