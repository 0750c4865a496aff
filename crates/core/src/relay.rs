//! # リレーパイプライン
//!
//! 検証 → 順序付け（構築・署名・送信） → 受領確認 を1リクエスト分つなぐ。
//! 受領確認は鍵のロック外で行うため、複数リクエストの確認待ちは重なってよい。

use std::sync::Arc;
use std::time::Duration;

use docsign_crypto::Address;
use docsign_types::SignDocumentRequest;

use crate::builder::{Action, OperationBuilder};
use crate::config::RelayConfig;
use crate::credential::Credential;
use crate::error::RelayError;
use crate::ledger::LedgerClient;
use crate::sequencer::TransactionSequencer;
use crate::tracker::{ConfirmationTracker, OperationOutcome, TerminalState};
use crate::validator;

/// 署名鍵を保持し、文書署名オペレーションを中継するサービス。
pub struct DocumentRelay {
    sequencer: TransactionSequencer,
    tracker: ConfirmationTracker,
    confirmation_timeout: Option<Duration>,
}

impl DocumentRelay {
    pub fn new(credential: Credential, ledger: Arc<dyn LedgerClient>, config: &RelayConfig) -> Self {
        let builder = OperationBuilder::new(config.contract_address, config.gas_limit, ledger.chain_id());
        Self {
            sequencer: TransactionSequencer::new(credential, ledger.clone(), builder),
            tracker: ConfirmationTracker::new(ledger, config.poll_interval),
            confirmation_timeout: config.confirmation_timeout,
        }
    }

    /// リレーのアドレス
    pub fn address(&self) -> Address {
        self.sequencer.address()
    }

    /// 1リクエストを処理する。リバートは`RelayError::OperationReverted`として返す。
    pub async fn process(
        &self,
        action: Action,
        request: &SignDocumentRequest,
    ) -> Result<OperationOutcome, RelayError> {
        let payload = validator::validate(request).inspect_err(|e| {
            tracing::info!(%action, error = %e, "リクエストの検証に失敗しました");
        })?;

        let submitted = self.sequencer.sign_and_submit(action, &payload).await?;

        let outcome = self
            .tracker
            .await_terminal(submitted.operation_id, self.confirmation_timeout)
            .await?;

        match outcome.terminal_state {
            TerminalState::Confirmed => Ok(outcome),
            TerminalState::Reverted => Err(RelayError::OperationReverted(outcome)),
        }
    }
}
