//! # モックレジャー
//!
//! ノードなしで動作するプロセス内レジャー。テストとローカル開発（`LEDGER_MODE=mock`）で使う。
//! 送信されたトランザクションを実際にデコード・署名検証し、ノードと同じように
//! 古い/飛んだシーケンス番号を拒否する。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use docsign_crypto::Address;

use super::{LedgerClient, LedgerError, OperationId, Receipt, ReceiptStatus, RejectionReason};
use crate::blockchain::evm_tx::{transaction_hash, DecodedTransaction};

/// モックのチェーンID
pub const MOCK_CHAIN_ID: u64 = 31337;

/// モックが返すガス単価（1 gwei）
pub const MOCK_FEE_RATE: u128 = 1_000_000_000;

/// モックが報告する消費ガス
pub const MOCK_GAS_USED: u64 = 52_000;

/// 受領証の振る舞い。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// 取り込み後、常に成功
    Confirm,
    /// 取り込み後、常にリバート
    Revert,
    /// いつまでも終端状態にならない
    NeverTerminal,
}

#[derive(Default)]
struct MockState {
    /// アドレスごとの次のシーケンス番号
    nonces: HashMap<Address, u64>,
    /// 受理したトランザクション（受理順）
    submitted: Vec<DecodedTransaction>,
    /// オペレーションIDごとのブロック番号と残り保留ポーリング回数
    included: HashMap<OperationId, (u64, u32)>,
    /// 直近のブロック番号
    block_number: u64,
    /// 次の送信を拒否するメッセージ
    reject_next: Option<String>,
    /// 設定されている間、受領証の照会はこのメッセージで失敗する
    poll_failure: Option<String>,
}

/// プロセス内のモックレジャー。
pub struct MockLedger {
    behavior: MockBehavior,
    chain_id: u64,
    starting_nonce: u64,
    pending_polls: u32,
    calls: AtomicUsize,
    state: Mutex<MockState>,
}

impl MockLedger {
    /// 指定の振る舞いでモックを作成する。
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            chain_id: MOCK_CHAIN_ID,
            starting_nonce: 0,
            pending_polls: 0,
            calls: AtomicUsize::new(0),
            state: Mutex::new(MockState::default()),
        }
    }

    /// 未使用アドレスの初期シーケンス番号を設定する。
    pub fn with_starting_nonce(mut self, nonce: u64) -> Self {
        self.starting_nonce = nonce;
        self
    }

    /// 終端状態を返すまでに`Pending`を返す回数を設定する。
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// 次の1回の送信を、指定メッセージで拒否させる。
    pub fn reject_next_submission(&self, message: impl Into<String>) {
        self.state().reject_next = Some(message.into());
    }

    /// 以降の受領証の照会を、指定メッセージの接続エラーで失敗させる。
    pub fn fail_polls_with(&self, message: impl Into<String>) {
        self.state().poll_failure = Some(message.into());
    }

    /// 外部からの送信をシミュレートし、アドレスのシーケンス番号を進める。
    pub fn advance_nonce(&self, address: &Address, by: u64) {
        let starting = self.starting_nonce;
        let mut state = self.state();
        *state.nonces.entry(*address).or_insert(starting) += by;
    }

    /// すべてのレジャー呼び出し回数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 受理したトランザクション（受理順）
    pub fn submitted(&self) -> Vec<DecodedTransaction> {
        self.state().submitted.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn rejected(message: &str) -> LedgerError {
        LedgerError::Rejected {
            reason: RejectionReason::classify(message),
            message: message.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LedgerClient for MockLedger {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn current_sequence_number(&self, address: &Address) -> Result<u64, LedgerError> {
        self.record_call();
        Ok(self
            .state()
            .nonces
            .get(address)
            .copied()
            .unwrap_or(self.starting_nonce))
    }

    async fn current_fee_rate(&self) -> Result<u128, LedgerError> {
        self.record_call();
        Ok(MOCK_FEE_RATE)
    }

    async fn submit(&self, signed_operation: &[u8]) -> Result<OperationId, LedgerError> {
        self.record_call();

        let decoded = DecodedTransaction::decode(signed_operation)
            .map_err(|e| Self::rejected(&format!("rlp: {e}")))?;
        if decoded.transaction.chain_id != self.chain_id {
            return Err(Self::rejected("invalid sender: chain id mismatch"));
        }
        let sender = decoded
            .recover_sender()
            .map_err(|e| Self::rejected(&format!("invalid sender: {e}")))?;

        let starting = self.starting_nonce;
        let mut state = self.state();
        if let Some(message) = state.reject_next.take() {
            return Err(Self::rejected(&message));
        }

        let expected = *state.nonces.entry(sender).or_insert(starting);
        let nonce = decoded.transaction.nonce;
        if nonce < expected {
            return Err(Self::rejected("nonce too low"));
        }
        if nonce > expected {
            return Err(Self::rejected("nonce too high"));
        }

        let operation_id = OperationId(transaction_hash(signed_operation));
        state.nonces.insert(sender, expected + 1);
        state.block_number += 1;
        let block = state.block_number;
        state.included.insert(operation_id, (block, self.pending_polls));
        state.submitted.push(decoded);
        Ok(operation_id)
    }

    async fn poll_receipt(&self, operation_id: &OperationId) -> Result<ReceiptStatus, LedgerError> {
        self.record_call();
        let mut state = self.state();
        if let Some(message) = &state.poll_failure {
            return Err(LedgerError::Connectivity(message.clone()));
        }
        if self.behavior == MockBehavior::NeverTerminal {
            return Ok(ReceiptStatus::Pending);
        }

        let Some((block_number, remaining)) = state.included.get_mut(operation_id) else {
            return Ok(ReceiptStatus::Pending);
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(ReceiptStatus::Pending);
        }

        Ok(ReceiptStatus::Terminal(Receipt {
            succeeded: self.behavior == MockBehavior::Confirm,
            block_number: *block_number,
            gas_used: MOCK_GAS_USED,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::evm_tx::LegacyTransaction;
    use docsign_crypto::{generate_signing_key, sign_prehash, Secp256k1SigningKey};

    fn signed_raw(key: &Secp256k1SigningKey, nonce: u64, chain_id: u64) -> Vec<u8> {
        let tx = LegacyTransaction {
            nonce,
            gas_price: MOCK_FEE_RATE,
            gas_limit: 500_000,
            to: Address([0x11; 20]),
            data: vec![1, 2, 3],
            chain_id,
        };
        let sig = sign_prehash(key, &tx.signing_hash()).unwrap();
        tx.encode_signed(&sig)
    }

    #[tokio::test]
    async fn test_submit_enforces_nonce_order() {
        let ledger = MockLedger::new(MockBehavior::Confirm).with_starting_nonce(5);
        let key = generate_signing_key();
        let address = Address::from_verifying_key(key.verifying_key());

        assert_eq!(ledger.current_sequence_number(&address).await.unwrap(), 5);

        let err = ledger.submit(&signed_raw(&key, 6, MOCK_CHAIN_ID)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { .. }));

        ledger.submit(&signed_raw(&key, 5, MOCK_CHAIN_ID)).await.unwrap();
        assert_eq!(ledger.current_sequence_number(&address).await.unwrap(), 6);

        let err = ledger.submit(&signed_raw(&key, 5, MOCK_CHAIN_ID)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected {
                reason: RejectionReason::StaleSequence,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_submit_rejects_garbage_and_wrong_chain() {
        let ledger = MockLedger::new(MockBehavior::Confirm);
        let err = ledger.submit(&[0x01, 0x02]).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected {
                reason: RejectionReason::MalformedEncoding,
                ..
            }
        ));

        let key = generate_signing_key();
        let err = ledger.submit(&signed_raw(&key, 0, 1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_receipts_follow_behavior() {
        let key = generate_signing_key();

        let confirm = MockLedger::new(MockBehavior::Confirm).with_pending_polls(1);
        let id = confirm.submit(&signed_raw(&key, 0, MOCK_CHAIN_ID)).await.unwrap();
        assert_eq!(confirm.poll_receipt(&id).await.unwrap(), ReceiptStatus::Pending);
        match confirm.poll_receipt(&id).await.unwrap() {
            ReceiptStatus::Terminal(r) => {
                assert!(r.succeeded);
                assert_eq!(r.block_number, 1);
                assert_eq!(r.gas_used, MOCK_GAS_USED);
            }
            ReceiptStatus::Pending => panic!("expected terminal receipt"),
        }

        let revert = MockLedger::new(MockBehavior::Revert);
        let id = revert.submit(&signed_raw(&key, 0, MOCK_CHAIN_ID)).await.unwrap();
        assert!(matches!(
            revert.poll_receipt(&id).await.unwrap(),
            ReceiptStatus::Terminal(Receipt { succeeded: false, .. })
        ));

        let never = MockLedger::new(MockBehavior::NeverTerminal);
        let id = never.submit(&signed_raw(&key, 0, MOCK_CHAIN_ID)).await.unwrap();
        assert_eq!(never.poll_receipt(&id).await.unwrap(), ReceiptStatus::Pending);
        assert_eq!(never.call_count(), 2);
    }

    #[tokio::test]
    async fn test_reject_next_submission_is_one_shot() {
        let ledger = MockLedger::new(MockBehavior::Confirm);
        let key = generate_signing_key();
        ledger.reject_next_submission("insufficient funds for gas * price + value");

        let err = ledger.submit(&signed_raw(&key, 0, MOCK_CHAIN_ID)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected {
                reason: RejectionReason::InsufficientFee,
                ..
            }
        ));
        ledger.submit(&signed_raw(&key, 0, MOCK_CHAIN_ID)).await.unwrap();
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_polls_return_connectivity_error() {
        let ledger = MockLedger::new(MockBehavior::Confirm);
        let key = generate_signing_key();
        let id = ledger.submit(&signed_raw(&key, 0, MOCK_CHAIN_ID)).await.unwrap();

        ledger.fail_polls_with("connection reset by peer");
        for _ in 0..2 {
            match ledger.poll_receipt(&id).await {
                Err(LedgerError::Connectivity(message)) => {
                    assert_eq!(message, "connection reset by peer")
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }
}
