//! # Docsign Relay Core
//!
//! 単一の署名鍵を保持し、文書ハッシュの署名記録・無効化をレジャーに中継するコア。
//!
//! ## 処理フロー
//! 1. リクエストを検証する（`validator`）
//! 2. 鍵のロック下でシーケンス番号を取得し、オペレーションを構築・署名・送信する（`sequencer`）
//! 3. ロック外で受領証をポーリングし、成功/リバートを分類する（`tracker`）
//!
//! `relay::DocumentRelay` がこの流れを1リクエスト分まとめる。

pub mod blockchain;
pub mod builder;
pub mod config;
pub mod credential;
pub mod error;
pub mod ledger;
pub mod relay;
pub mod sequencer;
pub mod tracker;
pub mod validator;

pub use builder::{Action, OperationBuilder, UnknownAction, UnsignedOperation};
pub use config::{ConfigError, LedgerMode, RelayConfig};
pub use credential::{Credential, CredentialError, CredentialStore};
pub use error::RelayError;
pub use ledger::{
    JsonRpcLedger, LedgerClient, LedgerError, MockBehavior, MockLedger, OperationId, RejectionReason,
};
pub use relay::DocumentRelay;
pub use sequencer::{SequencerError, SubmittedOperation, TransactionSequencer};
pub use tracker::{ConfirmationTracker, OperationOutcome, TerminalState, TrackerError};
pub use validator::{validate, PayloadField, SignedRequestPayload, ValidationError};
