//! # オペレーション構築
//!
//! 検証済みペイロードから、レジャーに送る未署名オペレーションを組み立てる。
//! 副作用のない純粋関数のみ。

use std::fmt;
use std::str::FromStr;

use docsign_crypto::{Address, RecoverableSignature};

use crate::blockchain::abi::{encode_document_call, function_selector};
use crate::blockchain::evm_tx::LegacyTransaction;
use crate::validator::SignedRequestPayload;

/// コントラクトがサポートする2つのアクション。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// 署名を記録する
    Record,
    /// 署名を無効化する
    Invalidate,
}

impl Action {
    /// コントラクト関数のシグネチャ
    pub fn function_signature(&self) -> &'static str {
        match self {
            Self::Record => "signDocument(bytes32,address,bytes)",
            Self::Invalidate => "invalidateSignature(bytes32,address,bytes)",
        }
    }

    /// 4バイトの関数セレクタ
    pub fn selector(&self) -> [u8; 4] {
        function_selector(self.function_signature())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record => f.write_str("record"),
            Self::Invalidate => f.write_str("invalidate"),
        }
    }
}

/// 未知のアクション名
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("未知のアクションです: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "record" | "sign" => Ok(Self::Record),
            "invalidate" => Ok(Self::Invalidate),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// 署名前のオペレーション。リクエストごとに新しく作られ、再利用されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedOperation {
    pub action: Action,
    pub document_hash: [u8; 32],
    pub signer: Address,
    pub signature_blob: Vec<u8>,
    pub sequence_number: u64,
    pub fee_rate: u128,
    pub gas_limit: u64,
    /// リレー自身のアドレス
    pub sender: Address,
    /// 署名記録コントラクト
    pub contract: Address,
    pub chain_id: u64,
}

impl UnsignedOperation {
    /// コントラクト呼び出しデータ
    pub fn calldata(&self) -> Vec<u8> {
        encode_document_call(
            self.action.selector(),
            &self.document_hash,
            &self.signer,
            &self.signature_blob,
        )
    }

    /// 対応するレガシートランザクション
    pub fn to_transaction(&self) -> LegacyTransaction {
        LegacyTransaction {
            nonce: self.sequence_number,
            gas_price: self.fee_rate,
            gas_limit: self.gas_limit,
            to: self.contract,
            data: self.calldata(),
            chain_id: self.chain_id,
        }
    }

    /// 署名対象ハッシュ
    pub fn signing_hash(&self) -> [u8; 32] {
        self.to_transaction().signing_hash()
    }

    /// 署名を適用した送信用バイト列
    pub fn encode_signed(&self, signature: &RecoverableSignature) -> Vec<u8> {
        self.to_transaction().encode_signed(signature)
    }
}

/// デプロイ単位の定数を保持するビルダー。
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    contract: Address,
    gas_limit: u64,
    chain_id: u64,
}

impl OperationBuilder {
    pub fn new(contract: Address, gas_limit: u64, chain_id: u64) -> Self {
        Self {
            contract,
            gas_limit,
            chain_id,
        }
    }

    /// 未署名オペレーションを構築する。ガス上限は見積もらず固定値を使う。
    pub fn build(
        &self,
        action: Action,
        payload: &SignedRequestPayload,
        sequence_number: u64,
        fee_rate: u128,
        sender: Address,
    ) -> UnsignedOperation {
        UnsignedOperation {
            action,
            document_hash: payload.document_hash,
            signer: payload.signer,
            signature_blob: payload.signature_blob.clone(),
            sequence_number,
            fee_rate,
            gas_limit: self.gas_limit,
            sender,
            contract: self.contract,
            chain_id: self.chain_id,
        }
    }
}
