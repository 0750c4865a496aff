//! # リクエスト検証
//!
//! 受信したリクエストの形式を検証し、型付きのペイロードに変換する。
//! レジャーには一切触れない。

use std::fmt;

use docsign_crypto::Address;
use docsign_types::SignDocumentRequest;

/// 検証済みのリクエストペイロード。1リクエストの間だけ存在する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequestPayload {
    /// 文書ハッシュ（32バイト）
    pub document_hash: [u8; 32],
    /// 署名者のアドレス
    pub signer: Address,
    /// 署名データ
    pub signature_blob: Vec<u8>,
}

/// 検証対象のフィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    DocumentHash,
    SignerIdentifier,
    SignatureBlob,
}

impl fmt::Display for PayloadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DocumentHash => "documentHash",
            Self::SignerIdentifier => "signerIdentifier",
            Self::SignatureBlob => "signatureBlob",
        };
        f.write_str(name)
    }
}

/// 検証エラー。不正なフィールド名を含む。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} が不正です: {reason}")]
pub struct ValidationError {
    /// 不正なフィールド
    pub field: PayloadField,
    /// 理由
    pub reason: String,
}

impl ValidationError {
    fn new(field: PayloadField, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// リクエストを検証する。
///
/// - 3フィールドすべてが存在し空でない
/// - `documentHash` は `0x` + 16進64桁
/// - `signerIdentifier` はEIP-55チェックサム形式
/// - `signatureBlob` は `0x` + 16進1桁以上（奇数桁は先頭に0を補う）
pub fn validate(request: &SignDocumentRequest) -> Result<SignedRequestPayload, ValidationError> {
    let document_hash = required(&request.document_hash, PayloadField::DocumentHash)?;
    let signer = required(&request.signer_identifier, PayloadField::SignerIdentifier)?;
    let signature_blob = required(&request.signature_blob, PayloadField::SignatureBlob)?;

    Ok(SignedRequestPayload {
        document_hash: parse_document_hash(document_hash)?,
        signer: Address::parse_checksummed(signer)
            .map_err(|e| ValidationError::new(PayloadField::SignerIdentifier, e.to_string()))?,
        signature_blob: parse_signature_blob(signature_blob)?,
    })
}

fn required(value: &Option<String>, field: PayloadField) -> Result<&str, ValidationError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::new(field, "必須です")),
    }
}

fn parse_document_hash(raw: &str) -> Result<[u8; 32], ValidationError> {
    let field = PayloadField::DocumentHash;
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ValidationError::new(field, "0xで始まる必要があります"))?;
    if digits.len() != 64 {
        return Err(ValidationError::new(
            field,
            format!("16進64桁が必要です（{}桁）", digits.len()),
        ));
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(digits, &mut out)
        .map_err(|e| ValidationError::new(field, e.to_string()))?;
    Ok(out)
}

fn parse_signature_blob(raw: &str) -> Result<Vec<u8>, ValidationError> {
    let field = PayloadField::SignatureBlob;
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ValidationError::new(field, "0xで始まる必要があります"))?;
    if digits.is_empty() {
        return Err(ValidationError::new(field, "16進が1桁以上必要です"));
    }
    let decoded = if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}"))
    } else {
        hex::decode(digits)
    };
    decoded.map_err(|e| ValidationError::new(field, e.to_string()))
}
