//! # レガシートランザクション（EIP-155）
//!
//! 署名対象ハッシュの計算、署名済みトランザクションのエンコードとデコードを行う。
//! RLPは`rlp`クレートに任せる。

use docsign_crypto::{keccak256, recover_address, Address, CryptoError, RecoverableSignature};
use rlp::{DecoderError, Rlp, RlpStream};

/// 署名前のレガシートランザクション。送金額は常に0。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    /// シーケンス番号（nonce）
    pub nonce: u64,
    /// ガス単価（wei）
    pub gas_price: u128,
    /// ガス上限
    pub gas_limit: u64,
    /// 呼び出し先コントラクト
    pub to: Address,
    /// 呼び出しデータ
    pub data: Vec<u8>,
    /// チェーンID
    pub chain_id: u64,
}

impl LegacyTransaction {
    /// `[nonce, gasPrice, gas, to, value, data]` を9要素リストのストリームに追加する。
    fn stream_common_fields(&self) -> RlpStream {
        let mut stream = RlpStream::new_list(9);
        stream.append(&self.nonce);
        stream.append(&trim_leading_zeros(&self.gas_price.to_be_bytes()).to_vec());
        stream.append(&self.gas_limit);
        stream.append(&self.to.as_bytes().to_vec());
        stream.append(&0u64);
        stream.append(&self.data);
        stream
    }

    /// 署名対象のRLP。`rlp([nonce, gasPrice, gas, to, 0, data, chainId, 0, 0])`
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = self.stream_common_fields();
        stream.append(&self.chain_id);
        stream.append(&0u64);
        stream.append(&0u64);
        stream.out().to_vec()
    }

    /// 署名対象ハッシュ
    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    /// 署名を適用し、送信用のバイト列を返す。`v = recovery_id + 35 + 2 * chainId`
    pub fn encode_signed(&self, signature: &RecoverableSignature) -> Vec<u8> {
        let v = signature.recovery_id as u64 + 35 + 2 * self.chain_id;
        let mut stream = self.stream_common_fields();
        stream.append(&v);
        // 署名成分は先頭ゼロを除いた整数としてエンコードする
        stream.append(&trim_leading_zeros(&signature.r).to_vec());
        stream.append(&trim_leading_zeros(&signature.s).to_vec());
        stream.out().to_vec()
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// 送信済みバイト列のハッシュ（トランザクションID）。
pub fn transaction_hash(raw: &[u8]) -> [u8; 32] {
    keccak256(raw)
}

/// デコード失敗のエラー型
#[derive(Debug, thiserror::Error)]
pub enum TxDecodeError {
    /// RLPとして不正
    #[error("RLPデコードに失敗: {0}")]
    Rlp(#[from] DecoderError),
    /// フィールド数や値が不正
    #[error("トランザクションのフィールドが不正: {0}")]
    InvalidField(String),
    /// 署名から送信者を復元できない
    #[error("送信者の復元に失敗: {0}")]
    Recovery(#[from] CryptoError),
}

/// デコードした署名済みトランザクション。
#[derive(Debug, Clone)]
pub struct DecodedTransaction {
    /// 署名前の内容
    pub transaction: LegacyTransaction,
    /// 署名
    pub signature: RecoverableSignature,
}

impl DecodedTransaction {
    /// 署名済みバイト列をデコードする。
    pub fn decode(raw: &[u8]) -> Result<Self, TxDecodeError> {
        let rlp = Rlp::new(raw);

        // 長さプレフィックスは入力長と突き合わせてから使う
        let info = rlp.payload_info()?;
        if info.total() > raw.len() {
            return Err(DecoderError::RlpIsTooShort.into());
        }
        if info.total() < raw.len() {
            return Err(TxDecodeError::InvalidField(format!(
                "RLPリストの後に{}バイト余分なデータがあります",
                raw.len() - info.total()
            )));
        }
        if !rlp.is_list() {
            return Err(TxDecodeError::InvalidField("RLPリストではありません".into()));
        }
        let item_count = rlp.item_count()?;
        if item_count != 9 {
            return Err(TxDecodeError::InvalidField(format!(
                "フィールド数は9である必要があります: {item_count}"
            )));
        }

        let to: [u8; 20] = rlp
            .val_at::<Vec<u8>>(3)?
            .try_into()
            .map_err(|_| TxDecodeError::InvalidField("toは20バイトである必要があります".into()))?;
        if !rlp.val_at::<Vec<u8>>(4)?.is_empty() {
            return Err(TxDecodeError::InvalidField("送金額は0である必要があります".into()));
        }

        let v: u64 = rlp.val_at(6)?;
        if v < 35 {
            return Err(TxDecodeError::InvalidField(format!(
                "EIP-155形式のvではありません: {v}"
            )));
        }
        let chain_id = (v - 35) / 2;
        let recovery_id = ((v - 35) % 2) as u8;

        let transaction = LegacyTransaction {
            nonce: rlp.val_at(0)?,
            gas_price: decode_u128(&rlp.val_at::<Vec<u8>>(1)?)?,
            gas_limit: rlp.val_at(2)?,
            to: Address(to),
            data: rlp.val_at(5)?,
            chain_id,
        };

        Ok(Self {
            transaction,
            signature: RecoverableSignature {
                r: left_pad(&rlp.val_at::<Vec<u8>>(7)?)?,
                s: left_pad(&rlp.val_at::<Vec<u8>>(8)?)?,
                recovery_id,
            },
        })
    }

    /// 署名から送信者アドレスを復元する。
    pub fn recover_sender(&self) -> Result<Address, TxDecodeError> {
        Ok(recover_address(&self.transaction.signing_hash(), &self.signature)?)
    }
}

fn decode_u128(bytes: &[u8]) -> Result<u128, TxDecodeError> {
    if bytes.len() > 16 || bytes.first() == Some(&0) {
        return Err(TxDecodeError::InvalidField(format!(
            "整数として不正です: 0x{}",
            hex::encode(bytes)
        )));
    }
    let mut buf = [0u8; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(u128::from_be_bytes(buf))
}

fn left_pad(bytes: &[u8]) -> Result<[u8; 32], TxDecodeError> {
    if bytes.len() > 32 {
        return Err(TxDecodeError::InvalidField("署名成分が32バイトを超えています".into()));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}
