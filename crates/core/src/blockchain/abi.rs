//! # コントラクト呼び出しデータ（ABI）
//!
//! 署名記録コントラクトの2関数はいずれも `(bytes32, address, bytes)` を受け取るため、
//! この引数形だけをエンコードする。

use docsign_crypto::{keccak256, Address};

/// ABIの1ワード長
const WORD: usize = 32;

/// 関数シグネチャから4バイトのセレクタを計算する。
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `selector ++ abi.encode(bytes32, address, bytes)` を構築する。
///
/// レイアウト: [hash][address(左ゼロ詰め)][bytesへのオフセット=0x60][長さ][データ(右ゼロ詰め)]
pub fn encode_document_call(
    selector: [u8; 4],
    document_hash: &[u8; 32],
    signer: &Address,
    signature: &[u8],
) -> Vec<u8> {
    let padded_len = signature.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(4 + WORD * 4 + padded_len);

    out.extend_from_slice(&selector);
    out.extend_from_slice(document_hash);
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(signer.as_bytes());
    out.extend_from_slice(&uint_word(3 * WORD as u64));
    out.extend_from_slice(&uint_word(signature.len() as u64));
    out.extend_from_slice(signature);
    out.resize(4 + WORD * 4 + padded_len, 0);
    out
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}
