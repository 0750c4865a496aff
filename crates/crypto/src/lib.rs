//! # Docsign Relay 暗号処理
//!
//! リレー鍵の生成・署名と、レジャー上の識別子（アドレス）の導出を提供する。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | 署名 | secp256k1 ECDSA（RFC 6979、low-S、リカバリID付き） |
//! | ハッシュ | Keccak-256 |
//! | アドレス | Keccak-256(非圧縮公開鍵)の下位20バイト、EIP-55表記 |

mod address;

pub use address::{Address, ADDRESS_LEN};
pub use k256::ecdsa::{SigningKey as Secp256k1SigningKey, VerifyingKey as Secp256k1VerifyingKey};

use k256::ecdsa::{RecoveryId, Signature};
use sha3::{Digest, Keccak256};

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// 秘密鍵が32バイトでない、またはスカラー範囲外
    #[error("秘密鍵が不正です")]
    InvalidPrivateKey,
    /// 署名生成に失敗
    #[error("署名生成に失敗しました")]
    SigningFailed,
    /// 署名のバイト列が不正
    #[error("署名が不正です")]
    InvalidSignature,
    /// 署名から公開鍵を復元できなかった
    #[error("公開鍵の復元に失敗しました")]
    RecoveryFailed,
    /// アドレスの形式が不正
    #[error("アドレスが不正です: {0}")]
    InvalidAddress(String),
}

/// リカバリID付きのsecp256k1署名。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// r成分（ビッグエンディアン）
    pub r: [u8; 32],
    /// s成分（ビッグエンディアン、low-S正規化済み）
    pub s: [u8; 32],
    /// リカバリID（0 または 1）
    pub recovery_id: u8,
}

/// Keccak-256ハッシュ計算。
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// OSの乱数源から新しい署名鍵を生成する。
pub fn generate_signing_key() -> Secp256k1SigningKey {
    Secp256k1SigningKey::random(&mut rand::rngs::OsRng)
}

/// 32バイトの秘密鍵から署名鍵を復元する。
pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<Secp256k1SigningKey, CryptoError> {
    if bytes.len() != 32 {
        return Err(CryptoError::InvalidPrivateKey);
    }
    Secp256k1SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)
}

/// 32バイトのダイジェストに直接署名する（プリハッシュ署名）。
pub fn sign_prehash(
    signing_key: &Secp256k1SigningKey,
    digest: &[u8; 32],
) -> Result<RecoverableSignature, CryptoError> {
    let (signature, recovery_id): (Signature, RecoveryId) = signing_key
        .sign_prehash_recoverable(digest)
        .map_err(|_| CryptoError::SigningFailed)?;
    let (r, s) = signature.split_bytes();
    Ok(RecoverableSignature {
        r: r.into(),
        s: s.into(),
        recovery_id: recovery_id.to_byte(),
    })
}

/// 署名とダイジェストから署名者のアドレスを復元する。
pub fn recover_address(
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> Result<Address, CryptoError> {
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);
    let sig = Signature::from_slice(&rs).map_err(|_| CryptoError::InvalidSignature)?;
    let recid = RecoveryId::from_byte(signature.recovery_id).ok_or(CryptoError::InvalidSignature)?;
    let verifying_key = Secp256k1VerifyingKey::recover_from_prehash(digest, &sig, recid)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(Address::from_verifying_key(&verifying_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_signing_key_from_bytes_rejects_bad_input() {
        assert!(signing_key_from_bytes(&[0u8; 31]).is_err());
        // ゼロはスカラー範囲外
        assert!(signing_key_from_bytes(&[0u8; 32]).is_err());
        assert!(signing_key_from_bytes(&[0xffu8; 32]).is_err());
    }

    #[test]
    fn test_sign_and_recover() {
        let key = generate_signing_key();
        let expected = Address::from_verifying_key(key.verifying_key());
        let digest = keccak256(b"docsign");

        let sig = sign_prehash(&key, &digest).unwrap();
        assert!(sig.recovery_id <= 1);
        assert_eq!(recover_address(&digest, &sig).unwrap(), expected);

        // 別のダイジェストでは別アドレスが復元される
        let other = keccak256(b"other");
        assert_ne!(recover_address(&other, &sig).unwrap(), expected);
    }

    #[test]
    fn test_signature_is_deterministic() {
        let key = signing_key_from_bytes(&[7u8; 32]).unwrap();
        let digest = keccak256(b"same message");
        assert_eq!(
            sign_prehash(&key, &digest).unwrap(),
            sign_prehash(&key, &digest).unwrap()
        );
    }
}
