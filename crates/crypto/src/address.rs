//! # レジャーアドレスとEIP-55チェックサム表記

use std::fmt;
use std::str::FromStr;

use crate::{keccak256, CryptoError, Secp256k1VerifyingKey};

/// アドレスのバイト長
pub const ADDRESS_LEN: usize = 20;

/// 20バイトのレジャーアドレス。`Display`はEIP-55チェックサム表記。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// 公開鍵からアドレスを導出する。
    /// Keccak-256(非圧縮公開鍵から0x04を除いた64バイト)の下位20バイト。
    pub fn from_verifying_key(key: &Secp256k1VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&hash[12..]);
        Self(out)
    }

    /// バイト列を返す。
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// EIP-55チェックサム表記（0x付き）を返す。
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// EIP-55チェックサム表記の文字列だけを受け付けてパースする。
    /// 全小文字・全大文字の表記もチェックサムと一致しなければ拒否する。
    pub fn parse_checksummed(s: &str) -> Result<Self, CryptoError> {
        let address: Address = s.parse()?;
        if address.to_checksum() != s {
            return Err(CryptoError::InvalidAddress(format!(
                "チェックサム表記ではありません: {s}"
            )));
        }
        Ok(address)
    }

    /// EIP-55チェックサム表記として正しいかどうか。
    pub fn is_checksummed(s: &str) -> bool {
        Self::parse_checksummed(s).is_ok()
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    /// 大文字小文字を問わず`0x` + 40桁の16進をパースする。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| CryptoError::InvalidAddress(format!("0xで始まっていません: {s}")))?;
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(CryptoError::InvalidAddress(format!(
                "16進40桁である必要があります: {s}"
            )));
        }
        let mut out = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|e| CryptoError::InvalidAddress(format!("16進デコードに失敗: {e}")))?;
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing_key_from_bytes;

    /// EIP-55 の参照ベクタ
    const CHECKSUM_VECTORS: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_checksum_vectors() {
        for v in CHECKSUM_VECTORS {
            let addr: Address = v.to_lowercase().parse().unwrap();
            assert_eq!(addr.to_checksum(), v);
            assert!(Address::is_checksummed(v));
        }
    }

    #[test]
    fn test_non_checksummed_forms_rejected() {
        let v = CHECKSUM_VECTORS[0];
        assert!(!Address::is_checksummed(&v.to_lowercase()));
        assert!(!Address::is_checksummed(&format!("0x{}", v[2..].to_uppercase())));
        // 接頭辞なし・長さ不正・非16進
        assert!(!Address::is_checksummed(&v[2..]));
        assert!(!Address::is_checksummed(&v[..41]));
        assert!(!Address::is_checksummed("0xZZaeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
    }

    #[test]
    fn test_address_from_known_private_key() {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let key = signing_key_from_bytes(&secret).unwrap();
        let addr = Address::from_verifying_key(key.verifying_key());
        assert_eq!(addr.to_string(), "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
    }
}
