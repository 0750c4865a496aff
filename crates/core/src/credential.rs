//! # 署名鍵の保管
//!
//! リレーが保持する唯一の署名鍵の生成・永続化・検証を行う。
//!
//! ## ファイル形式
//! 秘密鍵32バイトを小文字16進（接頭辞なし）で1行に書き込む。
//! 読み込み時は前後の空白と`0x`接頭辞を許容する。
//!
//! ## 破損時の扱い
//! 読み込んだ内容が秘密鍵として解釈できない場合は破棄し、新しい鍵を生成して上書きする。

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docsign_crypto::{
    generate_signing_key, signing_key_from_bytes, Address, Secp256k1SigningKey,
};
use zeroize::Zeroizing;

/// 鍵保管のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// 秘密鍵ファイルの書き込みに失敗（起動時は致命的）
    #[error("秘密鍵ファイルの書き込みに失敗 ({path}): {source}")]
    Persist {
        /// 秘密鍵ファイルのパス
        path: PathBuf,
        /// 原因
        source: io::Error,
    },
    /// 秘密鍵ファイルの読み込みに失敗（存在しない場合を除く）
    #[error("秘密鍵ファイルの読み込みに失敗 ({path}): {source}")]
    Read {
        /// 秘密鍵ファイルのパス
        path: PathBuf,
        /// 原因
        source: io::Error,
    },
}

/// リレーの署名鍵と、そこから導出したアドレス。
pub struct Credential {
    signing_key: Secp256k1SigningKey,
    address: Address,
}

impl Credential {
    /// 署名鍵からCredentialを構築する。
    pub fn from_signing_key(signing_key: Secp256k1SigningKey) -> Self {
        let address = Address::from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// 16進文字列の秘密鍵をパースする。
    pub fn from_hex(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(hex::decode(digits).ok()?);
        signing_key_from_bytes(&bytes).ok().map(Self::from_signing_key)
    }

    /// 公開識別子（アドレス）
    pub fn address(&self) -> Address {
        self.address
    }

    /// 署名鍵
    pub(crate) fn signing_key(&self) -> &Secp256k1SigningKey {
        &self.signing_key
    }

    fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.signing_key.to_bytes()))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// 秘密鍵ファイルを管理するストア。
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// 指定パスの秘密鍵ファイルを扱うストアを作成する。
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 秘密鍵ファイルのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 既存の鍵を読み込む。なければ（または壊れていれば）生成して保存する。
    pub fn load_or_create(&self) -> Result<Credential, CredentialError> {
        if let Some(credential) = self.load_existing()? {
            tracing::info!(address = %credential.address(), "保存済みの署名鍵を読み込みました");
            return Ok(credential);
        }

        tracing::info!(path = %self.path.display(), "署名鍵を新規生成します");
        let credential = Credential::from_signing_key(generate_signing_key());
        self.persist(&credential)?;
        tracing::info!(address = %credential.address(), "新しい署名鍵を保存しました");
        Ok(credential)
    }

    /// 空でないファイルがあれば読み込む。解釈できない内容はNoneとして扱う。
    fn load_existing(&self) -> Result<Option<Credential>, CredentialError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => Zeroizing::new(raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                tracing::warn!(path = %self.path.display(), "秘密鍵ファイルがUTF-8ではありません。再生成します");
                return Ok(None);
            }
            Err(source) => {
                return Err(CredentialError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        match Credential::from_hex(&raw) {
            Some(credential) => Ok(Some(credential)),
            None => {
                tracing::warn!(path = %self.path.display(), "保存済みの秘密鍵が不正です。再生成します");
                Ok(None)
            }
        }
    }

    /// 秘密鍵を上書き保存する（Unixでは0600）。
    fn persist(&self, credential: &Credential) -> Result<(), CredentialError> {
        let to_err = |source| CredentialError::Persist {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(to_err)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(to_err)?;
        file.write_all(credential.secret_hex().as_bytes()).map_err(to_err)?;
        file.sync_all().map_err(to_err)?;

        // 既存ファイルにはmodeが適用されないため明示的に設定する
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(to_err)?;
        }
        Ok(())
    }
}
