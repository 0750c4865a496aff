//! # Gateway設定・共有状態
//!
//! 待ち受けアドレスの読み込みとGatewayの共有状態の定義。
//! リレー本体の設定は `docsign_core::RelayConfig` が読む。

use docsign_core::{ConfigError, DocumentRelay};

/// デフォルトの待ち受けホスト
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// デフォルトの待ち受けポート
pub const DEFAULT_PORT: u16 = 8888;

/// Gatewayの共有状態。
pub struct GatewayState {
    /// 署名鍵を保持するリレー
    pub relay: DocumentRelay,
}

/// 待ち受けアドレス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl ListenConfig {
    /// `HOST` / `PORT` 環境変数から構築する。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: format!("{raw}: {e}"),
            })?,
            None => DEFAULT_PORT,
        };
        Ok(Self { host, port })
    }

    /// `host:port` 形式
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
