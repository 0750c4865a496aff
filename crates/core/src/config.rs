//! # リレー設定
//!
//! 環境変数から読み込むデプロイ単位の設定値と、そのデフォルト値。

use std::path::PathBuf;
use std::time::Duration;

use docsign_crypto::Address;

/// コントラクト呼び出し1回分のガス上限。
/// 2関数とも固定長に近い引数のため、見積もりは行わず余裕を持った上限を使う。
pub const DEFAULT_GAS_LIMIT: u64 = 500_000;

/// 受領確認ポーリングの間隔（ミリ秒）
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// レジャーへのHTTPリクエスト1回あたりのタイムアウト（秒）
pub const DEFAULT_LEDGER_TIMEOUT_SECS: u64 = 30;

/// 秘密鍵ファイルのデフォルトパス
pub const DEFAULT_SECRET_FILE: &str = "secret.txt";

/// 設定読み込みのエラー型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 必須の環境変数が未設定
    #[error("環境変数 {0} が設定されていません")]
    Missing(&'static str),
    /// 値が不正
    #[error("環境変数 {name} の値が不正です: {reason}")]
    Invalid {
        /// 環境変数名
        name: &'static str,
        /// 理由
        reason: String,
    },
}

/// レジャーへの接続方法。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerMode {
    /// JSON-RPCエンドポイントに接続する
    Rpc(String),
    /// プロセス内のモックレジャーを使う（ローカル開発用）
    Mock,
}

/// リレーコアの設定。
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// レジャー接続方法
    pub ledger: LedgerMode,
    /// 署名記録コントラクトのアドレス
    pub contract_address: Address,
    /// 秘密鍵ファイルのパス
    pub secret_file: PathBuf,
    /// 1オペレーションのガス上限
    pub gas_limit: u64,
    /// 受領確認ポーリング間隔
    pub poll_interval: Duration,
    /// 受領確認を待つ上限時間。Noneなら終端状態まで待ち続ける。
    pub confirmation_timeout: Option<Duration>,
    /// レジャーへのHTTPリクエスト1回あたりのタイムアウト
    pub ledger_timeout: Duration,
}

impl RelayConfig {
    /// プロセスの環境変数から構築する。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から構築する。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ledger = match lookup("LEDGER_MODE").as_deref() {
            Some("mock") => LedgerMode::Mock,
            None | Some("rpc") => {
                LedgerMode::Rpc(lookup("LEDGER_ENDPOINT").ok_or(ConfigError::Missing("LEDGER_ENDPOINT"))?)
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LEDGER_MODE",
                    reason: format!("rpc または mock を指定してください: {other}"),
                })
            }
        };

        let contract_address = match (lookup("CONTRACT_ADDRESS"), &ledger) {
            (Some(raw), _) => Address::parse_checksummed(&raw).map_err(|e| ConfigError::Invalid {
                name: "CONTRACT_ADDRESS",
                reason: e.to_string(),
            })?,
            (None, LedgerMode::Mock) => Address([0u8; 20]),
            (None, LedgerMode::Rpc(_)) => return Err(ConfigError::Missing("CONTRACT_ADDRESS")),
        };

        let secret_file = lookup("SECRET_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRET_FILE));

        let gas_limit = parse_or("GAS_LIMIT", &lookup, DEFAULT_GAS_LIMIT)?;
        let poll_interval_ms = parse_or("POLL_INTERVAL_MS", &lookup, DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "POLL_INTERVAL_MS",
                reason: "0より大きい値を指定してください".into(),
            });
        }
        let confirmation_timeout = lookup("CONFIRMATION_TIMEOUT_SECS")
            .map(|raw| parse_value("CONFIRMATION_TIMEOUT_SECS", &raw))
            .transpose()?
            .map(Duration::from_secs);
        let ledger_timeout_secs = parse_or("LEDGER_TIMEOUT_SECS", &lookup, DEFAULT_LEDGER_TIMEOUT_SECS)?;
        if ledger_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "LEDGER_TIMEOUT_SECS",
                reason: "0より大きい値を指定してください".into(),
            });
        }

        Ok(Self {
            ledger,
            contract_address,
            secret_file,
            gas_limit,
            poll_interval: Duration::from_millis(poll_interval_ms),
            confirmation_timeout,
            ledger_timeout: Duration::from_secs(ledger_timeout_secs),
        })
    }
}

fn parse_or<F>(name: &'static str, lookup: &F, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).map_or(Ok(default), |raw| parse_value(name, &raw))
}

fn parse_value(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("{raw}: {e}"),
    })
}
