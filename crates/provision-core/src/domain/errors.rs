//! Errors - エラー型と分類
//!
//! # 分類
//! - Network: 転送の失敗・中断（自動リトライはしない、再実行で再開できる）
//! - Filesystem: 権限・容量・パス衝突（bootstrap では致命的、fetch では該当 artifact のみスキップ）
//! - Configuration: 重複・不正な locator（I/O の前に起動時に失敗）

use std::path::PathBuf;

use thiserror::Error;

/// ErrorKind は運用上のエラー分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Filesystem,
    Configuration,
}

/// ConfigError は設定の検証エラー
///
/// どれも I/O を始める前に検出される。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate destination path {0}")]
    DuplicateDestination(PathBuf),

    #[error("duplicate runtime path {0}")]
    DuplicateRuntimePath(PathBuf),

    #[error("path must be absolute: {0}")]
    RelativePath(PathBuf),

    #[error("malformed locator {locator:?}: {reason}")]
    MalformedLocator { locator: String, reason: String },

    #[error("invalid file name {0:?}")]
    InvalidFileName(String),

    #[error("invalid sha256 digest {0:?}")]
    InvalidDigest(String),

    #[error("no deployment given; pass --config or --preset")]
    NoDeployment,

    #[error("unknown preset {0:?}")]
    UnknownPreset(String),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// 設定エラーは常に Configuration（run 全体を I/O 前に止める）
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }

    pub(crate) fn malformed(locator: &str, reason: impl Into<String>) -> Self {
        ConfigError::MalformedLocator {
            locator: locator.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_locator_message_names_the_input() {
        let err = ConfigError::malformed("nope", "missing repository");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("\"nope\""));
    }
}
