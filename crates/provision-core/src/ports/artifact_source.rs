//! ArtifactSource port - リモートのモデルハブ
//!
//! ArtifactSource は 1 ファイルを丸ごと指定パスへ転送します。
//!
//! # 実装
//! - **HubArtifactSource**: HTTP(S) のハブ（本番用）
//! - **InMemoryArtifactSource**: テスト用

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ErrorKind, SourceLocator};

/// ArtifactSource はリモートのファイルをローカルへ転送
///
/// # 設計原則
/// - 書き込み先は staging パス（最終パスではない）
/// - 完了の判定は呼び出し側の rename で行う（ここでは行わない）
/// - リトライはしない（再実行で再開する）
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// `locator` の内容を `staging` に書き込み、書いたバイト数を返す
    ///
    /// `staging` は存在しない前提で作成される。失敗時に中途半端な内容が
    /// 残ることはあるが、削除は呼び出し側の責務。
    async fn download(&self, locator: &SourceLocator, staging: &Path) -> Result<u64, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("transfer of {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Status { .. } | SourceError::Transport { .. } => ErrorKind::Network,
            SourceError::Io { .. } => ErrorKind::Filesystem,
        }
    }
}
