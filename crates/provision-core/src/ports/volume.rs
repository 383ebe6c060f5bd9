//! Volume port - コンテナより長生きする永続ボリューム
//!
//! # 実装
//! - **LocalVolume**: マウント済みディレクトリ（fsync + commit スタンプ）

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Volume は永続ストレージへの参照（所有はプラットフォーム側）
///
/// # 設計原則
/// - commit() が明示的な永続化チェックポイント
/// - commit 前に書かれた状態は永続とは限らない
#[async_trait]
pub trait Volume: Send + Sync {
    /// コンテナ内のマウントパス
    fn mount_path(&self) -> &Path;

    /// ここまでの書き込みを永続化する
    async fn commit(&self) -> Result<(), VolumeError>;
}

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("volume {path} is not mounted")]
    NotMounted { path: PathBuf },

    #[error("commit of {path} failed: {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
