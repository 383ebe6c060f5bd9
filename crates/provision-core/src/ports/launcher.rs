//! ProcessLauncher port - 提供プロセスの起動境界
//!
//! # 実装
//! - **SystemLauncher**: `std::process::Command` で spawn（本番用）
//! - **RecordingLauncher**: 起動せずにコマンドを記録（テスト用）

use thiserror::Error;

use crate::domain::{LaunchCommand, ProcessHandle};

/// ProcessLauncher はプロセスを起動するだけ
///
/// # 設計原則
/// - fire-and-forget: 返した handle を待たない・管理しない
/// - 起動できなかった場合だけエラーを返す
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &LaunchCommand) -> Result<ProcessHandle, LaunchError>;
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
