//! In-memory collaborators (開発用・テスト用)
//!
//! # 学習ポイント
//! - 転送回数・バイト数を数えて「二回目は転送ゼロ」を検証する
//! - 途中で切れる転送を再現して「未完成のファイルが完成に見えない」ことを検証する

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::domain::{LaunchCommand, ProcessHandle, SourceLocator};
use crate::ports::{
    ArtifactSource, LaunchError, ProcessLauncher, SourceError, Volume, VolumeError,
};

/// locator ごとに注入する失敗
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// 何も書かずに失敗する
    Refuse,

    /// 先頭 `after` バイトだけ書いて失敗する
    Interrupt { after: usize },
}

/// locator ごとに固定のバイト列を返し、転送回数を数える
#[derive(Default)]
pub struct InMemoryArtifactSource {
    files: Mutex<HashMap<SourceLocator, Vec<u8>>>,
    faults: Mutex<HashMap<SourceLocator, Fault>>,
    transfers: AtomicUsize,
    bytes: AtomicU64,
}

impl InMemoryArtifactSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, locator: SourceLocator, content: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap()
            .insert(locator, content.into());
    }

    pub fn inject(&self, locator: SourceLocator, fault: Fault) {
        self.faults.lock().unwrap().insert(locator, fault);
    }

    pub fn clear_fault(&self, locator: &SourceLocator) {
        self.faults.lock().unwrap().remove(locator);
    }

    /// 開始した転送の数（失敗も含む）
    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    /// staging に書いたバイト数
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactSource for InMemoryArtifactSource {
    async fn download(&self, locator: &SourceLocator, staging: &Path) -> Result<u64, SourceError> {
        self.transfers.fetch_add(1, Ordering::SeqCst);
        let url = format!("memory://{locator}");

        let content = self.files.lock().unwrap().get(locator).cloned();
        let Some(content) = content else {
            return Err(SourceError::Status { url, status: 404 });
        };
        let fault = self.faults.lock().unwrap().get(locator).copied();

        let io = |e: std::io::Error| SourceError::Io {
            path: staging.to_path_buf(),
            source: e,
        };
        if fault == Some(Fault::Refuse) {
            return Err(SourceError::Transport {
                url,
                message: "connection refused".to_string(),
            });
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staging)
            .await
            .map_err(io)?;

        if let Some(Fault::Interrupt { after }) = fault {
            let cut = after.min(content.len());
            file.write_all(&content[..cut]).await.map_err(io)?;
            file.flush().await.map_err(io)?;
            self.bytes.fetch_add(cut as u64, Ordering::SeqCst);
            return Err(SourceError::Transport {
                url,
                message: format!("connection reset after {cut} bytes"),
            });
        }

        file.write_all(&content).await.map_err(io)?;
        file.flush().await.map_err(io)?;
        self.bytes.fetch_add(content.len() as u64, Ordering::SeqCst);
        Ok(content.len() as u64)
    }
}

/// commit 回数を数えるだけの Volume
pub struct CountingVolume {
    root: PathBuf,
    commits: AtomicU32,
    fail: bool,
}

impl CountingVolume {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            commits: AtomicU32::new(0),
            fail: false,
        }
    }

    pub fn failing(root: impl Into<PathBuf>) -> Self {
        Self {
            fail: true,
            ..Self::new(root)
        }
    }

    pub fn commits(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Volume for CountingVolume {
    fn mount_path(&self) -> &Path {
        &self.root
    }

    async fn commit(&self) -> Result<(), VolumeError> {
        if self.fail {
            return Err(VolumeError::Commit {
                path: self.root.clone(),
                source: std::io::Error::other("commit rejected"),
            });
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 起動せずにコマンドを記録する
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<LaunchCommand>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launched(&self) -> Vec<LaunchCommand> {
        self.launched.lock().unwrap().clone()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn launch(&self, command: &LaunchCommand) -> Result<ProcessHandle, LaunchError> {
        let mut launched = self.launched.lock().unwrap();
        launched.push(command.clone());
        Ok(ProcessHandle {
            pid: launched.len() as u32,
        })
    }
}
