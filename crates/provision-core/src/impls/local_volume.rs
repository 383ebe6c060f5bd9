//! LocalVolume - マウント済みディレクトリとしての永続ボリューム
//!
//! # 実装詳細
//! - commit() はマウントルートを fsync し、`.provision-commit.json` に
//!   世代番号と時刻を書き込む（一時ファイル + rename）
//! - プラットフォーム固有の commit（API 呼び出し）は別実装で行う想定

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::{Clock, SystemClock, Volume, VolumeError};

pub const COMMIT_STAMP: &str = ".provision-commit.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStamp {
    pub generation: u64,
    pub committed_at: DateTime<Utc>,
}

pub struct LocalVolume<C = SystemClock> {
    root: PathBuf,
    clock: C,
}

impl LocalVolume<SystemClock> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, SystemClock)
    }
}

impl<C: Clock> LocalVolume<C> {
    pub fn with_clock(root: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    /// 最後に成功した commit
    pub async fn last_commit(&self) -> Option<CommitStamp> {
        let bytes = tokio::fs::read(self.root.join(COMMIT_STAMP)).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn commit_error(&self, source: std::io::Error) -> VolumeError {
        VolumeError::Commit {
            path: self.root.clone(),
            source,
        }
    }
}

#[async_trait]
impl<C: Clock> Volume for LocalVolume<C> {
    fn mount_path(&self) -> &Path {
        &self.root
    }

    async fn commit(&self) -> Result<(), VolumeError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                return Err(VolumeError::NotMounted {
                    path: self.root.clone(),
                });
            }
        }

        let generation = self.last_commit().await.map_or(1, |s| s.generation + 1);
        let stamp = CommitStamp {
            generation,
            committed_at: self.clock.now(),
        };
        let body = serde_json::to_vec_pretty(&stamp)
            .map_err(|e| self.commit_error(std::io::Error::other(e)))?;

        let tmp = self.root.join(format!("{COMMIT_STAMP}.tmp"));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.commit_error(e))?;
        tokio::fs::rename(&tmp, self.root.join(COMMIT_STAMP))
            .await
            .map_err(|e| self.commit_error(e))?;

        // ディレクトリエントリ（rename 済みのファイル名）を永続化
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || std::fs::File::open(&root)?.sync_all())
            .await
            .map_err(|e| self.commit_error(std::io::Error::other(e)))?
            .map_err(|e| self.commit_error(e))?;

        tracing::info!(root = %self.root.display(), generation, "volume committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    #[tokio::test]
    async fn commit_increments_generation() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let volume = LocalVolume::with_clock(dir.path(), FixedClock::new(at));

        assert_eq!(volume.last_commit().await, None);
        volume.commit().await.unwrap();
        volume.commit().await.unwrap();

        let stamp = volume.last_commit().await.unwrap();
        assert_eq!(stamp.generation, 2);
        assert_eq!(stamp.committed_at, at);
        assert!(!dir.path().join(format!("{COMMIT_STAMP}.tmp")).exists());
    }

    #[tokio::test]
    async fn commit_fails_when_not_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let volume = LocalVolume::new(dir.path().join("missing"));
        let err = volume.commit().await.unwrap_err();
        assert!(matches!(err, VolumeError::NotMounted { .. }));
    }
}
