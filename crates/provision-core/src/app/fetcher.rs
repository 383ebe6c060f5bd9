//! ArtifactFetcher - 永続ボリュームへのモデル取得
//!
//! # 流れ（artifact ごと、manifest の順）
//! 1. 配置先ディレクトリを作成（既存なら何もしない）
//! 2. 配置先に通常ファイルがあればスキップ（ネットワーク I/O なし）
//! 3. 期限切れの staging ファイルを掃除
//! 4. 一意な staging ファイルへ転送 → (sha256 検証) → rename で配置
//!
//! 全 artifact の処理後に一度だけ volume.commit() を呼ぶ。
//!
//! # 完了の判定
//! 配置先パスに現れるのは rename 済みの完全なファイルだけ。途中で切れた転送は
//! `.partial` の名前のまま残るか削除されるので、次の run で完成と誤認されない。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{ArtifactManifest, ArtifactOutcome, ArtifactSpec, ErrorKind, FetchReport};
use crate::ports::{
    ArtifactSource, Clock, IdGenerator, SourceError, SystemClock, UlidGenerator, Volume,
    VolumeError, is_staging_for,
};

/// FetchError は run 全体の失敗
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{} of {} artifacts failed", .0.failed(), .0.artifacts.len())]
    Incomplete(FetchReport),

    #[error("volume commit failed: {source}")]
    Commit {
        #[source]
        source: VolumeError,
        report: FetchReport,
    },
}

impl FetchError {
    pub fn report(&self) -> &FetchReport {
        match self {
            FetchError::Incomplete(report) => report,
            FetchError::Commit { report, .. } => report,
        }
    }
}

/// ArtifactFailure は 1 artifact の失敗（run は続行する）
#[derive(Debug, Error)]
pub enum ArtifactFailure {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("{op} {path}: {source}")]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is a directory, expected a file")]
    Collision { path: PathBuf },

    #[error("sha256 mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}

impl ArtifactFailure {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArtifactFailure::Source(e) => e.kind(),
            ArtifactFailure::Filesystem { .. }
            | ArtifactFailure::Collision { .. }
            | ArtifactFailure::DigestMismatch { .. } => ErrorKind::Filesystem,
        }
    }

    fn fs(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        ArtifactFailure::Filesystem {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// これより古い staging ファイルは放棄されたものとして削除する
    pub stale_partial_grace: Duration,

    /// digest がある場合、配置済みファイルも再ハッシュする
    pub verify_existing: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            stale_partial_grace: Duration::from_secs(6 * 60 * 60),
            verify_existing: false,
        }
    }
}

pub struct ArtifactFetcher {
    source: Arc<dyn ArtifactSource>,
    volume: Arc<dyn Volume>,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
    options: FetchOptions,
}

impl ArtifactFetcher {
    pub fn new(source: Arc<dyn ArtifactSource>, volume: Arc<dyn Volume>) -> Self {
        Self::with_clock(source, volume, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn ArtifactSource>,
        volume: Arc<dyn Volume>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            volume,
            ids: Box::new(UlidGenerator::new(clock.clone())),
            clock,
            options: FetchOptions::default(),
        }
    }

    pub fn options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// manifest 順に全 artifact を取得し、最後に一度だけ commit する
    ///
    /// 失敗した artifact はログと report に残し、残りは続行する。
    pub async fn fetch(&self, manifest: &ArtifactManifest) -> Result<FetchReport, FetchError> {
        info!(
            artifacts = manifest.len(),
            volume = %self.volume.mount_path().display(),
            "fetch started"
        );

        let mut report = FetchReport::default();
        for spec in manifest.iter() {
            let outcome = match self.fetch_one(spec).await {
                Ok(outcome) => outcome,
                Err(failure) => {
                    warn!(
                        artifact = %spec.source,
                        destination = %spec.destination.display(),
                        kind = ?failure.kind(),
                        error = %failure,
                        "artifact failed"
                    );
                    ArtifactOutcome::Failed {
                        reason: failure.to_string(),
                    }
                }
            };
            report.push(spec.source.clone(), spec.destination.clone(), outcome);
        }

        if let Err(source) = self.volume.commit().await {
            return Err(FetchError::Commit { source, report });
        }
        report.committed = true;

        info!(
            downloaded = report.downloaded(),
            skipped = report.skipped(),
            failed = report.failed(),
            bytes = report.bytes_transferred(),
            "fetch finished"
        );

        if report.is_complete() {
            Ok(report)
        } else {
            Err(FetchError::Incomplete(report))
        }
    }

    async fn fetch_one(&self, spec: &ArtifactSpec) -> Result<ArtifactOutcome, ArtifactFailure> {
        let destination = spec.destination.as_path();
        let dir = spec
            .destination_dir()
            .ok_or_else(|| ArtifactFailure::Collision {
                path: destination.to_path_buf(),
            })?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ArtifactFailure::fs("create directory", dir, e))?;

        // 配置済みでも、前の run が途中で残した staging は掃除する
        self.sweep_stale_partials(spec).await;

        if self.is_complete(spec).await? {
            info!(artifact = %spec.source, destination = %destination.display(), "already present, skipping");
            return Ok(ArtifactOutcome::Skipped);
        }

        let staging = self
            .ids
            .staging_path(destination)
            .ok_or_else(|| ArtifactFailure::Collision {
                path: destination.to_path_buf(),
            })?;

        info!(artifact = %spec.source, destination = %destination.display(), "downloading");
        match self.transfer(spec, &staging).await {
            Ok(bytes) => {
                info!(artifact = %spec.source, bytes, "stored");
                Ok(ArtifactOutcome::Downloaded { bytes })
            }
            Err(failure) => {
                remove_if_present(&staging).await;
                Err(failure)
            }
        }
    }

    /// staging へ転送し、検証してから rename で配置する
    async fn transfer(&self, spec: &ArtifactSpec, staging: &Path) -> Result<u64, ArtifactFailure> {
        let bytes = self.source.download(&spec.source, staging).await?;

        if let Some(expected) = &spec.sha256 {
            let actual = sha256_file(staging).await?;
            if &actual != expected {
                return Err(ArtifactFailure::DigestMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        tokio::fs::rename(staging, &spec.destination)
            .await
            .map_err(|e| ArtifactFailure::fs("rename into place", &spec.destination, e))?;
        Ok(bytes)
    }

    /// 配置先に完全なファイルがあるか
    ///
    /// rename でしか配置されないので、通常ファイルが存在すれば完了とみなす。
    async fn is_complete(&self, spec: &ArtifactSpec) -> Result<bool, ArtifactFailure> {
        let destination = spec.destination.as_path();
        let meta = match tokio::fs::metadata(destination).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ArtifactFailure::fs("inspect", destination, e)),
        };
        if meta.is_dir() {
            return Err(ArtifactFailure::Collision {
                path: destination.to_path_buf(),
            });
        }

        if self.options.verify_existing
            && let Some(expected) = &spec.sha256
        {
            let actual = sha256_file(destination).await?;
            if &actual != expected {
                warn!(
                    destination = %destination.display(),
                    %expected,
                    %actual,
                    "existing file does not match digest, re-fetching"
                );
                tokio::fs::remove_file(destination)
                    .await
                    .map_err(|e| ArtifactFailure::fs("remove corrupt file", destination, e))?;
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 中断された run が残した staging ファイルを削除する
    ///
    /// 並行して走っている別の fetch の staging を消さないよう、
    /// 更新時刻が猶予より古いものだけを対象にする。失敗しても致命的ではない。
    async fn sweep_stale_partials(&self, spec: &ArtifactSpec) {
        let (Some(dir), Some(file_name)) = (spec.destination_dir(), spec.file_name()) else {
            return;
        };
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot scan for stale partials");
                return;
            }
        };

        let now = self.clock.now();
        let grace = chrono::Duration::from_std(self.options.stale_partial_grace)
            .unwrap_or(chrono::Duration::MAX);

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_staging_for(name, file_name) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(_) => continue,
            };
            if now.signed_duration_since(modified) < grace {
                debug!(staging = name, "partial is recent, leaving it to its owner");
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => info!(staging = name, "removed stale partial"),
                Err(e) => warn!(staging = name, error = %e, "failed to remove stale partial"),
            }
        }
    }
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staging file"),
    }
}

/// ファイル全体の sha256（lowercase hex）
async fn sha256_file(path: &Path) -> Result<String, ArtifactFailure> {
    let owned = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        let mut file = std::fs::File::open(&owned)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| ArtifactFailure::fs("hash", path, std::io::Error::other(e)))?;
    digest.map_err(|e| ArtifactFailure::fs("hash", path, e))
}
