//! Outcome - fetch / bootstrap の各ステップの結果
//!
//! report はただのデータ。CLI がログと標準出力に出し、`FetchError::Incomplete`
//! にも載るので、途中で失敗した run も説明できる。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::locator::SourceLocator;

/// 1 artifact の処理結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    /// 完全なファイルが既にあった（ネットワーク I/O なし）
    Skipped,

    /// 転送して rename で配置した
    Downloaded { bytes: u64 },

    /// 配置されていない。再実行してよい
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub source: SourceLocator,
    pub destination: PathBuf,
    pub outcome: ArtifactOutcome,
}

/// 1 回の fetch の artifact ごとの結果（manifest 順）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchReport {
    pub artifacts: Vec<ArtifactRecord>,

    /// 最後の volume commit が成功したか
    pub committed: bool,
}

impl FetchReport {
    pub fn push(&mut self, source: SourceLocator, destination: PathBuf, outcome: ArtifactOutcome) {
        self.artifacts.push(ArtifactRecord {
            source,
            destination,
            outcome,
        });
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ArtifactOutcome::Failed { .. }))
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.artifacts
            .iter()
            .map(|r| match r.outcome {
                ArtifactOutcome::Downloaded { bytes } => bytes,
                _ => 0,
            })
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&ArtifactOutcome) -> bool) -> usize {
        self.artifacts.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// runtime パス 1 つに対して bootstrap がしたこと
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    /// 既に永続パスへのリンクだった
    Unchanged,

    /// 何もなかったのでリンクを作った
    Created,

    /// 古いリンクを張り替えた
    Relinked,

    /// 実ファイルかディレクトリを消してリンクに置き換えた
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub runtime: PathBuf,
    pub durable: PathBuf,
    pub action: LinkAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    pub directories_ensured: usize,
    pub paths_relaxed: usize,
    pub links: Vec<LinkRecord>,
}

impl BootstrapReport {
    pub fn changed(&self) -> usize {
        self.links
            .iter()
            .filter(|l| l.action != LinkAction::Unchanged)
            .count()
    }
}
