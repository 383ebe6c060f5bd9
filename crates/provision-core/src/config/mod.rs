//! Config - デプロイ設定
//!
//! 1 つの JSON でデプロイを記述する。
//! - models_root: モデルを置く場所
//! - models / artifacts: 取得対象（category map、明示リスト、または両方）
//! - bootstrap: 起動時のファイルシステム配線
//! - server: 提供プロセスの起動方法
//!
//! [`DeploymentConfig::resolve`] がすべてを先に検証するので、設定ミスは I/O の前に出る。

pub mod presets;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::FetchOptions;
use crate::domain::{
    ArtifactManifest, ArtifactSpec, BootstrapPlan, Category, CategoryMap, ConfigError,
    LinkManifest, LinkSpec, ServerSettings, SourceLocator,
};

/// 明示的な artifact 指定: `(リポジトリ, リポジトリ内パス, category)` とオプション
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub source: SourceLocator,
    pub category: Category,

    /// category ディレクトリからの相対パス。省略時はリモートパスのベース名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub directories: Vec<PathBuf>,
    pub writable: Vec<PathBuf>,
    pub links: Vec<LinkSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub stale_partial_grace_secs: u64,
    pub verify_existing: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let defaults = FetchOptions::default();
        Self {
            stale_partial_grace_secs: defaults.stale_partial_grace.as_secs(),
            verify_existing: defaults.verify_existing,
        }
    }
}

impl From<&FetchConfig> for FetchOptions {
    fn from(config: &FetchConfig) -> Self {
        FetchOptions {
            stale_partial_grace: Duration::from_secs(config.stale_partial_grace_secs),
            verify_existing: config.verify_existing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub name: String,

    /// category ディレクトリを作るルート
    pub models_root: PathBuf,

    /// fetcher が commit する永続ボリュームのマウントパス（省略時は `models_root`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<PathBuf>,

    #[serde(default)]
    pub models: CategoryMap,

    #[serde(default)]
    pub artifacts: Vec<ArtifactEntry>,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub server: ServerSettings,
}

/// 検証済みのデプロイ設定
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedDeployment {
    pub name: String,
    pub volume: PathBuf,
    pub artifacts: ArtifactManifest,
    pub plan: BootstrapPlan,
    pub server: ServerSettings,

    #[serde(skip)]
    pub fetch: FetchOptions,
}

impl DeploymentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(path, &text)
    }

    /// `origin` はエラーメッセージにだけ使う
    pub fn from_json(origin: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn volume_root(&self) -> &Path {
        self.volume.as_deref().unwrap_or(&self.models_root)
    }

    /// category map の分が先、明示指定が後
    pub fn artifact_manifest(&self) -> Result<ArtifactManifest, ConfigError> {
        if !self.models_root.is_absolute() {
            return Err(ConfigError::RelativePath(self.models_root.clone()));
        }
        let mapped = ArtifactManifest::from_category_map(&self.models_root, &self.models)?;

        let mut explicit = Vec::with_capacity(self.artifacts.len());
        for entry in &self.artifacts {
            let mut spec = ArtifactSpec::under_root(
                &self.models_root,
                entry.category.clone(),
                entry.file_name.as_deref(),
                entry.source.clone(),
            )?;
            if let Some(digest) = &entry.sha256 {
                spec = spec.with_sha256(digest)?;
            }
            explicit.push(spec);
        }

        mapped.merge(ArtifactManifest::new(explicit)?)
    }

    pub fn bootstrap_plan(&self) -> Result<BootstrapPlan, ConfigError> {
        BootstrapPlan::new(
            self.bootstrap.directories.clone(),
            self.bootstrap.writable.clone(),
            LinkManifest::new(self.bootstrap.links.clone())?,
        )
    }

    pub fn resolve(&self) -> Result<ResolvedDeployment, ConfigError> {
        let volume = self.volume_root().to_path_buf();
        if !volume.is_absolute() {
            return Err(ConfigError::RelativePath(volume));
        }
        Ok(ResolvedDeployment {
            name: self.name.clone(),
            volume,
            artifacts: self.artifact_manifest()?,
            plan: self.bootstrap_plan()?,
            server: self.server.clone(),
            fetch: FetchOptions::from(&self.fetch),
        })
    }
}
