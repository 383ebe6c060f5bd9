//! Link - リンク指定と起動ごとの bootstrap 計画

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// アプリが期待するパスをボリューム上のパスへつなぐ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// 永続ボリューム側のパス
    pub durable: PathBuf,

    /// コンテナのファイルシステム側のパス
    pub runtime: PathBuf,
}

impl LinkSpec {
    pub fn new(durable: impl Into<PathBuf>, runtime: impl Into<PathBuf>) -> Self {
        Self {
            durable: durable.into(),
            runtime: runtime.into(),
        }
    }
}

/// runtime パスが一意な、順序付きリンク列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkManifest {
    links: Vec<LinkSpec>,
}

impl LinkManifest {
    pub fn new(links: Vec<LinkSpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for link in &links {
            require_absolute(&link.durable)?;
            require_absolute(&link.runtime)?;
            if !seen.insert(link.runtime.clone()) {
                return Err(ConfigError::DuplicateRuntimePath(link.runtime.clone()));
            }
        }
        Ok(Self { links })
    }

    pub fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

fn require_absolute(path: &Path) -> Result<(), ConfigError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::RelativePath(path.to_path_buf()))
    }
}

/// runtime パスに今あるもの
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathState {
    Absent,
    Link { target: PathBuf },
    File,
    Directory,
}

/// コンテナ起動時に bootstrapper がすること。順序は
/// ディレクトリ → 権限の緩和 → リンク
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapPlan {
    /// リンク前に存在している必要がある永続側ディレクトリ
    pub directories: Vec<PathBuf>,

    /// 提供プロセスが書き込むパス（再帰的に権限を緩める）
    pub writable: Vec<PathBuf>,

    pub links: LinkManifest,
}

impl BootstrapPlan {
    pub fn new(
        directories: Vec<PathBuf>,
        writable: Vec<PathBuf>,
        links: LinkManifest,
    ) -> Result<Self, ConfigError> {
        for path in directories.iter().chain(writable.iter()) {
            require_absolute(path)?;
        }
        Ok(Self {
            directories,
            writable,
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_runtime_paths_are_rejected() {
        let err = LinkManifest::new(vec![
            LinkSpec::new("/vol/input", "/app/input"),
            LinkSpec::new("/vol/other", "/app/input"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRuntimePath(_)));
    }

    #[test]
    fn same_durable_path_may_back_several_runtime_paths() {
        let links = LinkManifest::new(vec![
            LinkSpec::new("/vol/output", "/app/output"),
            LinkSpec::new("/vol/output", "/app/temp"),
        ])
        .unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn plan_requires_absolute_paths() {
        let err = BootstrapPlan::new(vec![PathBuf::from("data/input")], vec![], LinkManifest::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::RelativePath(_)));
    }
}
