//! Artifact - 取得対象の spec と検証済み manifest

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::category::Category;
use super::errors::ConfigError;
use super::locator::SourceLocator;

/// `category -> { ローカルファイル名 -> locator }`（宣言順を保つ）
pub type CategoryMap = IndexMap<Category, IndexMap<String, SourceLocator>>;

/// 永続ストレージに置く 1 ファイル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub source: SourceLocator,
    pub destination: PathBuf,
    pub category: Category,

    /// 完全なファイルの sha256（小文字 hex）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ArtifactSpec {
    pub fn new(source: SourceLocator, destination: impl Into<PathBuf>, category: Category) -> Self {
        Self {
            source,
            destination: destination.into(),
            category,
            sha256: None,
        }
    }

    /// `<models_root>/<category>/<file_name>` に置く spec
    ///
    /// `file_name` を省略するとリモートパスのベース名になる。
    pub fn under_root(
        models_root: &Path,
        category: Category,
        file_name: Option<&str>,
        source: SourceLocator,
    ) -> Result<Self, ConfigError> {
        let file_name = file_name.unwrap_or_else(|| source.file_name()).to_string();
        validate_file_name(&file_name)?;
        let destination = models_root.join(category.as_str()).join(&file_name);
        Ok(Self::new(source, destination, category))
    }

    pub fn with_sha256(mut self, digest: impl AsRef<str>) -> Result<Self, ConfigError> {
        let digest = digest.as_ref().trim().to_ascii_lowercase();
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidDigest(digest));
        }
        self.sha256 = Some(digest);
        Ok(self)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.destination.file_name().and_then(|n| n.to_str())
    }

    /// 配置先ファイルのディレクトリ
    pub fn destination_dir(&self) -> Option<&Path> {
        self.destination.parent()
    }
}

/// `file_name` は category ディレクトリからの相対パス（`Mega-v12/x.safetensors` など）
///
/// 空・`.`・`..` のセグメントと絶対パスは拒否する。
fn validate_file_name(name: &str) -> Result<(), ConfigError> {
    let invalid = name.contains('\\')
        || name.ends_with(".partial")
        || name
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(ConfigError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// 配置先が絶対パスかつ一意な、順序付き artifact 列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactManifest {
    specs: Vec<ArtifactSpec>,
}

impl ArtifactManifest {
    pub fn new(specs: Vec<ArtifactSpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for spec in &specs {
            if !spec.destination.is_absolute() {
                return Err(ConfigError::RelativePath(spec.destination.clone()));
            }
            if spec.file_name().is_none() {
                return Err(ConfigError::InvalidFileName(
                    spec.destination.display().to_string(),
                ));
            }
            if !seen.insert(spec.destination.clone()) {
                return Err(ConfigError::DuplicateDestination(spec.destination.clone()));
            }
        }
        Ok(Self { specs })
    }

    /// `models_root` 配下に category map を展開する
    pub fn from_category_map(models_root: &Path, map: &CategoryMap) -> Result<Self, ConfigError> {
        let mut specs = Vec::new();
        for (category, files) in map {
            for (file_name, source) in files {
                specs.push(ArtifactSpec::under_root(
                    models_root,
                    category.clone(),
                    Some(file_name),
                    source.clone(),
                )?);
            }
        }
        Self::new(specs)
    }

    /// 別の manifest を連結し、配置先の一意性を再確認する
    pub fn merge(self, other: ArtifactManifest) -> Result<Self, ConfigError> {
        let mut specs = self.specs;
        specs.extend(other.specs);
        Self::new(specs)
    }

    pub fn specs(&self) -> &[ArtifactSpec] {
        &self.specs
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn loc(s: &str) -> SourceLocator {
        s.parse().unwrap()
    }

    #[test]
    fn category_map_expands_in_declaration_order() {
        let json = r#"
        {
          "vae": {
            "b.safetensors": "Kijai/LTXV2_comfy:VAE/b.safetensors",
            "a.safetensors": "Kijai/LTXV2_comfy:VAE/a.safetensors"
          },
          "checkpoints": {
            "model.safetensors": "Phr00t/LTX2-Rapid-Merges:nsfw/model.safetensors"
          }
        }"#;
        let map: CategoryMap = serde_json::from_str(json).unwrap();
        let manifest = ArtifactManifest::from_category_map(Path::new("/vol/models"), &map).unwrap();

        let dests: Vec<_> = manifest.iter().map(|s| s.destination.clone()).collect();
        assert_eq!(
            dests,
            vec![
                PathBuf::from("/vol/models/vae/b.safetensors"),
                PathBuf::from("/vol/models/vae/a.safetensors"),
                PathBuf::from("/vol/models/checkpoints/model.safetensors"),
            ]
        );
        assert_eq!(manifest.specs()[2].category, Category::Checkpoints);
    }

    #[test]
    fn duplicate_destinations_are_rejected() {
        let a = ArtifactSpec::new(loc("a/b:x.bin"), "/vol/checkpoints/x.bin", Category::Checkpoints);
        let b = ArtifactSpec::new(loc("c/d:x.bin"), "/vol/checkpoints/x.bin", Category::Checkpoints);
        let err = ArtifactManifest::new(vec![a, b]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateDestination(p) if p == Path::new("/vol/checkpoints/x.bin")));
    }

    #[test]
    fn relative_destinations_are_rejected() {
        let a = ArtifactSpec::new(loc("a/b:x.bin"), "vol/x.bin", Category::Checkpoints);
        assert!(matches!(
            ArtifactManifest::new(vec![a]),
            Err(ConfigError::RelativePath(_))
        ));
    }

    #[test]
    fn file_name_defaults_to_remote_base_name() {
        let spec = ArtifactSpec::under_root(
            Path::new("/data/models"),
            Category::Checkpoints,
            None,
            loc("Phr00t/WAN2.2-14B-Rapid-AllInOne:Mega-v12/wan2.2-rapid.safetensors"),
        )
        .unwrap();
        assert_eq!(
            spec.destination,
            PathBuf::from("/data/models/checkpoints/wan2.2-rapid.safetensors")
        );
    }

    #[test]
    fn file_name_may_keep_a_nested_layout() {
        let spec = ArtifactSpec::under_root(
            Path::new("/data/models"),
            Category::Checkpoints,
            Some("Mega-v12/wan2.2-rapid.safetensors"),
            loc("Phr00t/WAN2.2-14B-Rapid-AllInOne:Mega-v12/wan2.2-rapid.safetensors"),
        )
        .unwrap();
        assert_eq!(
            spec.destination,
            PathBuf::from("/data/models/checkpoints/Mega-v12/wan2.2-rapid.safetensors")
        );
        assert_eq!(spec.file_name(), Some("wan2.2-rapid.safetensors"));
        assert_eq!(
            spec.destination_dir(),
            Some(Path::new("/data/models/checkpoints/Mega-v12"))
        );
    }

    #[rstest]
    #[case("")]
    #[case("/abs.bin")]
    #[case("dir/")]
    #[case("a//b.bin")]
    #[case("./x.bin")]
    #[case("../escape.bin")]
    #[case("dir/../../escape.bin")]
    #[case("win\\path.bin")]
    #[case("x.bin.partial")]
    fn unsafe_file_names_are_rejected(#[case] name: &str) {
        let err = ArtifactSpec::under_root(
            Path::new("/data/models"),
            Category::Checkpoints,
            Some(name),
            loc("a/b:x.bin"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFileName(_)));
    }

    #[test]
    fn digest_must_be_sha256_hex() {
        let spec = ArtifactSpec::new(loc("a/b:x.bin"), "/vol/x.bin", Category::Vae);
        assert!(spec.clone().with_sha256("abc").is_err());
        let ok = spec.with_sha256("AB".repeat(32)).unwrap();
        assert_eq!(ok.sha256.as_deref(), Some("ab".repeat(32).as_str()));
    }

    #[test]
    fn merge_rechecks_uniqueness() {
        let a = ArtifactManifest::new(vec![ArtifactSpec::new(
            loc("a/b:x.bin"),
            "/vol/x.bin",
            Category::Vae,
        )])
        .unwrap();
        let b = a.clone();
        assert!(a.merge(b).is_err());
    }
}
