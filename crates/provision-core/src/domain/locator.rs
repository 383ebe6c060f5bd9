//! Locator - モデルハブ上のファイルの指定
//!
//! 1 つのリポジトリ・1 つの revision の中の 1 ファイルを指す。受け付ける表記:
//!
//! - hub URL: `https://huggingface.co/Kijai/LTXV2_comfy/resolve/main/VAE/x.safetensors`
//! - compact: `Kijai/LTXV2_comfy:VAE/x.safetensors`、revision 付きは `Kijai/LTXV2_comfy@v1:VAE/x.safetensors`
//!
//! revision はリポジトリ側（最初の `:` より前）にだけ書ける。ファイルパスに `@` が
//! 含まれていても revision とは解釈しない。シリアライズは常に compact 形式。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

pub const DEFAULT_REVISION: &str = "main";

/// (リポジトリ, ファイルパス, revision) の組
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceLocator {
    repo_id: String,
    path: String,
    revision: String,
}

impl SourceLocator {
    pub fn new(
        repo_id: impl Into<String>,
        path: impl Into<String>,
        revision: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let repo_id = repo_id.into();
        let path = path.into();
        let revision = revision.into();
        let shown = format!("{repo_id}@{revision}:{path}");

        validate_repo_id(&repo_id).map_err(|reason| ConfigError::malformed(&shown, reason))?;
        validate_path(&path).map_err(|reason| ConfigError::malformed(&shown, reason))?;
        if revision.is_empty() || revision.contains('/') {
            return Err(ConfigError::malformed(&shown, "invalid revision"));
        }

        Ok(Self {
            repo_id,
            path,
            revision,
        })
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// リポジトリ内パスのベース名
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// endpoint に対するダウンロード URL
    pub fn resolve_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            endpoint.trim_end_matches('/'),
            self.repo_id,
            self.revision,
            self.path
        )
    }

    fn parse_url(input: &str, rest: &str) -> Result<Self, ConfigError> {
        // <host>/<owner>/<repo>/resolve/<revision>/<path...>
        let mut segments = rest.splitn(6, '/');
        let _host = segments.next();
        let owner = segments.next().unwrap_or_default();
        let repo = segments.next().unwrap_or_default();
        let marker = segments.next().unwrap_or_default();
        let revision = segments.next().unwrap_or_default();
        let path = segments.next().unwrap_or_default();

        if marker != "resolve" {
            return Err(ConfigError::malformed(input, "expected /resolve/ in hub URL"));
        }
        let path = path.split(['?', '#']).next().unwrap_or_default();

        Self::new(format!("{owner}/{repo}"), path, revision)
            .map_err(|_| ConfigError::malformed(input, "incomplete hub URL"))
    }

    fn parse_compact(input: &str) -> Result<Self, ConfigError> {
        let (repo, path) = input
            .split_once(':')
            .ok_or_else(|| ConfigError::malformed(input, "expected <owner>/<repo>:<path>"))?;

        let (repo_id, revision) = repo.split_once('@').unwrap_or((repo, DEFAULT_REVISION));

        Self::new(repo_id, path, revision).map_err(|e| match e {
            ConfigError::MalformedLocator { reason, .. } => ConfigError::malformed(input, reason),
            other => other,
        })
    }
}

fn validate_repo_id(repo_id: &str) -> Result<(), &'static str> {
    match repo_id.split_once('/') {
        Some((owner, name))
            if !owner.is_empty()
                && !name.is_empty()
                && !name.contains('/')
                && !repo_id.contains(['@', ':']) =>
        {
            Ok(())
        }
        _ => Err("repository must be <owner>/<name>"),
    }
}

fn validate_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("missing file path");
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err("file path must be relative to the repository");
    }
    if path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err("file path contains an empty or relative segment");
    }
    Ok(())
}

impl FromStr for SourceLocator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s
            .strip_prefix("https://")
            .or_else(|| s.strip_prefix("http://"))
        {
            Self::parse_url(s, rest)
        } else {
            Self::parse_compact(s)
        }
    }
}

impl TryFrom<String> for SourceLocator {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceLocator> for String {
    fn from(locator: SourceLocator) -> Self {
        locator.to_string()
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repo_id)?;
        if self.revision != DEFAULT_REVISION {
            write!(f, "@{}", self.revision)?;
        }
        write!(f, ":{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_hub_url() {
        let loc: SourceLocator = "https://huggingface.co/Kijai/LTXV2_comfy/resolve/main/VAE/LTX2_audio_vae_bf16.safetensors"
            .parse()
            .unwrap();
        assert_eq!(loc.repo_id(), "Kijai/LTXV2_comfy");
        assert_eq!(loc.path(), "VAE/LTX2_audio_vae_bf16.safetensors");
        assert_eq!(loc.revision(), "main");
        assert_eq!(loc.file_name(), "LTX2_audio_vae_bf16.safetensors");
    }

    #[test]
    fn parses_compact_form_with_revision() {
        let loc: SourceLocator = "Lightricks/LTX-2@v1:ltx-2-temporal-upscaler-x2-1.0.safetensors"
            .parse()
            .unwrap();
        assert_eq!(loc.repo_id(), "Lightricks/LTX-2");
        assert_eq!(loc.revision(), "v1");
        assert_eq!(loc.path(), "ltx-2-temporal-upscaler-x2-1.0.safetensors");
        assert_eq!(
            loc.to_string(),
            "Lightricks/LTX-2@v1:ltx-2-temporal-upscaler-x2-1.0.safetensors"
        );
    }

    #[test]
    fn at_sign_in_file_path_is_not_a_revision() {
        let loc: SourceLocator = "a/b:dir/x@2x.bin".parse().unwrap();
        assert_eq!(loc.path(), "dir/x@2x.bin");
        assert_eq!(loc.revision(), DEFAULT_REVISION);
        assert_eq!(loc.file_name(), "x@2x.bin");
        assert_eq!(loc.to_string(), "a/b:dir/x@2x.bin");
        assert_eq!(loc.to_string().parse::<SourceLocator>().unwrap(), loc);
    }

    #[test]
    fn resolve_url_round_trips_through_endpoint() {
        let loc: SourceLocator = "Comfy-Org/ltx-2:split_files/text_encoders/gemma.safetensors"
            .parse()
            .unwrap();
        assert_eq!(
            loc.resolve_url("https://hub.example/"),
            "https://hub.example/Comfy-Org/ltx-2/resolve/main/split_files/text_encoders/gemma.safetensors"
        );
    }

    #[rstest]
    #[case::no_separator("Kijai/LTXV2_comfy")]
    #[case::no_owner("LTXV2_comfy:file.bin")]
    #[case::empty_path("Kijai/LTXV2_comfy:")]
    #[case::empty_revision("Kijai/LTXV2_comfy@:x.bin")]
    #[case::escaping_path("Kijai/LTXV2_comfy:../secret")]
    #[case::url_without_resolve("https://huggingface.co/Kijai/LTXV2_comfy/blob/main/x.bin")]
    #[case::url_without_file("https://huggingface.co/Kijai/LTXV2_comfy/resolve/main")]
    fn rejects_malformed_locators(#[case] input: &str) {
        let err = input.parse::<SourceLocator>().unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLocator { .. }), "{err}");
    }
}
