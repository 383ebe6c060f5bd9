//! HubArtifactSource - HTTP(S) モデルハブからの転送
//!
//! `<endpoint>/<owner>/<repo>/resolve/<revision>/<path>` を GET し、
//! レスポンスボディをチャンク単位で staging ファイルへ書き込みます。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::domain::SourceLocator;
use crate::ports::{ArtifactSource, SourceError};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            user_agent: concat!("provision/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HubArtifactSource {
    client: reqwest::Client,
    config: HubConfig,
}

impl HubArtifactSource {
    pub fn new(config: HubConfig) -> Result<Self, SourceError> {
        // 数十 GB のボディがあるので全体のタイムアウトは付けない（接続のみ）
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SourceError::Transport {
                url: config.endpoint.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl ArtifactSource for HubArtifactSource {
    async fn download(&self, locator: &SourceLocator, staging: &Path) -> Result<u64, SourceError> {
        let url = locator.resolve_url(&self.config.endpoint);
        let transport = |e: reqwest::Error| SourceError::Transport {
            url: url.clone(),
            message: e.to_string(),
        };
        let io = |e: std::io::Error| SourceError::Io {
            path: staging.to_path_buf(),
            source: e,
        };

        let mut request = self.client.get(&url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }
        let expected = response.content_length();

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staging)
            .await
            .map_err(io)?;

        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport)?;
            file.write_all(&chunk).await.map_err(io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io)?;
        file.sync_all().await.map_err(io)?;

        if let Some(expected) = expected
            && expected != written
        {
            return Err(SourceError::Transport {
                url: url.clone(),
                message: format!("body ended after {written} of {expected} bytes"),
            });
        }

        tracing::debug!(%locator, bytes = written, "transfer finished");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_public_hub() {
        let source = HubArtifactSource::new(HubConfig::default()).unwrap();
        assert_eq!(source.endpoint(), DEFAULT_ENDPOINT);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join(".x.bin.partial");
        let source = HubArtifactSource::new(HubConfig {
            // 予約済みポート 9 (discard) には誰も listen していない前提
            endpoint: "http://127.0.0.1:9".to_string(),
            connect_timeout: Duration::from_secs(2),
            ..HubConfig::default()
        })
        .unwrap();

        let loc: SourceLocator = "a/b:x.bin".parse().unwrap();
        let err = source.download(&loc, &staging).await.unwrap_err();

        assert_eq!(err.kind(), crate::domain::ErrorKind::Network);
        assert!(!staging.exists());
    }
}
