use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use provision_core::app::{ArtifactFetcher, Bootstrapper, FetchError, Server};
use provision_core::config::{DeploymentConfig, ResolvedDeployment, presets};
use provision_core::domain::ConfigError;
use provision_core::impls::{DEFAULT_ENDPOINT, HubArtifactSource, HubConfig, LocalVolume, SystemLauncher};

#[derive(Debug, Parser)]
#[command(name = "provision", version, about = "Fetch model weights into a volume and wire serving containers to it")]
struct Cli {
    #[command(flatten)]
    source: ConfigSource,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
struct ConfigSource {
    /// デプロイ設定ファイル（JSON）
    #[arg(long, env = "PROVISION_CONFIG")]
    config: Option<PathBuf>,

    /// 組み込みプリセット（ltx-video, wan-rapid）
    #[arg(long, env = "PROVISION_PRESET")]
    preset: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 足りない artifact をボリュームへ取得して commit する
    Fetch(FetchArgs),

    /// コンテナのファイルシステムをボリュームへ配線する
    Bootstrap,

    /// 配線してから提供プロセスを起動し、すぐ終了する
    Serve,

    /// 設定を検証して解決済みの計画を出力する（I/O なし）
    Plan,
}

#[derive(Debug, Args)]
struct FetchArgs {
    #[arg(long, env = "HF_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    hub_endpoint: String,

    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    hub_token: Option<String>,

    /// この秒数を過ぎたら run 全体を打ち切る
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// digest が設定されていれば配置済みファイルも再ハッシュする
    #[arg(long)]
    verify_existing: bool,
}

fn load(source: &ConfigSource) -> Result<ResolvedDeployment, ConfigError> {
    let config = match (&source.config, &source.preset) {
        (Some(path), _) => DeploymentConfig::load(path)?,
        (None, Some(name)) => presets::preset(name)?,
        (None, None) => return Err(ConfigError::NoDeployment),
    };
    config.resolve()
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => error!(error = %e, "failed to render report"),
    }
}

async fn fetch(deployment: ResolvedDeployment, args: FetchArgs) -> ExitCode {
    let source = match HubArtifactSource::new(HubConfig {
        endpoint: args.hub_endpoint,
        token: args.hub_token.filter(|t| !t.is_empty()),
        ..HubConfig::default()
    }) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "cannot build hub client");
            return ExitCode::FAILURE;
        }
    };

    let mut options = deployment.fetch.clone();
    options.verify_existing |= args.verify_existing;
    let fetcher = ArtifactFetcher::new(Arc::new(source), Arc::new(LocalVolume::new(&deployment.volume)))
        .options(options);

    let run = fetcher.fetch(&deployment.artifacts);
    let result = match args.deadline_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), run).await {
            Ok(result) => result,
            Err(_) => {
                // 未 commit の成果物は次回の run で再取得される
                error!(deadline_secs = secs, "fetch deadline exceeded");
                return ExitCode::FAILURE;
            }
        },
        None => run.await,
    };

    match result {
        Ok(report) => {
            print_json(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "fetch incomplete; re-run to resume");
            if let FetchError::Commit { source, .. } = &e {
                error!(error = %source, "completed artifacts may not be durable");
            }
            print_json(e.report());
            ExitCode::FAILURE
        }
    }
}

fn bootstrap(deployment: ResolvedDeployment) -> ExitCode {
    match Bootstrapper::new().run(&deployment.plan) {
        Ok(report) => {
            print_json(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "bootstrap failed");
            ExitCode::FAILURE
        }
    }
}

fn serve(deployment: ResolvedDeployment) -> ExitCode {
    let server = Server::new(Arc::new(SystemLauncher));
    match server.start(&deployment.plan, &deployment.server) {
        Ok(outcome) => {
            info!(pid = outcome.handle.pid, "served process started");
            print_json(&outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "container start aborted");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 設定エラーは I/O の前に止める
    let deployment = match load(&cli.source) {
        Ok(deployment) => deployment,
        Err(e) => {
            error!(error = %e, kind = ?e.kind(), "invalid deployment");
            return ExitCode::FAILURE;
        }
    };
    info!(
        deployment = %deployment.name,
        artifacts = deployment.artifacts.len(),
        links = deployment.plan.links.len(),
        "deployment loaded"
    );

    match cli.command {
        Command::Fetch(args) => fetch(deployment, args).await,
        Command::Bootstrap => bootstrap(deployment),
        Command::Serve => serve(deployment),
        Command::Plan => {
            print_json(&deployment);
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_core::domain::ErrorKind;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn config_and_preset_conflict() {
        let parsed = Cli::try_parse_from([
            "provision", "--config", "a.json", "--preset", "wan-rapid", "plan",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_deployment_is_a_config_error() {
        let err = load(&ConfigSource {
            config: None,
            preset: None,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoDeployment));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn preset_selects_builtin_deployment() {
        let cli = Cli::try_parse_from(["provision", "--preset", "wan-rapid", "plan"]).unwrap();
        let deployment = load(&cli.source).unwrap();
        assert_eq!(deployment.server.port, 8100);
    }
}
