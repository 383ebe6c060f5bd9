//! Launch - 提供プロセスのコマンドラインと handle

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 起動するプロセス。この crate は終了を待たない
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchCommand {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// ログ用のシェル風表記
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 起動したプロセスの handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub pid: u32,
}

/// 提供する Web アプリの起動方法
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub python: String,
    pub entrypoint: PathBuf,
    pub listen: String,
    pub port: u16,
    pub input_directory: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub extra_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,

    /// プラットフォームがコンテナを縮退させるまでのアイドル時間
    /// 参考値。実際の制御はプラットフォーム側
    #[serde(alias = "scaledown_window", alias = "container_idle_timeout")]
    pub idle_timeout_secs: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            entrypoint: PathBuf::from("/root/ComfyUI/main.py"),
            listen: "0.0.0.0".to_string(),
            port: 8188,
            input_directory: None,
            output_directory: None,
            extra_args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            idle_timeout_secs: None,
        }
    }
}

impl ServerSettings {
    /// `<python> <entrypoint> --listen <addr> --port <port> [--input-directory d]
    /// [--output-directory d] <extra...>`
    pub fn command(&self) -> LaunchCommand {
        let mut cmd = LaunchCommand::new(&self.python)
            .arg(self.entrypoint.display().to_string())
            .args(["--listen", self.listen.as_str()])
            .args(["--port".to_string(), self.port.to_string()]);

        if let Some(dir) = &self.input_directory {
            cmd = cmd.args(["--input-directory".to_string(), dir.display().to_string()]);
        }
        if let Some(dir) = &self.output_directory {
            cmd = cmd.args(["--output-directory".to_string(), dir.display().to_string()]);
        }
        cmd = cmd.args(self.extra_args.iter().cloned());
        cmd.working_dir = self.working_dir.clone();
        cmd.env = self.env.clone();
        cmd
    }
}
