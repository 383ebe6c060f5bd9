//! Serve - 配線してから提供プロセスを起動する
//!
//! bootstrap が成功した場合にだけ起動する。起動後の handle は返すだけで、
//! 終了を待ったり監視したりはしない。

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::bootstrapper::{BootstrapError, Bootstrapper};
use crate::domain::{BootstrapPlan, BootstrapReport, ProcessHandle, ServerSettings};
use crate::ports::{LaunchError, ProcessLauncher};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("bootstrap failed, not launching: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ServeOutcome {
    pub bootstrap: BootstrapReport,
    pub handle: ProcessHandle,
}

pub struct Server {
    bootstrapper: Bootstrapper,
    launcher: Arc<dyn ProcessLauncher>,
}

impl Server {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            bootstrapper: Bootstrapper::default(),
            launcher,
        }
    }

    /// bootstrap してから起動する。起動は最後のステップで、終了は待たない。
    pub fn start(
        &self,
        plan: &BootstrapPlan,
        settings: &ServerSettings,
    ) -> Result<ServeOutcome, ServeError> {
        let bootstrap = self.bootstrapper.run(plan)?;

        let command = settings.command();
        info!(
            command = %command.display(),
            port = settings.port,
            idle_timeout_secs = ?settings.idle_timeout_secs,
            "launching served process"
        );
        let handle = self.launcher.launch(&command)?;

        Ok(ServeOutcome { bootstrap, handle })
    }
}
