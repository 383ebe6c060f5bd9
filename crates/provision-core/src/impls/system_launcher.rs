//! SystemLauncher - OS プロセスとして提供アプリを起動

use std::process::{Command, Stdio};

use crate::domain::{LaunchCommand, ProcessHandle};
use crate::ports::{LaunchError, ProcessLauncher};

/// `std::process::Command` で spawn し、子プロセスを待たずに手放す
///
/// stdout / stderr は親から継承するので、コンテナのログにそのまま流れる。
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, command: &LaunchCommand) -> Result<ProcessHandle, LaunchError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        let handle = ProcessHandle { pid: child.id() };
        // Child を drop しても kill はされない
        drop(child);

        tracing::info!(pid = handle.pid, command = %command.display(), "served process launched");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_a_spawn_error() {
        let cmd = LaunchCommand::new("/nonexistent/provision-test-binary");
        let err = SystemLauncher.launch(&cmd).unwrap_err();
        assert!(err.to_string().contains("provision-test-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn launch_returns_without_waiting() {
        let cmd = LaunchCommand::new("sleep").arg("5");
        let started = std::time::Instant::now();
        let handle = SystemLauncher.launch(&cmd).unwrap();
        assert!(handle.pid > 0);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
