//! Bootstrapper - コンテナ起動ごとのファイルシステム配線
//!
//! # 順序
//! 1. 永続側のディレクトリを作成
//! 2. 提供プロセスが書き込むパスの権限を再帰的に緩める
//! 3. runtime パスを永続パスへの symlink にする
//!
//! どのステップの失敗も致命的で、以降のステップ（起動を含む）は実行しない。
//! 中途半端に配線された状態で起動すると、書き込みがコンテナの一時領域に
//! 消えてしまうため。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{BootstrapPlan, BootstrapReport, LinkAction, LinkRecord, LinkSpec, PathState};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("{op} {path}: {source}")]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BootstrapError {
    fn fs<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| BootstrapError::Filesystem {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `path` に何があるかを判定する（末尾の symlink は辿らない）
pub fn classify(path: &Path) -> io::Result<PathState> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PathState::Absent),
        Err(e) => return Err(e),
    };
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        Ok(PathState::Link {
            target: fs::read_link(path)?,
        })
    } else if file_type.is_dir() {
        Ok(PathState::Directory)
    } else {
        Ok(PathState::File)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bootstrapper {
    /// 書き込み対象のディレクトリに OR するビット
    pub dir_mode: u32,

    /// 書き込み対象のファイルに OR するビット
    pub file_mode: u32,
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self {
            dir_mode: 0o777,
            file_mode: 0o666,
        }
    }
}

impl Bootstrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// ディレクトリ → 権限 → リンクの順に実行する
    pub fn run(&self, plan: &BootstrapPlan) -> Result<BootstrapReport, BootstrapError> {
        let mut report = BootstrapReport::default();

        for dir in &plan.directories {
            fs::create_dir_all(dir).map_err(BootstrapError::fs("create directory", dir))?;
            report.directories_ensured += 1;
        }

        for path in &plan.writable {
            fs::create_dir_all(path).map_err(BootstrapError::fs("create directory", path))?;
            report.paths_relaxed += self.relax_permissions(path)?;
        }

        report.links = self.bootstrap(plan.links.links())?;

        info!(
            directories = report.directories_ensured,
            relaxed = report.paths_relaxed,
            links = report.links.len(),
            changed = report.changed(),
            "bootstrap finished"
        );
        Ok(report)
    }

    /// 順にリンクを張る。最初の失敗で止まる
    pub fn bootstrap(&self, links: &[LinkSpec]) -> Result<Vec<LinkRecord>, BootstrapError> {
        links
            .iter()
            .map(|link| {
                let action = self.link(link)?;
                Ok(LinkRecord {
                    runtime: link.runtime.clone(),
                    durable: link.durable.clone(),
                    action,
                })
            })
            .collect()
    }

    pub fn link(&self, link: &LinkSpec) -> Result<LinkAction, BootstrapError> {
        let runtime = link.runtime.as_path();
        let state = classify(runtime).map_err(BootstrapError::fs("inspect", runtime))?;

        let action = match state {
            PathState::Link { target } if target == link.durable => {
                debug!(runtime = %runtime.display(), "already linked");
                return Ok(LinkAction::Unchanged);
            }
            PathState::Link { .. } => {
                ignore_missing(fs::remove_file(runtime))
                    .map_err(BootstrapError::fs("unlink", runtime))?;
                LinkAction::Relinked
            }
            PathState::File => {
                ignore_missing(fs::remove_file(runtime))
                    .map_err(BootstrapError::fs("remove file", runtime))?;
                LinkAction::Replaced
            }
            PathState::Directory => {
                ignore_missing(fs::remove_dir_all(runtime))
                    .map_err(BootstrapError::fs("remove directory", runtime))?;
                LinkAction::Replaced
            }
            PathState::Absent => LinkAction::Created,
        };

        if let Some(parent) = runtime.parent() {
            fs::create_dir_all(parent).map_err(BootstrapError::fs("create directory", parent))?;
        }
        symlink(&link.durable, runtime).map_err(BootstrapError::fs("symlink", runtime))?;

        info!(
            runtime = %runtime.display(),
            durable = %link.durable.display(),
            ?action,
            "linked"
        );
        Ok(action)
    }

    /// `chmod -R a+rwX` 相当。symlink は辿らない。
    ///
    /// 処理したエントリ数を返す。
    pub fn relax_permissions(&self, root: &Path) -> Result<usize, BootstrapError> {
        let mut touched = 0;
        let mut pending = vec![root.to_path_buf()];

        while let Some(path) = pending.pop() {
            let meta = fs::symlink_metadata(&path).map_err(BootstrapError::fs("inspect", &path))?;
            let file_type = meta.file_type();
            if file_type.is_symlink() {
                continue;
            }

            let bits = if file_type.is_dir() {
                self.dir_mode
            } else {
                self.file_mode
            };
            add_mode(&path, &meta, bits).map_err(BootstrapError::fs("chmod", &path))?;
            touched += 1;

            if file_type.is_dir() {
                let entries = fs::read_dir(&path).map_err(BootstrapError::fs("read directory", &path))?;
                for entry in entries {
                    let entry = entry.map_err(BootstrapError::fs("read directory", &path))?;
                    pending.push(entry.path());
                }
            }
        }

        debug!(root = %root.display(), touched, "permissions relaxed");
        Ok(touched)
    }
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links require a unix host",
    ))
}

#[cfg(unix)]
fn add_mode(path: &Path, meta: &fs::Metadata, bits: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = meta.permissions().mode();
    if mode & bits == bits {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode | bits))
}

#[cfg(not(unix))]
fn add_mode(_path: &Path, _meta: &fs::Metadata, _bits: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::LinkManifest;
    use std::os::unix::fs::PermissionsExt;

    fn snapshot(links: &[LinkSpec]) -> Vec<PathState> {
        links.iter().map(|l| classify(&l.runtime).unwrap()).collect()
    }

    #[test]
    fn classify_distinguishes_every_state() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        let sub = dir.path().join("sub");
        let link = dir.path().join("link");
        std::fs::write(&file, b"x").unwrap();
        std::fs::create_dir(&sub).unwrap();
        std::os::unix::fs::symlink(&sub, &link).unwrap();

        assert_eq!(classify(&dir.path().join("none")).unwrap(), PathState::Absent);
        assert_eq!(classify(&file).unwrap(), PathState::File);
        assert_eq!(classify(&sub).unwrap(), PathState::Directory);
        assert_eq!(classify(&link).unwrap(), PathState::Link { target: sub });
    }

    #[test]
    fn dangling_link_is_still_a_link() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink(dir.path().join("gone"), &link).unwrap();
        assert!(matches!(classify(&link).unwrap(), PathState::Link { .. }));
    }

    #[test]
    fn pre_existing_directory_is_replaced_by_link() {
        let vol = tempfile::tempdir().unwrap();
        let app = tempfile::tempdir().unwrap();
        let durable = vol.path().join("output");
        let runtime = app.path().join("output");
        std::fs::create_dir_all(&durable).unwrap();
        std::fs::create_dir_all(&runtime).unwrap();
        std::fs::write(runtime.join("old.png"), b"old").unwrap();

        let action = Bootstrapper::new()
            .link(&LinkSpec::new(&durable, &runtime))
            .unwrap();

        assert_eq!(action, LinkAction::Replaced);
        assert_eq!(
            classify(&runtime).unwrap(),
            PathState::Link {
                target: durable.clone()
            }
        );
        assert!(!runtime.join("old.png").exists());
        assert!(!durable.join("old.png").exists());
    }

    #[test]
    fn bootstrap_twice_yields_same_state() {
        let vol = tempfile::tempdir().unwrap();
        let app = tempfile::tempdir().unwrap();
        let links = vec![
            LinkSpec::new(vol.path().join("input"), app.path().join("ComfyUI/input")),
            LinkSpec::new(vol.path().join("output"), app.path().join("ComfyUI/output")),
            LinkSpec::new(
                vol.path().join("models/checkpoints/w.safetensors"),
                app.path().join("ComfyUI/models/checkpoints/w.safetensors"),
            ),
        ];
        std::fs::create_dir_all(app.path().join("ComfyUI/output")).unwrap();

        let boot = Bootstrapper::new();
        let first = boot.bootstrap(&links).unwrap();
        let after_first = snapshot(&links);
        let second = boot.bootstrap(&links).unwrap();
        let after_second = snapshot(&links);

        assert_eq!(after_first, after_second);
        assert_eq!(
            first.iter().map(|r| r.action).collect::<Vec<_>>(),
            vec![LinkAction::Created, LinkAction::Replaced, LinkAction::Created]
        );
        assert!(second.iter().all(|r| r.action == LinkAction::Unchanged));
    }

    #[test]
    fn stale_link_is_repointed() {
        let vol = tempfile::tempdir().unwrap();
        let runtime = vol.path().join("input");
        std::os::unix::fs::symlink(vol.path().join("old"), &runtime).unwrap();

        let durable = vol.path().join("new");
        let action = Bootstrapper::new()
            .link(&LinkSpec::new(&durable, &runtime))
            .unwrap();

        assert_eq!(action, LinkAction::Relinked);
        assert_eq!(std::fs::read_link(&runtime).unwrap(), durable);
    }

    #[test]
    fn unlinking_does_not_touch_link_target() {
        let vol = tempfile::tempdir().unwrap();
        let old_target = vol.path().join("old");
        std::fs::create_dir_all(&old_target).unwrap();
        std::fs::write(old_target.join("keep.txt"), b"keep").unwrap();
        let runtime = vol.path().join("input");
        std::os::unix::fs::symlink(&old_target, &runtime).unwrap();

        Bootstrapper::new()
            .link(&LinkSpec::new(vol.path().join("new"), &runtime))
            .unwrap();

        assert!(old_target.join("keep.txt").exists());
    }

    #[test]
    fn run_creates_directories_and_relaxes_permissions() {
        let vol = tempfile::tempdir().unwrap();
        let app = tempfile::tempdir().unwrap();
        let input = vol.path().join("input");
        let output = vol.path().join("output");
        std::fs::create_dir_all(&input).unwrap();
        let upload = input.join("upload.png");
        std::fs::write(&upload, b"png").unwrap();
        std::fs::set_permissions(&upload, std::fs::Permissions::from_mode(0o600)).unwrap();

        let plan = BootstrapPlan::new(
            vec![input.clone(), output.clone()],
            vec![input.clone()],
            LinkManifest::new(vec![
                LinkSpec::new(&input, app.path().join("input")),
                LinkSpec::new(&output, app.path().join("output")),
            ])
            .unwrap(),
        )
        .unwrap();

        let report = Bootstrapper::new().run(&plan).unwrap();

        assert_eq!(report.directories_ensured, 2);
        assert_eq!(report.paths_relaxed, 2);
        assert!(output.is_dir());
        let mode = std::fs::metadata(&upload).unwrap().permissions().mode();
        assert_eq!(mode & 0o666, 0o666);
        let mode = std::fs::metadata(&input).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
        assert_eq!(report.links.len(), 2);
    }

    #[test]
    fn failure_stops_before_later_links() {
        let vol = tempfile::tempdir().unwrap();
        // 親が通常ファイルなのでディレクトリを作れない
        let blocker = vol.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let links = vec![
            LinkSpec::new(vol.path().join("a"), blocker.join("child")),
            LinkSpec::new(vol.path().join("b"), vol.path().join("later")),
        ];

        let err = Bootstrapper::new().bootstrap(&links).unwrap_err();

        assert!(matches!(err, BootstrapError::Filesystem { .. }));
        assert_eq!(classify(&vol.path().join("later")).unwrap(), PathState::Absent);
    }

    #[test]
    fn filesystem_error_names_the_failing_path() {
        let vol = tempfile::tempdir().unwrap();
        let blocker = vol.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let plan = BootstrapPlan::new(
            vec![blocker.join("input")],
            vec![],
            LinkManifest::new(vec![]).unwrap(),
        )
        .unwrap();

        let err = Bootstrapper::new().run(&plan).unwrap_err();

        let BootstrapError::Filesystem { op, path, .. } = &err;
        assert_eq!(*op, "create directory");
        assert_eq!(path, &blocker.join("input"));
        assert!(err.to_string().contains("blocker"));
    }
}
