//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HubArtifactSource**: HTTP(S) モデルハブ（本番用）
//! - **LocalVolume**: マウント済みディレクトリ（本番用）
//! - **SystemLauncher**: OS プロセス起動（本番用）
//! - **InMemoryArtifactSource / CountingVolume / RecordingLauncher**: テスト用

pub mod hub_source;
pub mod inmem;
pub mod local_volume;
pub mod system_launcher;

// 主要な型を再エクスポート
pub use self::hub_source::{DEFAULT_ENDPOINT, HubArtifactSource, HubConfig};
pub use self::inmem::{CountingVolume, Fault, InMemoryArtifactSource, RecordingLauncher};
pub use self::local_volume::{COMMIT_STAMP, CommitStamp, LocalVolume};
pub use self::system_launcher::SystemLauncher;
