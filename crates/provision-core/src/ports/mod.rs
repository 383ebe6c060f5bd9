//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部の協調者（モデルハブ、永続ボリューム、提供プロセス）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - ボリュームは参照するだけ（所有・破棄はプラットフォーム側）
//! - 起動したプロセスは待たない
//! - ファイルシステム操作そのものは抽象化しない（tempdir でテストする）

pub mod artifact_source;
pub mod clock;
pub mod id_generator;
pub mod launcher;
pub mod volume;

// 主要な trait を再エクスポート
pub use self::artifact_source::{ArtifactSource, SourceError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, PARTIAL_SUFFIX, UlidGenerator, is_staging_for};
pub use self::launcher::{LaunchError, ProcessLauncher};
pub use self::volume::{Volume, VolumeError};
