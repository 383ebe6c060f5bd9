//! IdGenerator port - staging ファイル名の生成
//!
//! 同じ artifact を複数の fetch が同時に転送しても staging ファイルが
//! 衝突しないように、転送ごとに一意な ID を付けます。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（Clock で時刻部分を決める）

use std::path::{Path, PathBuf};

use crate::ports::Clock;
use ulid::Ulid;

/// 一時ファイルの拡張子（完了したファイルには決して付かない）
pub const PARTIAL_SUFFIX: &str = ".partial";

/// IdGenerator は転送ごとに一意な ID を生成
///
/// # ULID の特性
/// - 時刻でソート可能（どの staging が古いか名前から分かる）
/// - 調整なしで複数コンテナから生成可能
pub trait IdGenerator: Send + Sync {
    fn generate_transfer_id(&self) -> Ulid;

    /// `<dir>/.<file_name>.<ulid>.partial`
    ///
    /// 最終パスと同じディレクトリに置くので rename は同一ファイルシステム内で完結する。
    fn staging_path(&self, destination: &Path) -> Option<PathBuf> {
        let dir = destination.parent()?;
        let name = destination.file_name()?.to_str()?;
        let id = self.generate_transfer_id();
        Some(dir.join(format!(".{name}.{id}{PARTIAL_SUFFIX}")))
    }
}

/// `file_name` の staging ファイルかどうか
pub fn is_staging_for(candidate: &str, file_name: &str) -> bool {
    candidate
        .strip_prefix('.')
        .and_then(|rest| rest.strip_prefix(file_name))
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|rest| rest.strip_suffix(PARTIAL_SUFFIX))
        .is_some_and(|id| Ulid::from_string(id).is_ok())
}

/// UlidGenerator は ULID ベースの ID 生成器
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_transfer_id(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}
