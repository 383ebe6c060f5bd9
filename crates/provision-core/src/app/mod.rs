//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて 2 つの手順を実装します。
//!
//! # 主要コンポーネント
//! - **ArtifactFetcher**: モデルを永続ボリュームへ一度だけ取得（管理者が手動で実行）
//! - **Bootstrapper**: コンテナ起動ごとの symlink / ディレクトリ / 権限の配線
//! - **Server**: 配線してから提供プロセスを起動（fire-and-forget）

pub mod bootstrapper;
pub mod fetcher;
pub mod serve;

// 主要な型を再エクスポート
pub use self::bootstrapper::{BootstrapError, Bootstrapper, classify};
pub use self::fetcher::{ArtifactFailure, ArtifactFetcher, FetchError, FetchOptions};
pub use self::serve::{ServeError, ServeOutcome, Server};
