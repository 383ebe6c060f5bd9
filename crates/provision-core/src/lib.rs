//! provision-core
//!
//! モデル提供コンテナのプロビジョニング（取得と配線）の中核
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（locator, category, artifact/link manifest, outcome, errors）
//! - **ports**: 抽象化レイヤー（ArtifactSource, Volume, ProcessLauncher, Clock, IdGenerator）
//! - **impls**: 実装（HubArtifactSource, LocalVolume, SystemLauncher, テスト用の in-memory 実装）
//! - **app**: アプリケーションロジック（fetcher, bootstrapper, serve）
//! - **config**: デプロイ設定（JSON）と組み込みプリセット

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
