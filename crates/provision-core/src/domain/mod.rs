//! Domain - ドメインモデル（locator, artifact/link manifest, outcome, errors）
//!
//! I/O を含まない純粋なデータ型のみを置く。
//! 検証（重複・相対パス・不正な locator）はすべてここで行い、
//! app 層に渡る時点で manifest は常に妥当な状態になっている。

pub mod artifact;
pub mod category;
pub mod errors;
pub mod launch;
pub mod link;
pub mod locator;
pub mod outcome;

pub use artifact::{ArtifactManifest, ArtifactSpec, CategoryMap};
pub use category::Category;
pub use errors::{ConfigError, ErrorKind};
pub use launch::{LaunchCommand, ProcessHandle, ServerSettings};
pub use link::{BootstrapPlan, LinkManifest, LinkSpec, PathState};
pub use locator::{DEFAULT_REVISION, SourceLocator};
pub use outcome::{
    ArtifactOutcome, ArtifactRecord, BootstrapReport, FetchReport, LinkAction, LinkRecord,
};
