//! Presets - 組み込みのデプロイ設定

use std::path::Path;

use super::DeploymentConfig;
use crate::domain::ConfigError;

const LTX_VIDEO: &str = include_str!("../../presets/ltx-video.json");
const WAN_RAPID: &str = include_str!("../../presets/wan-rapid.json");

pub const PRESET_NAMES: &[&str] = &["ltx-video", "wan-rapid"];

pub fn preset(name: &str) -> Result<DeploymentConfig, ConfigError> {
    let text = match name {
        "ltx-video" => LTX_VIDEO,
        "wan-rapid" => WAN_RAPID,
        other => return Err(ConfigError::UnknownPreset(other.to_string())),
    };
    DeploymentConfig::from_json(Path::new(name), text)
}
