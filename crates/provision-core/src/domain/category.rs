//! Category - モデルの配置先サブフォルダ
//!
//! # 命名規約
//! - サブフォルダ名そのもの（`checkpoints`, `vae`, `upscale_models`, `clip`, ...）
//! - 既知の名前以外は `Custom` として受け付ける（単一のパス要素に限る）

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// artifact を置く models 配下のサブディレクトリ
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Checkpoints,
    Vae,
    UpscaleModels,
    Clip,
    Loras,
    TextEncoders,
    DiffusionModels,
    Custom(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Checkpoints => "checkpoints",
            Category::Vae => "vae",
            Category::UpscaleModels => "upscale_models",
            Category::Clip => "clip",
            Category::Loras => "loras",
            Category::TextEncoders => "text_encoders",
            Category::DiffusionModels => "diffusion_models",
            Category::Custom(name) => name,
        }
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let category = match s {
            "checkpoints" => Category::Checkpoints,
            "vae" => Category::Vae,
            "upscale_models" => Category::UpscaleModels,
            "clip" => Category::Clip,
            "loras" => Category::Loras,
            "text_encoders" => Category::TextEncoders,
            "diffusion_models" => Category::DiffusionModels,
            other => {
                // 単一のパス要素でなければならない
                if other.is_empty()
                    || other == "."
                    || other == ".."
                    || other.contains('/')
                    || other.contains('\\')
                {
                    return Err(ConfigError::InvalidFileName(other.to_string()));
                }
                Category::Custom(other.to_string())
            }
        };
        Ok(category)
    }
}

impl TryFrom<String> for Category {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::checkpoints("checkpoints", Category::Checkpoints)]
    #[case::vae("vae", Category::Vae)]
    #[case::upscale_models("upscale_models", Category::UpscaleModels)]
    #[case::clip("clip", Category::Clip)]
    fn known_folder_names_are_exact(#[case] name: &str, #[case] expected: Category) {
        let parsed: Category = name.parse().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), name);
    }

    #[test]
    fn unknown_names_become_custom() {
        let parsed: Category = "controlnet".parse().unwrap();
        assert_eq!(parsed, Category::Custom("controlnet".to_string()));
    }

    #[rstest]
    #[case::empty("")]
    #[case::parent("..")]
    #[case::nested("a/b")]
    fn path_like_names_are_rejected(#[case] name: &str) {
        assert!(name.parse::<Category>().is_err());
    }

    #[test]
    fn serializes_as_folder_name() {
        let json = serde_json::to_string(&Category::UpscaleModels).unwrap();
        assert_eq!(json, "\"upscale_models\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::UpscaleModels);
    }
}
