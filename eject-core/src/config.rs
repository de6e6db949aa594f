use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::launch::DEFAULT_ANDROID_PACKAGE;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EjectConfig {
    pub signatures: SignaturesSection,
    pub steps: StepsSection,
    pub gate: GateSection,
}

/// Known in-app browser user-agent markers, one list per embedding family.
/// Matching is case-insensitive substring; any single hit counts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignaturesSection {
    pub social: Vec<String>,
    pub messenger: Vec<String>,
    pub mail: Vec<String>,
    pub webview: Vec<String>,
}

impl Default for SignaturesSection {
    fn default() -> Self {
        Self {
            social: markers(&[
                "linkedinapp",
                "fban",
                "fbav",
                "fb_iab",
                "instagram",
                "pinterest",
                "tiktok",
            ]),
            messenger: markers(&["messenger", "whatsapp", "telegram", "line"]),
            mail: markers(&["gmail"]),
            webview: markers(&["wv"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StepsSection {
    /// Per-step wait before re-checking whether the embedded context still
    /// holds. Pacing only, not a correctness mechanism.
    pub deadline_ms: u64,
    /// Browser package named in Android intent URIs.
    pub android_package: String,
}

impl Default for StepsSection {
    fn default() -> Self {
        Self {
            deadline_ms: 300,
            android_package: DEFAULT_ANDROID_PACKAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateSection {
    /// When true, Android escapes fire without waiting for user confirmation.
    /// Off by default: unexpected navigation is worse than one extra tap.
    pub auto_escape: bool,
}

impl Default for GateSection {
    fn default() -> Self {
        Self { auto_escape: false }
    }
}

fn markers(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub fn load_eject_config<P: AsRef<Path>>(path: P) -> Result<EjectConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
