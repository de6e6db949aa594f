use std::fmt;

use serde::Serialize;

use crate::config::{EjectConfig, SignaturesSection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Other,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Other => "other",
        }
    }

    /// The embedding concern only applies on mobile; desktop web-views are
    /// out of scope.
    pub fn is_mobile(&self) -> bool {
        !matches!(self, Platform::Other)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const IOS_MARKERS: [&str; 3] = ["iphone", "ipad", "ipod"];

/// Pure and total: an unrecognized user agent is `Other`, never an error.
/// iOS markers take precedence over the generic Android marker.
pub fn classify_platform(user_agent: &str) -> Platform {
    let ua = user_agent.to_lowercase();
    if IOS_MARKERS.iter().any(|marker| ua.contains(marker)) {
        Platform::Ios
    } else if ua.contains("android") {
        Platform::Android
    } else {
        Platform::Other
    }
}

/// Consolidated in-app browser signature list, kept as configuration data so
/// new embedding hosts are an edit, not a code change.
#[derive(Debug, Clone)]
pub struct SignatureSet {
    social: Vec<String>,
    messenger: Vec<String>,
    mail: Vec<String>,
    webview: Vec<String>,
}

impl SignatureSet {
    fn families(&self) -> [&[String]; 4] {
        [&self.social, &self.messenger, &self.mail, &self.webview]
    }

    /// First signature contained in the already-lowercased user agent.
    /// Overlapping matches are expected; any single hit is sufficient.
    fn matched(&self, ua: &str) -> Option<&str> {
        self.families()
            .into_iter()
            .flatten()
            .find(|signature| ua.contains(signature.as_str()))
            .map(String::as_str)
    }
}

impl Default for SignatureSet {
    fn default() -> Self {
        Self::from(&SignaturesSection::default())
    }
}

impl From<&SignaturesSection> for SignatureSet {
    fn from(section: &SignaturesSection) -> Self {
        let lower = |list: &[String]| list.iter().map(|s| s.to_lowercase()).collect();
        Self {
            social: lower(&section.social),
            messenger: lower(&section.messenger),
            mail: lower(&section.mail),
            webview: lower(&section.webview),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserAgentClassifier {
    signatures: SignatureSet,
}

impl UserAgentClassifier {
    pub fn new(signatures: SignatureSet) -> Self {
        Self { signatures }
    }

    pub fn from_config(config: &EjectConfig) -> Self {
        Self::new(SignatureSet::from(&config.signatures))
    }

    /// True only when a known signature matches AND the platform is mobile.
    /// The conjunction keeps desktop browsers out even on a coincidental
    /// substring hit.
    pub fn is_embedded(&self, user_agent: &str) -> bool {
        self.embedding_signature(user_agent).is_some()
    }

    /// The signature that triggered the embedded classification, if any.
    pub fn embedding_signature(&self, user_agent: &str) -> Option<&str> {
        let ua = user_agent.to_lowercase();
        if !classify_platform(&ua).is_mobile() {
            return None;
        }
        self.signatures.matched(&ua)
    }
}
