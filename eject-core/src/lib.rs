pub mod classifier;
pub mod config;
pub mod error;
pub mod escape;
pub mod gate;
pub mod identity;
pub mod launch;
pub mod location;

pub use classifier::{classify_platform, Platform, SignatureSet, UserAgentClassifier};
pub use config::{
    load_eject_config, EjectConfig, GateSection, SignaturesSection, StepsSection,
};
pub use error::{ConfigError, Result};
pub use escape::{
    escape_plan, DispatchAction, EscapeOrchestrator, EscapeState, EscapeStep, PageHost,
};
pub use gate::{GateController, GateDecision};
pub use identity::{IdentityError, IdentityService};
pub use launch::{
    android_intent_url, build_external_url, chrome_navigate_url, safari_url,
    DEFAULT_ANDROID_PACKAGE,
};
pub use location::{CurrentLocation, LocationError};
