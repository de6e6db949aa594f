use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::classifier::{classify_platform, Platform, UserAgentClassifier};
use crate::config::EjectConfig;
use crate::escape::{escape_plan, EscapeOrchestrator, EscapeState, PageHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    NotYetEvaluated,
    ShowPrompt,
    Suppressed,
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GateDecision::NotYetEvaluated => "not-yet-evaluated",
            GateDecision::ShowPrompt => "show-prompt",
            GateDecision::Suppressed => "suppressed",
        };
        f.write_str(label)
    }
}

/// Page-load-scoped controller for the "Open in Browser" affordance.
/// One instance per page load; evaluation is memoized and at most one
/// escape orchestrator ever runs, no matter how often the UI re-renders
/// or the user taps confirm.
pub struct GateController {
    host: Arc<dyn PageHost>,
    classifier: UserAgentClassifier,
    config: EjectConfig,
    decision: Option<GateDecision>,
    platform: Option<Platform>,
    escape_started: bool,
    escape_task: Option<JoinHandle<EscapeState>>,
}

impl GateController {
    pub fn new(host: Arc<dyn PageHost>, config: EjectConfig) -> Self {
        let classifier = UserAgentClassifier::from_config(&config);
        Self {
            host,
            classifier,
            config,
            decision: None,
            platform: None,
            escape_started: false,
            escape_task: None,
        }
    }

    /// Lazily classified and memoized for the page lifetime. `None` user
    /// agents (off-browser evaluation) fall back to `Other`.
    pub fn platform(&mut self) -> Platform {
        if let Some(platform) = self.platform {
            return platform;
        }
        let platform = self
            .host
            .user_agent()
            .map(|ua| classify_platform(&ua))
            .unwrap_or(Platform::Other);
        self.platform = Some(platform);
        platform
    }

    /// Evaluated once per page load, before any escape attempt is dispatched.
    pub fn evaluate(&mut self) -> GateDecision {
        if let Some(decision) = self.decision {
            return decision;
        }
        let embedded = self
            .host
            .user_agent()
            .map(|ua| self.classifier.is_embedded(&ua))
            .unwrap_or(false);
        let decision = if embedded {
            GateDecision::ShowPrompt
        } else {
            GateDecision::Suppressed
        };
        self.decision = Some(decision);
        debug!(platform = %self.platform(), %decision, "gate evaluated");
        decision
    }

    /// Tri-state view without forcing an evaluation.
    pub fn decision(&self) -> GateDecision {
        self.decision.unwrap_or(GateDecision::NotYetEvaluated)
    }

    /// Snapshots the location now (the user may have navigated since the
    /// prompt appeared) and starts the one orchestrator for this page load.
    /// Returns whether a run actually started.
    pub fn on_user_confirm(&mut self) -> bool {
        if self.evaluate() != GateDecision::ShowPrompt || self.escape_started {
            return false;
        }
        let Some(location) = self.host.location() else {
            return false;
        };
        let platform = self.platform();
        let steps = escape_plan(platform, &location, &self.config.steps);
        let mut orchestrator = EscapeOrchestrator::new(Arc::clone(&self.host), steps);
        self.escape_started = true;
        info!(%platform, url = %location.href(), "escape confirmed");
        self.escape_task = Some(tokio::spawn(async move { orchestrator.run().await }));
        true
    }

    /// Silent-redirect policy, Android only, off by default.
    pub fn maybe_auto_trigger(&mut self) -> bool {
        if !self.config.gate.auto_escape || self.platform() != Platform::Android {
            return false;
        }
        if self.evaluate() != GateDecision::ShowPrompt {
            return false;
        }
        self.on_user_confirm()
    }

    /// Whether the identity collaborator may use its redirect/popup flow
    /// directly instead of escaping first.
    pub fn safe_for_redirect_sign_in(&mut self) -> bool {
        self.evaluate() == GateDecision::Suppressed
    }

    /// Awaits the in-flight escape, if one was started. Test and tooling
    /// helper; the UI only ever observes the affordance staying visible.
    pub async fn escape_outcome(&mut self) -> Option<EscapeState> {
        match self.escape_task.take() {
            Some(handle) => handle.await.ok(),
            None => None,
        }
    }

    /// Page teardown: no further navigation attempts may fire.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.escape_task.take() {
            handle.abort();
        }
    }
}

impl Drop for GateController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::location::CurrentLocation;

    struct FakePage {
        user_agent: Option<String>,
        href: String,
        dispatched: Mutex<usize>,
    }

    impl FakePage {
        fn new(user_agent: Option<&str>) -> Self {
            Self {
                user_agent: user_agent.map(str::to_string),
                href: "https://app.example.com/sign-in?ref=x#top".to_string(),
                dispatched: Mutex::new(0),
            }
        }
    }

    impl PageHost for FakePage {
        fn user_agent(&self) -> Option<String> {
            self.user_agent.clone()
        }

        fn location(&self) -> Option<CurrentLocation> {
            CurrentLocation::parse(&self.href).ok()
        }

        fn navigate(&self, _url: &str) {
            *self.dispatched.lock().unwrap() += 1;
        }

        fn open_new_context(&self, _url: &str) {
            *self.dispatched.lock().unwrap() += 1;
        }

        fn still_embedded(&self) -> bool {
            true
        }
    }

    const ANDROID_WHATSAPP: &str = "Mozilla/5.0 (Linux; Android 14) WhatsApp/2.24";

    #[tokio::test(start_paused = true)]
    async fn evaluate_is_memoized_per_page_load() {
        let host = Arc::new(FakePage::new(Some(ANDROID_WHATSAPP)));
        let mut gate = GateController::new(host, EjectConfig::default());
        assert_eq!(gate.decision(), GateDecision::NotYetEvaluated);
        let first = gate.evaluate();
        let second = gate.evaluate();
        assert_eq!(first, GateDecision::ShowPrompt);
        assert_eq!(first, second);
        assert_eq!(gate.decision(), GateDecision::ShowPrompt);
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_orchestrator_per_page_load() {
        let host = Arc::new(FakePage::new(Some(ANDROID_WHATSAPP)));
        let mut gate = GateController::new(Arc::clone(&host) as Arc<dyn PageHost>, EjectConfig::default());
        assert!(gate.on_user_confirm());
        assert!(!gate.on_user_confirm());
        assert!(!gate.on_user_confirm());
        let outcome = gate.escape_outcome().await;
        assert_eq!(outcome, Some(EscapeState::Exhausted));
        // Android plan is two steps; repeated confirms added nothing.
        assert_eq!(*host.dispatched.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn suppressed_on_plain_mobile_browser() {
        let ua = "Mozilla/5.0 (Linux; Android 14) Chrome/120.0 Mobile Safari/537.36";
        let host = Arc::new(FakePage::new(Some(ua)));
        let mut gate = GateController::new(host, EjectConfig::default());
        assert_eq!(gate.evaluate(), GateDecision::Suppressed);
        assert!(!gate.on_user_confirm());
        assert!(gate.safe_for_redirect_sign_in());
    }

    #[tokio::test(start_paused = true)]
    async fn suppressed_off_browser() {
        let host = Arc::new(FakePage::new(None));
        let mut gate = GateController::new(host, EjectConfig::default());
        assert_eq!(gate.platform(), Platform::Other);
        assert_eq!(gate.evaluate(), GateDecision::Suppressed);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_trigger_honors_policy_flag() {
        let host = Arc::new(FakePage::new(Some(ANDROID_WHATSAPP)));
        let mut gate = GateController::new(Arc::clone(&host) as Arc<dyn PageHost>, EjectConfig::default());
        assert!(!gate.maybe_auto_trigger());

        let mut config = EjectConfig::default();
        config.gate.auto_escape = true;
        let host = Arc::new(FakePage::new(Some(ANDROID_WHATSAPP)));
        let mut gate = GateController::new(host, config.clone());
        assert!(gate.maybe_auto_trigger());

        // iOS never auto-triggers even with the flag on.
        let ios = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Instagram 300.0";
        let host = Arc::new(FakePage::new(Some(ios)));
        let mut gate = GateController::new(host, config);
        assert!(!gate.maybe_auto_trigger());
        assert!(gate.on_user_confirm());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_steps() {
        let host = Arc::new(FakePage::new(Some(ANDROID_WHATSAPP)));
        let mut gate = GateController::new(Arc::clone(&host) as Arc<dyn PageHost>, EjectConfig::default());
        assert!(gate.on_user_confirm());
        tokio::task::yield_now().await;
        gate.teardown();
        // First dispatch may have fired; the second step never does.
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert!(*host.dispatched.lock().unwrap() <= 1);
    }
}
