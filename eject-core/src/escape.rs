use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::classifier::Platform;
use crate::config::StepsSection;
use crate::launch::{android_intent_url, chrome_navigate_url, safari_url};
use crate::location::CurrentLocation;

/// Host browser environment seam. The production implementation is the
/// embedding shell's glue; tests and the CLI script it.
pub trait PageHost: Send + Sync {
    /// `None` outside a browser context (server-side evaluation).
    fn user_agent(&self) -> Option<String>;
    fn location(&self) -> Option<CurrentLocation>;
    /// Fire-and-forget navigation of the current tab.
    fn navigate(&self, url: &str);
    /// Fire-and-forget open in a new top-level browsing context.
    fn open_new_context(&self, url: &str);
    /// Re-evaluated against the live context at each step deadline.
    fn still_embedded(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    Navigate,
    OpenNewContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct EscapeStep {
    pub url: String,
    pub action: DispatchAction,
    pub deadline_ms: u64,
}

impl EscapeStep {
    fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Fixed per-platform fallback chain. No technique is reliable on its own;
/// the chain gets progressively more generic.
pub fn escape_plan(
    platform: Platform,
    location: &CurrentLocation,
    steps: &StepsSection,
) -> Vec<EscapeStep> {
    let deadline_ms = steps.deadline_ms;
    let step = |url: String, action: DispatchAction| EscapeStep {
        url,
        action,
        deadline_ms,
    };
    match platform {
        Platform::Ios => vec![
            step(safari_url(location), DispatchAction::Navigate),
            step(chrome_navigate_url(location), DispatchAction::Navigate),
            step(location.href(), DispatchAction::OpenNewContext),
        ],
        Platform::Android => vec![
            step(
                android_intent_url(location, &steps.android_package),
                DispatchAction::Navigate,
            ),
            step(location.href(), DispatchAction::OpenNewContext),
        ],
        Platform::Other => vec![step(location.href(), DispatchAction::OpenNewContext)],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeState {
    Idle,
    Attempting(usize),
    /// The embedded context was left behind; the waiting code in the old
    /// context may never even resume, which is fine.
    Succeeded,
    /// Not an error: the manual affordance stays visible, user-gesture
    /// launches usually work even when automated ones do not.
    Exhausted,
}

pub struct EscapeOrchestrator {
    host: Arc<dyn PageHost>,
    steps: Vec<EscapeStep>,
    state: EscapeState,
}

impl EscapeOrchestrator {
    pub fn new(host: Arc<dyn PageHost>, steps: Vec<EscapeStep>) -> Self {
        Self {
            host,
            steps,
            state: EscapeState::Idle,
        }
    }

    pub fn state(&self) -> EscapeState {
        self.state
    }

    /// Runs the chain to a terminal state. Dropping the future (page
    /// teardown) cancels the pending deadline timer and any later dispatch.
    pub async fn run(&mut self) -> EscapeState {
        info!(steps = self.steps.len(), "escape sequence started");
        for index in 0..self.steps.len() {
            self.state = EscapeState::Attempting(index);
            let step = &self.steps[index];
            debug!(step = index, action = ?step.action, url = %step.url, "dispatching escape step");
            match step.action {
                DispatchAction::Navigate => self.host.navigate(&step.url),
                DispatchAction::OpenNewContext => self.host.open_new_context(&step.url),
            }
            sleep(step.deadline()).await;
            if !self.host.still_embedded() {
                self.state = EscapeState::Succeeded;
                info!(step = index, "embedded context released");
                return self.state;
            }
        }
        self.state = EscapeState::Exhausted;
        info!("escape sequence exhausted");
        self.state
    }
}
