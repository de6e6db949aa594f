use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use eject_core::{
    classify_platform, escape_plan, load_eject_config, CurrentLocation, DispatchAction,
    EjectConfig, EscapeState, EscapeStep, GateController, GateDecision, PageHost, Platform,
    UserAgentClassifier,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] eject_core::ConfigError),
    #[error("invalid url: {0}")]
    Location(#[from] eject_core::LocationError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "In-app browser escape inspection tool", long_about = None)]
pub struct Cli {
    /// Path to eject.toml; built-in defaults are used when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a user-agent string
    Classify(ClassifyArgs),
    /// Build the external launch URL for a page
    LaunchUrl(LaunchUrlArgs),
    /// Show the escape step plan for a page
    Plan(PlanArgs),
    /// Run the escape orchestrator against a scripted page
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// User-agent string to classify
    #[arg(long)]
    pub user_agent: String,
}

#[derive(Args, Debug)]
pub struct LaunchUrlArgs {
    /// Page URL the escape should land on
    #[arg(long)]
    pub url: String,
    /// User-agent string of the embedded context
    #[arg(long)]
    pub user_agent: String,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Page URL the escape should land on
    #[arg(long)]
    pub url: String,
    /// User-agent string of the embedded context
    #[arg(long)]
    pub user_agent: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Page URL the escape should land on
    #[arg(long)]
    pub url: String,
    /// User-agent string of the embedded context
    #[arg(long)]
    pub user_agent: String,
    /// Report the context released at this deadline check (1-based);
    /// omit to stay embedded through the whole chain
    #[arg(long)]
    pub escape_after: Option<usize>,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing();
    let config = match &cli.config {
        Some(path) => load_eject_config(path)?,
        None => EjectConfig::default(),
    };

    match &cli.command {
        Commands::Classify(args) => {
            let report = classify(&config, args);
            render(&report, cli.format)
        }
        Commands::LaunchUrl(args) => {
            let report = launch_url(&config, args)?;
            render(&report, cli.format)
        }
        Commands::Plan(args) => {
            let report = plan(&config, args)?;
            render(&report, cli.format)
        }
        Commands::Simulate(args) => {
            let report = simulate(&config, args)?;
            render(&report, cli.format)
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug, Serialize)]
pub struct ClassificationReport {
    pub platform: Platform,
    pub embedded: bool,
    pub signature: Option<String>,
}

fn classify(config: &EjectConfig, args: &ClassifyArgs) -> ClassificationReport {
    let classifier = UserAgentClassifier::from_config(config);
    let signature = classifier
        .embedding_signature(&args.user_agent)
        .map(str::to_string);
    ClassificationReport {
        platform: classify_platform(&args.user_agent),
        embedded: signature.is_some(),
        signature,
    }
}

#[derive(Debug, Serialize)]
pub struct LaunchUrlReport {
    pub platform: Platform,
    pub url: String,
}

fn launch_url(config: &EjectConfig, args: &LaunchUrlArgs) -> Result<LaunchUrlReport> {
    let location = CurrentLocation::parse(&args.url)?;
    let platform = classify_platform(&args.user_agent);
    // The plan's first step is the platform's launch URL, with the
    // configured Android package already applied.
    let url = escape_plan(platform, &location, &config.steps)
        .into_iter()
        .next()
        .map(|step| step.url)
        .unwrap_or_else(|| location.href());
    Ok(LaunchUrlReport { platform, url })
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub platform: Platform,
    pub steps: Vec<EscapeStep>,
}

fn plan(config: &EjectConfig, args: &PlanArgs) -> Result<PlanReport> {
    let location = CurrentLocation::parse(&args.url)?;
    let platform = classify_platform(&args.user_agent);
    Ok(PlanReport {
        platform,
        steps: escape_plan(platform, &location, &config.steps),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub action: DispatchAction,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub platform: Platform,
    pub decision: GateDecision,
    pub dispatches: Vec<DispatchRecord>,
    pub outcome: Option<EscapeState>,
}

fn simulate(config: &EjectConfig, args: &SimulateArgs) -> Result<SimulationReport> {
    // Fail early on an unparseable page URL instead of simulating a no-op.
    CurrentLocation::parse(&args.url)?;

    let host = Arc::new(ScriptedPage::new(
        &args.user_agent,
        &args.url,
        args.escape_after,
    ));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let mut gate = GateController::new(
        Arc::clone(&host) as Arc<dyn PageHost>,
        config.clone(),
    );
    let (platform, decision, outcome) = runtime.block_on(async {
        let decision = gate.evaluate();
        let platform = gate.platform();
        let outcome = if gate.on_user_confirm() {
            gate.escape_outcome().await
        } else {
            None
        };
        (platform, decision, outcome)
    });

    let dispatches = host.dispatched.lock().unwrap().clone();
    Ok(SimulationReport {
        platform,
        decision,
        dispatches,
        outcome,
    })
}

/// Stand-in page for simulations: records dispatches and optionally reports
/// the embedded context released at a scripted deadline check.
struct ScriptedPage {
    user_agent: String,
    href: String,
    released_at_check: Option<usize>,
    checks: Mutex<usize>,
    dispatched: Mutex<Vec<DispatchRecord>>,
}

impl ScriptedPage {
    fn new(user_agent: &str, href: &str, released_at_check: Option<usize>) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            href: href.to_string(),
            released_at_check,
            checks: Mutex::new(0),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, action: DispatchAction, url: &str) {
        self.dispatched.lock().unwrap().push(DispatchRecord {
            action,
            url: url.to_string(),
        });
    }
}

impl PageHost for ScriptedPage {
    fn user_agent(&self) -> Option<String> {
        Some(self.user_agent.clone())
    }

    fn location(&self) -> Option<CurrentLocation> {
        CurrentLocation::parse(&self.href).ok()
    }

    fn navigate(&self, url: &str) {
        self.record(DispatchAction::Navigate, url);
    }

    fn open_new_context(&self, url: &str) {
        self.record(DispatchAction::OpenNewContext, url);
    }

    fn still_embedded(&self) -> bool {
        let mut checks = self.checks.lock().unwrap();
        *checks += 1;
        match self.released_at_check {
            Some(released_at) => *checks < released_at,
            None => true,
        }
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

impl DisplayFallback for ClassificationReport {
    fn display(&self) -> String {
        let signature = self.signature.as_deref().unwrap_or("-");
        format!(
            "platform: {}\nembedded: {}\nsignature: {}",
            self.platform, self.embedded, signature
        )
    }
}

impl DisplayFallback for LaunchUrlReport {
    fn display(&self) -> String {
        format!("platform: {}\nurl: {}", self.platform, self.url)
    }
}

impl DisplayFallback for PlanReport {
    fn display(&self) -> String {
        let mut out = format!("platform: {}", self.platform);
        for (index, step) in self.steps.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. {} {} (deadline {}ms)",
                index + 1,
                action_label(step.action),
                step.url,
                step.deadline_ms
            ));
        }
        out
    }
}

impl DisplayFallback for SimulationReport {
    fn display(&self) -> String {
        let mut out = format!("platform: {}\ndecision: {}", self.platform, self.decision);
        for (index, dispatch) in self.dispatches.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. {} {}",
                index + 1,
                action_label(dispatch.action),
                dispatch.url
            ));
        }
        let outcome = match self.outcome {
            Some(EscapeState::Succeeded) => "succeeded",
            Some(EscapeState::Exhausted) => "exhausted",
            Some(_) => "interrupted",
            None => "no escape attempted",
        };
        out.push_str(&format!("\noutcome: {outcome}"));
        out
    }
}

fn action_label(action: DispatchAction) -> &'static str {
    match action {
        DispatchAction::Navigate => "navigate",
        DispatchAction::OpenNewContext => "open-new-context",
    }
}
