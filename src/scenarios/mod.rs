use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::check::CheckOutcome;
use crate::client::{ClientError, HttpClient};
use crate::config::LoadConfig;

pub mod login;
pub mod products;

pub use login::LoginScenario;
pub use products::ProductListingScenario;

pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// Failure of a single iteration. The runner counts it and the VU moves on.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to encode request payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Per-iteration state handed to a scenario by the runner.
#[derive(Clone)]
pub struct VuContext {
    /// 1-based virtual user id.
    pub vu: u32,
    /// 0-based iteration count of this virtual user.
    pub iteration: u64,
    pub client: HttpClient,
}

/// Virtual-user count and run duration the runner uses for a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub vus: u32,
    pub duration: String,
}

impl Options {
    pub fn from_config(config: &LoadConfig) -> Self {
        Self {
            vus: config.vus,
            duration: config.duration.clone(),
        }
    }
}

#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs one iteration. Check failures are recorded, not returned as errors.
    async fn iteration(&self, ctx: &VuContext) -> ScenarioResult<Vec<CheckOutcome>>;

    fn options(&self, config: &LoadConfig) -> Options {
        Options::from_config(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    Login,
    Products,
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::Products => write!(f, "products"),
        }
    }
}

impl ScenarioKind {
    /// Fails only when the configured headers cannot be sent.
    pub fn build(self, config: &LoadConfig) -> Result<Arc<dyn Scenario>, ClientError> {
        let scenario: Arc<dyn Scenario> = match self {
            Self::Login => Arc::new(LoginScenario::new(config)?),
            Self::Products => Arc::new(ProductListingScenario::new(config)),
        };
        Ok(scenario)
    }
}
