// Test utilities shared by the scenario and runner tests
use api_loadtest::client::HttpClient;
use api_loadtest::config::LoadConfig;
use api_loadtest::metrics::Metrics;
use api_loadtest::scenarios::VuContext;
use std::sync::Arc;

/// A port nothing listens on, for connection-refused cases.
pub const UNREACHABLE_BASE_URL: &str = "http://127.0.0.1:1/api";

pub struct TestHarness {
    pub config: Arc<LoadConfig>,
    pub metrics: Arc<Metrics>,
    pub client: HttpClient,
}

impl TestHarness {
    /// Default config pointed at `{server_uri}/api`.
    pub fn new(server_uri: &str) -> Self {
        Self::with_config(LoadConfig {
            base_url: format!("{server_uri}/api"),
            ..LoadConfig::default()
        })
    }

    pub fn with_config(config: LoadConfig) -> Self {
        let config = Arc::new(config.validated().expect("test config should be valid"));
        let metrics = Arc::new(Metrics::new());
        let client =
            HttpClient::new(&config, Arc::clone(&metrics)).expect("Failed to build HTTP client");
        Self {
            config,
            metrics,
            client,
        }
    }

    pub fn vu_context(&self) -> VuContext {
        VuContext {
            vu: 1,
            iteration: 0,
            client: self.client.clone(),
        }
    }
}
