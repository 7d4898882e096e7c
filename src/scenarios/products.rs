use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::warn;

use super::{Scenario, ScenarioResult, VuContext};
use crate::check::{check, Assertion, CheckOutcome};
use crate::client::Response;
use crate::config::LoadConfig;

pub const PRODUCTS_PATH: &str = "/products/";
const DEFAULT_THINK_TIME: Duration = Duration::from_secs(1);

fn status_is_200(r: &Response) -> bool {
    r.status == 200
}

fn under_200ms(r: &Response) -> bool {
    r.timings.duration < 200.0
}

/// True only when the body is JSON with an array under `results`.
fn contains_products_array(r: &Response) -> bool {
    match r.json() {
        Ok(body) => body.get("results").is_some_and(|v| v.is_array()),
        Err(e) => {
            warn!("Product listing body is not valid JSON: {}", e);
            false
        }
    }
}

const CHECKS: [(&str, Assertion); 3] = [
    ("status is 200", status_is_200),
    ("response time is less than 200ms", under_200ms),
    ("response contains products array", contains_products_array),
];

/// GETs the product listing, then pauses before the next iteration.
pub struct ProductListingScenario {
    url: String,
    think_time: Duration,
}

impl ProductListingScenario {
    pub fn new(config: &LoadConfig) -> Self {
        Self {
            url: config.url(PRODUCTS_PATH),
            think_time: DEFAULT_THINK_TIME,
        }
    }

    #[must_use]
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn think_time(&self) -> Duration {
        self.think_time
    }
}

#[async_trait]
impl Scenario for ProductListingScenario {
    fn name(&self) -> &'static str {
        "products"
    }

    async fn iteration(&self, ctx: &VuContext) -> ScenarioResult<Vec<CheckOutcome>> {
        let res = ctx.client.get(&self.url, HeaderMap::new()).await;
        let outcomes = check(ctx.client.metrics(), &res, &CHECKS).await;

        if !self.think_time.is_zero() {
            tokio::time::sleep(self.think_time).await;
        }

        Ok(outcomes)
    }
}
