use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Serialize;

use super::{Scenario, ScenarioResult, VuContext};
use crate::check::{check, Assertion, CheckOutcome};
use crate::client::{header_map, ClientError, Response};
use crate::config::LoadConfig;

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGIN_EMAIL: &str = "user@example.com";
pub const LOGIN_PASSWORD: &str = "Qwertyu1@";

#[derive(Debug, Clone, Serialize)]
pub struct LoginPayload {
    pub email: &'static str,
    pub password: &'static str,
}

impl Default for LoginPayload {
    fn default() -> Self {
        Self {
            email: LOGIN_EMAIL,
            password: LOGIN_PASSWORD,
        }
    }
}

fn login_success(r: &Response) -> bool {
    r.status == 200
}

fn under_200ms(r: &Response) -> bool {
    r.timings.duration < 200.0
}

const CHECKS: [(&str, Assertion); 2] = [
    ("login success", login_success),
    ("response time is less than 200ms", under_200ms),
];

/// POSTs the fixed credentials to the login endpoint once per iteration.
pub struct LoginScenario {
    url: String,
    headers: HeaderMap,
}

impl LoginScenario {
    pub fn new(config: &LoadConfig) -> Result<Self, ClientError> {
        Ok(Self {
            url: config.url(LOGIN_PATH),
            headers: header_map(&config.headers)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Scenario for LoginScenario {
    fn name(&self) -> &'static str {
        "login"
    }

    async fn iteration(&self, ctx: &VuContext) -> ScenarioResult<Vec<CheckOutcome>> {
        let payload = serde_json::to_string(&LoginPayload::default())?;
        let res = ctx
            .client
            .post_json(&self.url, payload, self.headers.clone())
            .await;

        Ok(check(ctx.client.metrics(), &res, &CHECKS).await)
    }
}
