use serde::Serialize;

use crate::client::Response;
use crate::metrics::Metrics;

/// A named assertion over a response.
pub type Assertion = fn(&Response) -> bool;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
}

/// Evaluates every assertion in order and records each outcome.
///
/// A failing assertion never stops the remaining ones and never becomes
/// an error; callers that care can inspect the returned outcomes.
pub async fn check(
    metrics: &Metrics,
    response: &Response,
    assertions: &[(&str, Assertion)],
) -> Vec<CheckOutcome> {
    let mut outcomes = Vec::with_capacity(assertions.len());
    for (name, assertion) in assertions {
        let passed = assertion(response);
        metrics.record_check(name, passed).await;
        outcomes.push(CheckOutcome {
            name: (*name).to_string(),
            passed,
        });
    }
    outcomes
}
