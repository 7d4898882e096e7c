use num_traits::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_RESPONSE_TIME: &str = "http_response_time";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const ITERATION_ERRORS: &str = "iteration_errors";
pub const CHECKS: &str = "checks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Rate,
    Trend,
}

/// Kind of a built-in metric, or `None` for names the harness does not emit.
pub fn metric_kind(name: &str) -> Option<MetricKind> {
    match name {
        HTTP_REQS | ITERATIONS | ITERATION_ERRORS => Some(MetricKind::Counter),
        HTTP_REQ_FAILED | CHECKS => Some(MetricKind::Rate),
        HTTP_REQ_DURATION | HTTP_RESPONSE_TIME | ITERATION_DURATION => Some(MetricKind::Trend),
        _ => None,
    }
}

pub(crate) fn to_f64(value: u64) -> f64 {
    value.to_f64().unwrap_or(f64::MAX)
}

fn usize_to_f64(value: usize) -> f64 {
    value.to_f64().unwrap_or(f64::MAX)
}

/// Nearest-rank percentile over already sorted samples.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let clamped = p.clamp(0.0, 100.0);
    let rank = (usize_to_f64(sorted_data.len()) * clamped / 100.0).ceil();
    let index = rank
        .to_usize()
        .unwrap_or(sorted_data.len())
        .saturating_sub(1)
        .min(sorted_data.len() - 1);

    sorted_data.get(index).copied().unwrap_or_default()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrendStats {
    pub count: u64,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    #[serde(skip)]
    sorted: Vec<f64>,
}

impl TrendStats {
    fn from_samples(samples: &[f64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        if sorted.is_empty() {
            return Self::default();
        }

        let total: f64 = sorted.iter().sum();
        Self {
            count: sorted.len() as u64,
            avg: total / usize_to_f64(sorted.len()),
            min: sorted[0],
            med: percentile(&sorted, 50.0),
            max: sorted[sorted.len() - 1],
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            sorted,
        }
    }

    pub fn percentile(&self, p: f64) -> f64 {
        percentile(&self.sorted, p)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RateStats {
    pub passes: u64,
    pub total: u64,
    pub rate: f64,
}

impl RateStats {
    fn new(passes: u64, total: u64) -> Self {
        let rate = if total > 0 {
            to_f64(passes) / to_f64(total)
        } else {
            0.0
        };
        Self {
            passes,
            total,
            rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckCounts {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub elapsed_secs: f64,
    pub http_reqs: u64,
    pub http_req_failed: RateStats,
    pub http_req_duration: TrendStats,
    pub http_response_time: TrendStats,
    pub iterations: u64,
    pub iteration_errors: u64,
    pub iteration_duration: TrendStats,
    pub checks: RateStats,
    pub check_results: Vec<CheckCounts>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> Option<u64> {
        match name {
            HTTP_REQS => Some(self.http_reqs),
            ITERATIONS => Some(self.iterations),
            ITERATION_ERRORS => Some(self.iteration_errors),
            _ => None,
        }
    }

    pub fn rate(&self, name: &str) -> Option<&RateStats> {
        match name {
            HTTP_REQ_FAILED => Some(&self.http_req_failed),
            CHECKS => Some(&self.checks),
            _ => None,
        }
    }

    pub fn trend(&self, name: &str) -> Option<&TrendStats> {
        match name {
            HTTP_REQ_DURATION => Some(&self.http_req_duration),
            HTTP_RESPONSE_TIME => Some(&self.http_response_time),
            ITERATION_DURATION => Some(&self.iteration_duration),
            _ => None,
        }
    }

    /// Per-second rate of a counter over the run so far.
    pub fn per_second(&self, count: u64) -> f64 {
        if self.elapsed_secs > 0.0 {
            to_f64(count) / self.elapsed_secs
        } else {
            0.0
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckCounts> {
        self.check_results.iter().find(|c| c.name == name)
    }
}

/// Run-wide metrics sink shared by every virtual user.
pub struct Metrics {
    started: Instant,
    http_reqs: Arc<RwLock<u64>>,
    failed_requests: Arc<RwLock<u64>>,
    request_durations_ms: Arc<RwLock<Vec<f64>>>,
    iterations: Arc<RwLock<u64>>,
    iteration_errors: Arc<RwLock<u64>>,
    iteration_durations_ms: Arc<RwLock<Vec<f64>>>,
    checks: Arc<RwLock<Vec<CheckCounts>>>,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            http_reqs: Arc::new(RwLock::new(0)),
            failed_requests: Arc::new(RwLock::new(0)),
            request_durations_ms: Arc::new(RwLock::new(Vec::new())),
            iterations: Arc::new(RwLock::new(0)),
            iteration_errors: Arc::new(RwLock::new(0)),
            iteration_durations_ms: Arc::new(RwLock::new(Vec::new())),
            checks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn record_request(&self, duration_ms: f64, failed: bool) {
        *self.http_reqs.write().await += 1;
        if failed {
            *self.failed_requests.write().await += 1;
        }
        self.request_durations_ms.write().await.push(duration_ms);
    }

    pub async fn record_iteration(&self, duration_ms: f64, errored: bool) {
        *self.iterations.write().await += 1;
        if errored {
            *self.iteration_errors.write().await += 1;
        }
        self.iteration_durations_ms.write().await.push(duration_ms);
    }

    pub async fn record_check(&self, name: &str, passed: bool) {
        let mut checks = self.checks.write().await;
        let entry = match checks.iter().position(|c| c.name == name) {
            Some(index) => &mut checks[index],
            None => {
                checks.push(CheckCounts {
                    name: name.to_string(),
                    passes: 0,
                    fails: 0,
                });
                let last = checks.len() - 1;
                &mut checks[last]
            }
        };
        if passed {
            entry.passes += 1;
        } else {
            entry.fails += 1;
        }
    }

    #[must_use]
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let http_reqs = *self.http_reqs.read().await;
        let failed_requests = *self.failed_requests.read().await;
        let request_stats = TrendStats::from_samples(&self.request_durations_ms.read().await);

        let iterations = *self.iterations.read().await;
        let iteration_errors = *self.iteration_errors.read().await;
        let iteration_stats = TrendStats::from_samples(&self.iteration_durations_ms.read().await);

        let check_results = self.checks.read().await.clone();
        let (passes, total) = check_results
            .iter()
            .fold((0, 0), |(p, t), c| (p + c.passes, t + c.passes + c.fails));

        MetricsSnapshot {
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            http_reqs,
            http_req_failed: RateStats::new(failed_requests, http_reqs),
            http_response_time: request_stats.clone(),
            http_req_duration: request_stats,
            iterations,
            iteration_errors,
            iteration_duration: iteration_stats,
            checks: RateStats::new(passes, total),
            check_results,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
