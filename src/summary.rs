use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::metrics::{to_f64, MetricsSnapshot, TrendStats};
use crate::thresholds::ThresholdOutcome;

/// Exit status used when every threshold passes.
pub const EXIT_OK: i32 = 0;
/// Exit status used when at least one threshold fails.
pub const EXIT_THRESHOLDS_FAILED: i32 = 99;

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub run_id: Uuid,
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub vus: u32,
    pub metrics: MetricsSnapshot,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl Summary {
    pub fn build(
        run_id: Uuid,
        scenario: &str,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        vus: u32,
        metrics: MetricsSnapshot,
        thresholds: Vec<ThresholdOutcome>,
    ) -> Self {
        Self {
            run_id,
            scenario: scenario.to_string(),
            started_at,
            elapsed_secs: elapsed.as_secs_f64(),
            vus,
            metrics,
            thresholds,
        }
    }

    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            EXIT_OK
        } else {
            EXIT_THRESHOLDS_FAILED
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn export(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn render(&self) -> String {
        let m = &self.metrics;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "scenario: {} | run {} | {} VUs | {:.1}s | started {}",
            self.scenario,
            self.run_id,
            self.vus,
            self.elapsed_secs,
            self.started_at.format("%Y/%m/%d %H:%M:%S")
        );
        let _ = writeln!(out);

        for c in &m.check_results {
            let total = c.passes + c.fails;
            let mark = if c.fails == 0 { '✓' } else { '✗' };
            let pct = if total > 0 {
                to_f64(c.passes) / to_f64(total) * 100.0
            } else {
                0.0
            };
            let _ = writeln!(
                out,
                "  {mark} {} ({pct:.0}%, ✓ {} / ✗ {})",
                c.name, c.passes, c.fails
            );
        }
        if !m.check_results.is_empty() {
            let _ = writeln!(out);
        }

        let _ = writeln!(
            out,
            "  checks.....................: {:.2}% ✓ {} ✗ {}",
            m.checks.rate * 100.0,
            m.checks.passes,
            m.checks.total - m.checks.passes
        );
        let _ = writeln!(out, "  {}", trend_line("http_req_duration", &m.http_req_duration));
        let _ = writeln!(
            out,
            "  http_req_failed............: {:.2}% ✓ {} ✗ {}",
            m.http_req_failed.rate * 100.0,
            m.http_req_failed.passes,
            m.http_req_failed.total - m.http_req_failed.passes
        );
        let _ = writeln!(
            out,
            "  http_reqs..................: {} {:.2}/s",
            m.http_reqs,
            m.per_second(m.http_reqs)
        );
        let _ = writeln!(out, "  {}", trend_line("http_response_time", &m.http_response_time));
        let _ = writeln!(out, "  {}", trend_line("iteration_duration", &m.iteration_duration));
        let _ = writeln!(
            out,
            "  iterations.................: {} {:.2}/s",
            m.iterations,
            m.per_second(m.iterations)
        );
        if m.iteration_errors > 0 {
            let _ = writeln!(out, "  iteration_errors...........: {}", m.iteration_errors);
        }

        if !self.thresholds.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "  thresholds:");
            for t in &self.thresholds {
                let mark = if t.passed { '✓' } else { '✗' };
                let observed = t
                    .observed
                    .map_or_else(|| "no data".to_string(), |v| format!("{v:.4}"));
                let _ = writeln!(out, "    {mark} {} {} (observed {observed})", t.metric, t.source);
            }
        }

        out
    }
}

fn trend_line(name: &str, t: &TrendStats) -> String {
    format!(
        "{:.<27}: avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
        name, t.avg, t.min, t.med, t.max, t.p90, t.p95
    )
}
