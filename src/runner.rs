use chrono::Utc;
use config::ConfigError;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::HttpClient;
use crate::config::LoadConfig;
use crate::metrics::Metrics;
use crate::scenarios::{Scenario, VuContext};
use crate::summary::Summary;
use crate::thresholds::ThresholdSet;

/// When virtual users stop starting new iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Until the duration has elapsed since the run started.
    Duration(Duration),
    /// A fixed number of iterations per virtual user.
    Iterations(u64),
}

impl Schedule {
    /// A fixed iteration count wins over the configured duration.
    pub fn select(iterations: Option<u64>, config: &LoadConfig) -> Result<Self, ConfigError> {
        match iterations {
            Some(0) => Err(ConfigError::Message("iterations must be greater than zero".into())),
            Some(n) => Ok(Self::Iterations(n)),
            None => config.run_duration().map(Self::Duration),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub iterations: u64,
    pub errors: u64,
    pub elapsed: Duration,
}

/// Drives `vus` concurrent virtual users through one scenario.
pub struct Runner {
    config: Arc<LoadConfig>,
    scenario: Arc<dyn Scenario>,
    client: HttpClient,
    metrics: Arc<Metrics>,
    stop: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(
        config: Arc<LoadConfig>,
        scenario: Arc<dyn Scenario>,
        client: HttpClient,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            scenario,
            client,
            metrics,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that, once set, stops every virtual user before its next iteration.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub async fn run(&self, schedule: Schedule) -> RunStats {
        let options = self.scenario.options(&self.config);
        let started = Instant::now();
        let deadline = match schedule {
            Schedule::Duration(d) => Some(started + d),
            Schedule::Iterations(_) => None,
        };
        let max_iterations = match schedule {
            Schedule::Iterations(n) => Some(n),
            Schedule::Duration(_) => None,
        };

        info!(
            "Starting scenario '{}' with {} VUs ({:?})",
            self.scenario.name(),
            options.vus,
            schedule
        );

        let handles = (1..=options.vus).map(|vu| {
            let scenario = Arc::clone(&self.scenario);
            let metrics = Arc::clone(&self.metrics);
            let stop = Arc::clone(&self.stop);
            let mut ctx = VuContext {
                vu,
                iteration: 0,
                client: self.client.clone(),
            };

            tokio::spawn(async move {
                let mut errors = 0u64;
                loop {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        break;
                    }
                    if max_iterations.is_some_and(|n| ctx.iteration >= n) {
                        break;
                    }

                    let iteration_start = Instant::now();
                    let result = scenario.iteration(&ctx).await;
                    let elapsed_ms = iteration_start.elapsed().as_secs_f64() * 1000.0;

                    match result {
                        Ok(outcomes) => {
                            debug!(
                                vu = ctx.vu,
                                iteration = ctx.iteration,
                                passed = outcomes.iter().filter(|o| o.passed).count(),
                                total = outcomes.len(),
                                "Iteration finished in {:.0}ms",
                                elapsed_ms
                            );
                            metrics.record_iteration(elapsed_ms, false).await;
                        }
                        Err(e) => {
                            errors += 1;
                            warn!(vu = ctx.vu, iteration = ctx.iteration, "Iteration failed: {e}");
                            metrics.record_iteration(elapsed_ms, true).await;
                        }
                    }

                    ctx.iteration += 1;
                }
                (ctx.iteration, errors)
            })
        });

        let mut stats = RunStats {
            iterations: 0,
            errors: 0,
            elapsed: Duration::ZERO,
        };

        for joined in join_all(handles).await {
            match joined {
                Ok((iterations, errors)) => {
                    stats.iterations += iterations;
                    stats.errors += errors;
                }
                Err(e) => warn!("Virtual user task ended abnormally: {e}"),
            }
        }

        stats.elapsed = started.elapsed();
        info!(
            "Scenario '{}' finished: {} iterations, {} errors in {:.1}s",
            self.scenario.name(),
            stats.iterations,
            stats.errors,
            stats.elapsed.as_secs_f64()
        );
        stats
    }

    /// Runs the schedule, then evaluates `thresholds` over the collected metrics.
    pub async fn run_with_summary(&self, schedule: Schedule, thresholds: &ThresholdSet) -> Summary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let vus = self.scenario.options(&self.config).vus;

        let stats = self.run(schedule).await;
        let snapshot = self.metrics.snapshot().await;
        let outcomes = thresholds.evaluate(&snapshot);

        for outcome in outcomes.iter().filter(|o| !o.passed) {
            error!(
                "Threshold crossed: {} {} (observed {:?})",
                outcome.metric, outcome.source, outcome.observed
            );
        }

        Summary::build(
            run_id,
            self.scenario.name(),
            started_at,
            stats.elapsed,
            vus,
            snapshot,
            outcomes,
        )
    }
}
