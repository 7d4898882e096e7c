// End-to-end runs: virtual users, metrics and thresholds together

use super::test_utils::TestHarness;
use api_loadtest::config::LoadConfig;
use api_loadtest::runner::{Runner, Schedule};
use api_loadtest::scenarios::{Options, ProductListingScenario, Scenario, ScenarioKind};
use api_loadtest::summary::{EXIT_OK, EXIT_THRESHOLDS_FAILED};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runner_for(harness: &TestHarness, scenario: Arc<dyn Scenario>) -> Runner {
    Runner::new(
        Arc::clone(&harness.config),
        scenario,
        harness.client.clone(),
        Arc::clone(&harness.metrics),
    )
}

#[tokio::test]
async fn test_default_options_are_ten_vus_for_thirty_seconds() {
    let config = LoadConfig::default();
    for kind in [ScenarioKind::Login, ScenarioKind::Products] {
        let scenario = kind.build(&config).unwrap();
        assert_eq!(
            scenario.options(&config),
            Options {
                vus: 10,
                duration: "30s".to_string()
            }
        );
    }
    assert_eq!(config.run_duration().unwrap(), Duration::from_secs(30));
}

#[tokio::test]
async fn test_login_run_passes_default_thresholds() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "token"})))
        .expect(12)
        .mount(&mock_server)
        .await;

    let harness = TestHarness::with_config(LoadConfig {
        vus: 3,
        base_url: format!("{}/api", mock_server.uri()),
        ..LoadConfig::default()
    });
    let scenario = ScenarioKind::Login.build(&harness.config).unwrap();
    let runner = runner_for(&harness, scenario);
    let thresholds = harness.config.threshold_set().unwrap();

    let summary = runner
        .run_with_summary(Schedule::Iterations(4), &thresholds)
        .await;

    assert_eq!(summary.scenario, "login");
    assert_eq!(summary.vus, 3);
    assert_eq!(summary.metrics.iterations, 12);
    assert_eq!(summary.metrics.http_reqs, 12);
    assert_eq!(summary.metrics.check_results.len(), 2);
    assert!(summary.passed(), "{}", summary.render());
    assert_eq!(summary.exit_code(), EXIT_OK);
}

#[tokio::test]
async fn test_server_errors_fail_thresholds_but_run_continues() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let harness = TestHarness::with_config(LoadConfig {
        vus: 2,
        base_url: format!("{}/api", mock_server.uri()),
        ..LoadConfig::default()
    });
    let scenario = Arc::new(
        ProductListingScenario::new(&harness.config).with_think_time(Duration::ZERO),
    );
    let runner = runner_for(&harness, scenario);
    let thresholds = harness.config.threshold_set().unwrap();

    let summary = runner
        .run_with_summary(Schedule::Iterations(3), &thresholds)
        .await;

    assert_eq!(summary.metrics.iterations, 6);
    assert_eq!(summary.metrics.iteration_errors, 0);
    assert_eq!(summary.metrics.http_req_failed.rate, 1.0);
    assert!(!summary.passed());
    assert_eq!(summary.exit_code(), EXIT_THRESHOLDS_FAILED);

    let failed: Vec<&str> = summary
        .thresholds
        .iter()
        .filter(|t| !t.passed)
        .map(|t| t.metric.as_str())
        .collect();
    assert_eq!(failed, vec!["http_req_failed"]);
}

#[tokio::test]
async fn test_duration_schedule_is_bounded_by_think_time() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [1]})))
        .mount(&mock_server)
        .await;

    let harness = TestHarness::with_config(LoadConfig {
        vus: 2,
        duration: "1500ms".to_string(),
        base_url: format!("{}/api", mock_server.uri()),
        ..LoadConfig::default()
    });
    let scenario = ScenarioKind::Products.build(&harness.config).unwrap();
    let runner = runner_for(&harness, scenario);

    let stats = runner
        .run(Schedule::Duration(harness.config.run_duration().unwrap()))
        .await;

    // Each VU starts at t=0 and t~1s, then sees the deadline after its second pause.
    assert_eq!(stats.iterations, 4);
    assert!(stats.elapsed >= Duration::from_millis(1500));
}

#[tokio::test]
async fn test_summary_export_writes_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let harness = TestHarness::with_config(LoadConfig {
        vus: 1,
        base_url: format!("{}/api", mock_server.uri()),
        ..LoadConfig::default()
    });
    let scenario = ScenarioKind::Login.build(&harness.config).unwrap();
    let runner = runner_for(&harness, scenario);
    let summary = runner
        .run_with_summary(
            Schedule::Iterations(1),
            &harness.config.threshold_set().unwrap(),
        )
        .await;

    let path = std::env::temp_dir().join(format!("api-loadtest-{}.json", summary.run_id));
    summary.export(&path).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(written["scenario"], "login");
    assert_eq!(written["metrics"]["iterations"], 1);
    assert_eq!(written["run_id"], summary.run_id.to_string());
}
