// Sustained load against a local mock to measure harness overhead

#[cfg(test)]
mod tests {
    use crate::test_utils::TestHarness;
    use api_loadtest::config::LoadConfig;
    use api_loadtest::runner::{Runner, Schedule};
    use api_loadtest::scenarios::{LoginScenario, ProductListingScenario, Scenario};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_api() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "token"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/products/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"results": [1, 2, 3]})),
            )
            .mount(&server)
            .await;
        server
    }

    fn harness(server: &MockServer, vus: u32, duration: &str) -> TestHarness {
        TestHarness::with_config(LoadConfig {
            vus,
            duration: duration.to_string(),
            base_url: format!("{}/api", server.uri()),
            ..LoadConfig::default()
        })
    }

    #[tokio::test]
    #[ignore]
    async fn test_sustained_login_load() {
        let server = mock_api().await;
        let harness = harness(&server, 10, "5s");
        let scenario: Arc<dyn Scenario> = Arc::new(LoginScenario::new(&harness.config).unwrap());
        let runner = Runner::new(
            Arc::clone(&harness.config),
            scenario,
            harness.client.clone(),
            Arc::clone(&harness.metrics),
        );

        let summary = runner
            .run_with_summary(
                Schedule::Duration(harness.config.run_duration().unwrap()),
                &harness.config.threshold_set().unwrap(),
            )
            .await;

        eprintln!("{}", summary.render());
        eprintln!(
            "  Throughput: {:.2} req/s",
            summary.metrics.per_second(summary.metrics.http_reqs)
        );

        assert!(summary.metrics.http_reqs > 0);
        assert_eq!(summary.metrics.http_req_failed.passes, 0);
        assert!(summary.passed());
    }

    #[tokio::test]
    #[ignore]
    async fn test_product_listing_rate_is_bounded_by_pause() {
        let server = mock_api().await;
        let harness = harness(&server, 10, "3s");
        let scenario: Arc<dyn Scenario> = Arc::new(ProductListingScenario::new(&harness.config));
        let runner = Runner::new(
            Arc::clone(&harness.config),
            scenario,
            harness.client.clone(),
            Arc::clone(&harness.metrics),
        );

        let stats = runner
            .run(Schedule::Duration(Duration::from_secs(3)))
            .await;

        eprintln!("Product listing load test results:");
        eprintln!("  Iterations: {}", stats.iterations);
        eprintln!("  Duration: {:?}", stats.elapsed);

        // One request per second per VU, plus the one started just before the deadline.
        assert!(stats.iterations <= 10 * 4);
        assert!(stats.iterations >= 10 * 3);
    }
}
