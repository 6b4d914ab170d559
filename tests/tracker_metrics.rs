use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use caloriecounter::application::tracker::{
    CalorieTracker, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_INVALID_BARCODE,
    METRIC_LOOKUP_FAILURE, METRIC_LOOKUP_MS, METRIC_REJECT, METRIC_RUNNING_TOTAL,
};
use caloriecounter::infra::openfoodfacts::OpenFoodFactsClient;
use caloriecounter::infra::storage::FsBlobStore;
use caloriecounter::infra::telemetry;
use caloriecounter::infra::transport::RetainedPublisher;
use httpmock::MockServer;
use metrics_util::debugging::DebuggingRecorder;
use reqwest::Url;
use tempfile::TempDir;

#[tokio::test]
async fn message_handling_emits_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/api/v0/product/4029764001401.json");
        then.status(200)
            .body(r#"{"status":1,"product":{"nutriments":{"energy_serving":"529"}}}"#);
    });
    server.mock(|when, then| {
        when.method("GET").path("/api/v0/product/12345678.json");
        then.status(200).body(r#"{"status":0}"#);
    });
    server.mock(|when, then| {
        when.method("GET").path("/api/v0/product/87654321.json");
        then.status(503);
    });

    let storage = TempDir::new().expect("temp dir");
    let base = Url::parse(&server.base_url()).expect("mock url");
    let retained = Arc::new(RetainedPublisher::new());
    let mut tracker = CalorieTracker::new(
        Arc::new(FsBlobStore::new(storage.path())),
        Arc::new(OpenFoodFactsClient::new(&base, Duration::from_millis(3000)).expect("client")),
        retained.clone(),
        "revspace/bar/energy",
    );
    tracker.start().await.expect("partitions created");

    for payload in ["4029764001401", "4029764001401", "12345678", "87654321", "abc"] {
        tracker
            .handle_message("revspace/bank/sale", payload)
            .await
            .expect("handled");
    }
    assert_eq!(
        retained.retained("revspace/bar/energy").as_deref(),
        Some("1058 kJ")
    );

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        METRIC_CACHE_HIT,
        METRIC_CACHE_MISS,
        METRIC_LOOKUP_FAILURE,
        METRIC_REJECT,
        METRIC_INVALID_BARCODE,
        METRIC_LOOKUP_MS,
        METRIC_RUNNING_TOTAL,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
