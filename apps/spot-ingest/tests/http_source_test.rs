//! HTTP price source behavior against a mock price API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use spot_ingest::config::RetrySettings;
use spot_ingest::pipeline::Pipeline;
use spot_ingest::source::{HttpPriceSource, PriceSource, SourceError, fetch_region};
use spot_ingest::store::{InMemoryRecordStore, InMemoryStoreConnector};
use spot_ingest::TimeWindow;

fn window() -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single().unwrap(),
    )
    .unwrap()
}

fn retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
        multiplier: 2.0,
        jitter_factor: 0.0,
    }
}

fn sample(instance_type: &str, price: &str) -> serde_json::Value {
    json!({
        "AvailabilityZone": "us-east-1a",
        "InstanceType": instance_type,
        "ProductDescription": "Linux/UNIX",
        "SpotPrice": price,
        "Timestamp": "2024-01-01T06:00:00Z"
    })
}

#[tokio::test]
async fn paginates_until_token_runs_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/spot-price-history"))
        .and(query_param("region", "us-east-1"))
        .and(query_param("startTime", "2024-01-01T00:00:00Z"))
        .and(query_param("endTime", "2024-01-02T00:00:00Z"))
        .and(query_param("maxResults", "2"))
        .and(query_param_is_missing("nextToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SpotPriceHistory": [sample("t2.micro", "0.0100"), sample("t2.micro", "0.0200")],
            "NextToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/spot-price-history"))
        .and(query_param("nextToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SpotPriceHistory": [sample("m5.large", "0.1000")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpPriceSource::new(server.uri(), 2, retry()).unwrap();
    let records = fetch_region(&source, "us-east-1", window()).await.unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].price, Decimal::new(100, 4));
    assert_eq!(records[2].instance_type, "m5.large");
    assert_eq!(records[2].region, "us-east-1");
}

#[tokio::test]
async fn rate_limited_page_is_retried() {
    let server = MockServer::start().await;

    // First hit is throttled; the retry succeeds.
    Mock::given(method("GET"))
        .and(path("/spot-price-history"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "0"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/spot-price-history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SpotPriceHistory": [sample("t2.micro", "0.0100")]
        })))
        .mount(&server)
        .await;

    let source = HttpPriceSource::new(server.uri(), 500, retry()).unwrap();
    let records = fetch_region(&source, "us-east-1", window()).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn permanent_rate_limiting_cannot_outlast_the_retry_budget() {
    let server = MockServer::start().await;

    // Every response is throttled, server hint included; the budget must
    // still run out instead of looping forever.
    Mock::given(method("GET"))
        .and(path("/spot-price-history"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let source = HttpPriceSource::new(server.uri(), 500, retry()).unwrap();
    let err = fetch_region(&source, "us-east-1", window()).await.unwrap_err();

    assert!(matches!(
        err.source,
        SourceError::MaxRetriesExceeded { attempts: 3 }
    ));
}

#[tokio::test]
async fn persistent_server_errors_exhaust_the_retry_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/spot-price-history"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let source = HttpPriceSource::new(server.uri(), 500, retry()).unwrap();
    let err = fetch_region(&source, "us-east-1", window()).await.unwrap_err();

    assert_eq!(err.region, "us-east-1");
    assert!(matches!(err.source, SourceError::MaxRetriesExceeded { .. }));
}

#[tokio::test]
async fn client_errors_fail_immediately() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/spot-price-history"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpPriceSource::new(server.uri(), 500, retry()).unwrap();
    let err = fetch_region(&source, "us-east-1", window()).await.unwrap_err();

    assert!(matches!(err.source, SourceError::Api { status: 400, .. }));
}

#[tokio::test]
async fn region_catalog_is_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/regions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Regions": [
                { "RegionName": "us-east-1" },
                { "RegionName": "us-west-2" }
            ]
        })))
        .mount(&server)
        .await;

    let source = HttpPriceSource::new(server.uri(), 500, retry()).unwrap();
    assert_eq!(source.regions().await.unwrap(), vec!["us-east-1", "us-west-2"]);
}

#[tokio::test]
async fn pipeline_runs_end_to_end_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/regions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Regions": [{ "RegionName": "us-east-1" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/spot-price-history"))
        .and(query_param("region", "us-east-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SpotPriceHistory": [
                sample("t2.micro", "0.0100"),
                sample("t2.micro", "0.0300"),
            ]
        })))
        .mount(&server)
        .await;

    let source = HttpPriceSource::new(server.uri(), 500, retry()).unwrap();
    let store = InMemoryRecordStore::new();
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        Arc::new(source),
        Arc::new(InMemoryStoreConnector::new(store.clone())),
        4,
    )
    .with_artifact_dir(dir.path());

    let report = pipeline
        .run(&["us-east-1".to_string()], window())
        .await
        .unwrap();

    assert_eq!(report.records_fetched, 2);
    // Both samples share a key (same zone, type, product, timestamp), so
    // the upserts collapse to one stored row.
    assert_eq!(report.records_written, 2);
    assert_eq!(store.len(), 1);
    assert_eq!(report.aggregation.unique_instance_types, vec!["t2.micro"]);
    assert_eq!(
        report.aggregation.summaries[0].avg_price,
        "0.02".parse::<Decimal>().unwrap()
    );
    assert!(dir.path().join("2024-01-02_spot-instanceTypes.json").exists());
}
