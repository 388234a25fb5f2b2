//! Integration tests for multi-entity fetching.

mod common;

use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};

use common::{geofence, line, threat, FakeApi};
use domain::models::EntityId;
use fleet_tracker::client::TrackingApi;
use fleet_tracker::error::FetchError;
use fleet_tracker::fetcher::{fetch_layers, fetch_many, fetch_one};

fn ids(raw: &[i64]) -> Vec<EntityId> {
    raw.iter().copied().map(EntityId).collect()
}

#[tokio::test]
async fn test_fetch_many_isolates_failures() {
    let api = FakeApi::new();
    api.set_location(1, 24.86, 67.00);
    api.set_location(2, 24.87, 67.01);
    api.set_location(3, 24.88, 67.02);
    api.fail(2);

    let batch = assert_ok!(fetch_many(api.clone(), &ids(&[1, 2, 3])).await);

    let located: Vec<EntityId> = batch.locations.iter().map(|e| e.employee_id).collect();
    assert_eq!(located, ids(&[1, 3]));
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].entity_id, EntityId(2));
    assert!(batch.failures[0].retryable);
    assert!(batch.failures[0].error.contains("503"));
    assert_eq!(batch.requested, 3);
    assert!(!batch.all_failed());
}

#[tokio::test]
async fn test_fetch_many_rejects_empty_selection() {
    let api = FakeApi::new();
    let err = assert_err!(fetch_many(api.clone(), &[]).await);
    assert!(matches!(err, FetchError::NoEntities));
    assert_eq!(api.location_calls(), 0);
}

#[tokio::test]
async fn test_fetch_many_collapses_duplicate_ids() {
    let api = FakeApi::new();
    api.set_location(5, 10.0, 20.0);

    let batch = fetch_many(api.clone(), &ids(&[5, 5, 5])).await.unwrap();

    assert_eq!(batch.requested, 1);
    assert_eq!(batch.locations.len(), 1);
    assert_eq!(api.location_calls(), 1);
}

#[tokio::test]
async fn test_missing_location_is_not_a_failure() {
    let api = FakeApi::new();
    api.set_location(1, 24.86, 67.00);
    api.set_geofences(2, vec![geofence(20, "Depot")]);

    let batch = fetch_many(api.clone(), &ids(&[1, 2])).await.unwrap();

    assert_eq!(batch.locations.len(), 1);
    assert!(batch.failures.is_empty());
    assert_eq!(batch.geofences.len(), 1);
    assert_eq!(batch.geofences[0].geofence_name, "Depot");
}

#[tokio::test]
async fn test_shared_geofences_are_deduplicated() {
    let api = FakeApi::new();
    api.set_location(1, 24.86, 67.00);
    api.set_location(2, 24.87, 67.01);
    api.set_geofences(1, vec![geofence(7, "Zone A"), geofence(8, "Zone B")]);
    api.set_geofences(2, vec![geofence(7, "Zone A (copy)"), geofence(9, "Zone C")]);

    let batch = fetch_many(api.clone(), &ids(&[1, 2])).await.unwrap();

    let names: Vec<&str> = batch.geofences.iter().map(|g| g.geofence_name.as_str()).collect();
    assert_eq!(names, vec!["Zone A", "Zone B", "Zone C"]);
}

#[tokio::test]
async fn test_all_entities_failing() {
    let api = FakeApi::new();
    api.fail(1);
    api.fail(2);

    let batch = fetch_many(api.clone(), &ids(&[1, 2])).await.unwrap();

    assert!(batch.all_failed());
    assert!(batch.locations.is_empty());
}

#[tokio::test]
async fn test_fetch_one_propagates_error() {
    let api = FakeApi::new();
    api.fail(4);
    let result = fetch_one(api.as_ref(), EntityId(4)).await;
    assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
}

#[tokio::test]
async fn test_fetch_layers() {
    let api = FakeApi::new();
    api.set_layers(vec![threat(1, "High")], vec![line(1, "railway"), line(2, "threat")]);

    let dyn_api: Arc<dyn TrackingApi> = api.clone();
    let layers = assert_ok!(fetch_layers(dyn_api.as_ref()).await);
    assert_eq!(layers.threats.len(), 1);
    assert_eq!(layers.lines.len(), 2);

    api.fail_layers(true);
    assert_err!(fetch_layers(dyn_api.as_ref()).await);
}
