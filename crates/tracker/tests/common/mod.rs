//! Common test utilities for integration tests.
//!
//! Provides an in-memory [`TrackingApi`] whose responses can be scripted per
//! entity while a session is running.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};

use domain::models::{EntityId, Geofence, LineLayer, ThreatZone, TrackedEntity};
use fleet_tracker::client::TrackingApi;
use fleet_tracker::error::FetchError;
use fleet_tracker::session::Snapshot;

#[derive(Default)]
struct FakeState {
    locations: HashMap<EntityId, TrackedEntity>,
    geofences: HashMap<EntityId, Vec<Geofence>>,
    failing: HashSet<EntityId>,
    delays: HashMap<EntityId, Duration>,
    queued_delays: HashMap<EntityId, VecDeque<Duration>>,
    threats: Vec<ThreatZone>,
    lines: Vec<LineLayer>,
    layers_failing: bool,
}

/// Scriptable tracking backend.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
    location_calls: AtomicUsize,
    layer_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_location(&self, id: i64, latitude: f64, longitude: f64) {
        self.state
            .lock()
            .unwrap()
            .locations
            .insert(EntityId(id), entity(id, latitude, longitude));
    }

    pub fn set_geofences(&self, id: i64, geofences: Vec<Geofence>) {
        self.state.lock().unwrap().geofences.insert(EntityId(id), geofences);
    }

    pub fn fail(&self, id: i64) {
        self.state.lock().unwrap().failing.insert(EntityId(id));
    }

    pub fn recover(&self, id: i64) {
        self.state.lock().unwrap().failing.remove(&EntityId(id));
    }

    /// Delays every request for `id`.
    pub fn delay(&self, id: i64, delay: Duration) {
        self.state.lock().unwrap().delays.insert(EntityId(id), delay);
    }

    /// Delays the next location requests for `id`, one entry per call.
    /// Takes precedence over [`FakeApi::delay`].
    pub fn queue_delays(&self, id: i64, delays: Vec<Duration>) {
        self.state
            .lock()
            .unwrap()
            .queued_delays
            .entry(EntityId(id))
            .or_default()
            .extend(delays);
    }

    pub fn set_layers(&self, threats: Vec<ThreatZone>, lines: Vec<LineLayer>) {
        let mut state = self.state.lock().unwrap();
        state.threats = threats;
        state.lines = lines;
    }

    pub fn fail_layers(&self, failing: bool) {
        self.state.lock().unwrap().layers_failing = failing;
    }

    pub fn location_calls(&self) -> usize {
        self.location_calls.load(Ordering::SeqCst)
    }

    pub fn layer_calls(&self) -> usize {
        self.layer_calls.load(Ordering::SeqCst)
    }

    async fn pause_for(&self, id: EntityId) {
        let delay = self.state.lock().unwrap().delays.get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, id: EntityId, endpoint: &str) -> Result<(), FetchError> {
        if self.state.lock().unwrap().failing.contains(&id) {
            return Err(unavailable(&format!("{}/{}", endpoint, id)));
        }
        Ok(())
    }

    fn check_layers(&self, endpoint: &str) -> Result<(), FetchError> {
        if self.state.lock().unwrap().layers_failing {
            return Err(unavailable(endpoint));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackingApi for FakeApi {
    async fn location(&self, id: EntityId) -> Result<Option<TrackedEntity>, FetchError> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        // The response is captured when the request arrives.
        let (location, delay) = {
            let mut guard = self.state.lock().unwrap();
            let state = &mut *guard;
            let delay = state
                .queued_delays
                .get_mut(&id)
                .and_then(VecDeque::pop_front)
                .or_else(|| state.delays.get(&id).copied());
            (state.locations.get(&id).cloned(), delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check(id, "locations/employee")?;
        Ok(location)
    }

    async fn geofences(&self, id: EntityId) -> Result<Vec<Geofence>, FetchError> {
        self.pause_for(id).await;
        self.check(id, "geofences/employee")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .geofences
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn threats(&self) -> Result<Vec<ThreatZone>, FetchError> {
        self.layer_calls.fetch_add(1, Ordering::SeqCst);
        self.check_layers("layers/threats")?;
        Ok(self.state.lock().unwrap().threats.clone())
    }

    async fn lines(&self) -> Result<Vec<LineLayer>, FetchError> {
        self.check_layers("layers/lines")?;
        Ok(self.state.lock().unwrap().lines.clone())
    }
}

fn unavailable(endpoint: &str) -> FetchError {
    FetchError::Status {
        status: 503,
        endpoint: endpoint.to_string(),
    }
}

pub fn entity(id: i64, latitude: f64, longitude: f64) -> TrackedEntity {
    serde_json::from_value(json!({
        "employee_id": id,
        "employee_name": format!("Employee {}", id),
        "latitude": latitude,
        "longitude": longitude,
        "timestamp": "2024-01-05T10:00:00Z"
    }))
    .unwrap()
}

/// Polygon geofence active through 2099.
pub fn geofence(id: i64, name: &str) -> Geofence {
    serde_json::from_value(json!({
        "geofence_id": id,
        "geofence_name": name,
        "boundary": [
            {"latitude": 24.80, "longitude": 67.00},
            {"latitude": 24.90, "longitude": 67.00},
            {"latitude": 24.90, "longitude": 67.10}
        ],
        "start_date": "2024-01-01",
        "end_date": "2099-12-31",
        "is_active": true,
        "is_violating": false
    }))
    .unwrap()
}

pub fn threat(id: i64, severity: &str) -> ThreatZone {
    serde_json::from_value(json!({
        "threat_id": id,
        "name": format!("Threat {}", id),
        "severity": severity,
        "boundary": [
            {"latitude": 24.70, "longitude": 67.20},
            {"latitude": 24.75, "longitude": 67.20},
            {"latitude": 24.75, "longitude": 67.25}
        ]
    }))
    .unwrap()
}

pub fn line(id: i64, category: &str) -> LineLayer {
    serde_json::from_value(json!({
        "line_id": id,
        "name": format!("Line {}", id),
        "category": category,
        "points": [
            {"latitude": 24.80, "longitude": 67.30},
            {"latitude": 24.85, "longitude": 67.35}
        ]
    }))
    .unwrap()
}

/// Waits until the published snapshot satisfies `predicate`.
pub async fn wait_for(
    rx: &mut watch::Receiver<Snapshot>,
    predicate: impl FnMut(&Snapshot) -> bool,
) -> Snapshot {
    tokio::time::timeout(Duration::from_secs(300), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("session dropped its snapshot channel")
        .clone()
}

/// Waits until the backend has seen at least `calls` location requests.
pub async fn wait_for_calls(api: &FakeApi, calls: usize) {
    tokio::time::timeout(Duration::from_secs(300), async {
        while api.location_calls() < calls {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("timed out waiting for location requests");
}

/// Decodes every message posted to a channel surface so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
    let mut messages = Vec::new();
    while let Ok(raw) = rx.try_recv() {
        messages.push(serde_json::from_str(&raw).expect("surface message is JSON"));
    }
    messages
}
