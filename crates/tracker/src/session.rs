//! Tracking session: owns the polling loop, the current snapshot and the
//! map bridge for one tracking screen.
//!
//! A session runs as a single tokio task. Callers talk to it through a
//! [`SessionHandle`] and observe its state through a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use domain::models::{
    EntityId, Geofence, HostMessage, LineLayer, Selection, SurfaceEvent, ThreatZone, TrackedEntity,
};
use domain::services::{assess, GeofenceAssessment, RenderInput};

use crate::bridge::{MapBridge, MapSurface};
use crate::client::TrackingApi;
use crate::config::TrackingConfig;
use crate::error::{FetchError, SessionError};
use crate::fetcher::{dedup_ids, fetch_layers, fetch_many, BatchSnapshot, FetchFailure, LayerSnapshot};

/// Zoom level used when centring on a single entity.
pub const FOCUS_ZOOM: u8 = 15;

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Cadence while several entities are selected.
    pub poll_interval: Duration,
    /// Cadence while exactly one entity is selected.
    pub single_entity_poll_interval: Duration,
    pub include_layers: bool,
    pub initial_selection: Vec<EntityId>,
}

impl SessionOptions {
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            single_entity_poll_interval: Duration::from_secs(config.single_entity_poll_interval_secs),
            include_layers: config.include_layers,
            initial_selection: config.entity_ids.clone(),
        }
    }

    fn interval_for(&self, selected: usize) -> Duration {
        if selected == 1 {
            self.single_entity_poll_interval
        } else {
            self.poll_interval
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            single_entity_poll_interval: Duration::from_secs(30),
            include_layers: false,
            initial_selection: Vec::new(),
        }
    }
}

/// Lifecycle of a tracking screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    /// Nothing selected.
    #[default]
    Idle,
    /// A fetch is in flight, or the current selection has no data yet.
    Loading,
    Rendered,
    /// A feature popup is shown on top of the rendered map.
    PopupOpen(Selection),
}

/// Everything the session currently knows, published after every change.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Generation of the last applied fetch, 0 before the first one.
    pub generation: u64,
    /// Entity ids being tracked. `entities` and `geofences` always belong
    /// to this selection.
    pub selection: Vec<EntityId>,
    pub entities: Vec<TrackedEntity>,
    pub geofences: Vec<Geofence>,
    pub threats: Vec<ThreatZone>,
    pub lines: Vec<LineLayer>,
    /// Entities that failed in the last applied fetch.
    pub failures: Vec<FetchFailure>,
    /// Fetch-level error shown to the user until dismissed or replaced.
    pub error: Option<String>,
    pub state: SessionState,
    pub last_event: Option<SurfaceEvent>,
    pub fetched_at: Option<NaiveDateTime>,
}

impl Snapshot {
    /// Status of every geofence at `now`, in geofence order.
    pub fn assessments(&self, now: NaiveDateTime) -> Vec<(&Geofence, GeofenceAssessment)> {
        self.geofences.iter().map(|g| (g, assess(g, now))).collect()
    }

    /// True once a fetch for the current selection has succeeded.
    pub fn has_data(&self) -> bool {
        self.fetched_at.is_some()
    }

    fn render_input(&self) -> RenderInput<'_> {
        RenderInput {
            entities: &self.entities,
            geofences: &self.geofences,
            threats: &self.threats,
            lines: &self.lines,
        }
    }
}

#[derive(Debug)]
enum Command {
    Select(Vec<EntityId>),
    Refresh,
    Inbound(String),
    DismissPopup,
    DismissError,
    Focus(EntityId),
}

/// Client side of a running session. Dropping it stops the session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<Snapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Replaces the selection and fetches immediately.
    pub fn select(&self, ids: Vec<EntityId>) -> Result<(), SessionError> {
        self.send(Command::Select(ids))
    }

    pub fn refresh(&self) -> Result<(), SessionError> {
        self.send(Command::Refresh)
    }

    /// Forwards one raw message posted by the map surface.
    pub fn inbound(&self, raw: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Inbound(raw.into()))
    }

    pub fn dismiss_popup(&self) -> Result<(), SessionError> {
        self.send(Command::DismissPopup)
    }

    pub fn dismiss_error(&self) -> Result<(), SessionError> {
        self.send(Command::DismissError)
    }

    /// Centres the map on an entity of the current snapshot.
    pub fn focus(&self, id: EntityId) -> Result<(), SessionError> {
        self.send(Command::Focus(id))
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.commands.is_closed()
    }

    /// Stops the session and waits for its task to finish.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Tracking session task ended abnormally");
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Outcome of one fetch cycle.
struct Cycle {
    batch: Result<BatchSnapshot, FetchError>,
    layers: Option<Result<LayerSnapshot, FetchError>>,
}

pub struct TrackingSession<S: MapSurface> {
    api: Arc<dyn TrackingApi>,
    bridge: MapBridge<S>,
    options: SessionOptions,
    snapshot: Snapshot,
    snapshot_tx: watch::Sender<Snapshot>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    interval: Option<Interval>,
    fetches: JoinSet<(u64, Cycle)>,
    /// Last generation handed out.
    issued: u64,
    /// First generation belonging to the current selection.
    selection_epoch: u64,
    last_applied: u64,
}

impl<S: MapSurface + 'static> TrackingSession<S> {
    /// Starts a session on the current tokio runtime.
    pub fn spawn(api: Arc<dyn TrackingApi>, surface: S, options: SessionOptions) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
        let cancel = CancellationToken::new();

        let session = Self {
            api,
            bridge: MapBridge::new(surface),
            options,
            snapshot: Snapshot::default(),
            snapshot_tx,
            commands: command_rx,
            cancel: cancel.clone(),
            interval: None,
            fetches: JoinSet::new(),
            issued: 0,
            selection_epoch: 0,
            last_applied: 0,
        };

        let task = tokio::spawn(session.run());

        SessionHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            cancel,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        info!("Tracking session started");

        let initial = std::mem::take(&mut self.options.initial_selection);
        if !initial.is_empty() {
            self.select(initial);
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Tracking session cancelled");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All session handles dropped");
                        break;
                    }
                },
                _ = next_tick(&mut self.interval) => {
                    debug!("Polling tick");
                    self.start_fetch();
                }
                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    self.handle_joined(joined);
                }
            }
        }

        self.interval = None;
        self.fetches.abort_all();
        self.snapshot_tx.send_replace(Snapshot::default());
        info!("Tracking session stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Select(ids) => self.select(ids),
            Command::Refresh => {
                if self.snapshot.selection.is_empty() {
                    debug!("Refresh ignored, nothing selected");
                } else {
                    self.start_fetch();
                }
            }
            Command::Inbound(raw) => self.handle_inbound(&raw),
            Command::DismissPopup => {
                if matches!(self.snapshot.state, SessionState::PopupOpen(_)) {
                    self.snapshot.state = self.settled_state();
                    self.publish();
                }
            }
            Command::DismissError => {
                if self.snapshot.error.take().is_some() {
                    self.publish();
                }
            }
            Command::Focus(id) => self.focus(id),
        }
    }

    fn select(&mut self, ids: Vec<EntityId>) {
        let ids = dedup_ids(&ids);
        if ids == self.snapshot.selection && !ids.is_empty() {
            debug!(count = ids.len(), "Selection unchanged, refreshing");
            self.start_fetch();
            return;
        }

        info!(count = ids.len(), "Selection changed");
        self.fetches.abort_all();
        self.selection_epoch = self.issued + 1;

        if ids.is_empty() {
            self.interval = None;
            self.snapshot = Snapshot {
                last_event: self.snapshot.last_event.take(),
                ..Default::default()
            };
            if let Err(e) = self.bridge.send(&HostMessage::Clear) {
                warn!(error = %e, "Failed to clear map");
            }
            self.publish();
            return;
        }

        let period = self.options.interval_for(ids.len());
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);

        // Entity data of the previous selection must not outlive it. Layers
        // are shared and stay.
        let had_data = self.snapshot.has_data();
        let snapshot = &mut self.snapshot;
        snapshot.selection = ids;
        snapshot.entities.clear();
        snapshot.geofences.clear();
        snapshot.failures.clear();
        snapshot.error = None;
        snapshot.fetched_at = None;
        snapshot.state = SessionState::Loading;
        if had_data {
            self.render();
        }

        self.start_fetch();
    }

    fn start_fetch(&mut self) {
        if self.snapshot.selection.is_empty() {
            return;
        }

        self.issued += 1;
        let generation = self.issued;
        let api = Arc::clone(&self.api);
        let ids = self.snapshot.selection.clone();
        let include_layers = self.options.include_layers;

        debug!(generation = generation, count = ids.len(), "Fetch started");
        self.fetches
            .spawn(async move { (generation, run_cycle(api, ids, include_layers).await) });

        if !matches!(self.snapshot.state, SessionState::PopupOpen(_)) {
            self.snapshot.state = SessionState::Loading;
        }
        self.publish();
    }

    fn handle_joined(&mut self, joined: Result<(u64, Cycle), JoinError>) {
        match joined {
            Ok((generation, cycle)) => self.apply(generation, cycle),
            Err(e) if e.is_cancelled() => debug!("Superseded fetch aborted"),
            Err(e) => warn!(error = %e, "Fetch task failed"),
        }
    }

    fn apply(&mut self, generation: u64, cycle: Cycle) {
        if generation < self.selection_epoch || generation <= self.last_applied {
            debug!(
                generation = generation,
                last_applied = self.last_applied,
                "Discarding superseded fetch"
            );
            return;
        }
        self.last_applied = generation;

        let snapshot = &mut self.snapshot;
        snapshot.generation = generation;
        snapshot.error = None;

        match cycle.batch {
            Ok(batch) if batch.all_failed() => {
                warn!(generation = generation, "Every entity fetch failed, keeping previous data");
                snapshot.error = Some(format!(
                    "Could not load tracking data for {} selected entities",
                    batch.requested
                ));
                snapshot.failures = batch.failures;
            }
            Ok(batch) => {
                snapshot.entities = batch.locations;
                snapshot.geofences = batch.geofences;
                snapshot.failures = batch.failures;
                snapshot.fetched_at = Some(Local::now().naive_local());
            }
            Err(e) => {
                warn!(generation = generation, error = %e, "Fetch failed, keeping previous data");
                snapshot.error = Some(e.to_string());
            }
        }

        match cycle.layers {
            Some(Ok(layers)) => {
                snapshot.threats = layers.threats;
                snapshot.lines = layers.lines;
            }
            Some(Err(e)) => {
                warn!(error = %e, "Layer fetch failed, keeping previous layers");
                if snapshot.error.is_none() {
                    snapshot.error = Some(e.to_string());
                }
            }
            None => {}
        }

        if !matches!(snapshot.state, SessionState::PopupOpen(_)) {
            snapshot.state = if snapshot.has_data() {
                SessionState::Rendered
            } else {
                SessionState::Loading
            };
        }

        debug!(
            generation = generation,
            entities = snapshot.entities.len(),
            geofences = snapshot.geofences.len(),
            failures = snapshot.failures.len(),
            "Fetch applied"
        );

        self.render();
        self.publish();
    }

    fn handle_inbound(&mut self, raw: &str) {
        let Some(event) = self.bridge.receive(raw) else {
            return;
        };
        debug!(kind = event.kind(), "Map event");

        match &event {
            SurfaceEvent::MapReady => {
                if self.snapshot.has_data() {
                    self.render();
                }
            }
            _ => {
                if let Some(selection) = event.clone().into_selection() {
                    self.snapshot.state = SessionState::PopupOpen(selection);
                }
            }
        }

        self.snapshot.last_event = Some(event);
        self.publish();
    }

    fn focus(&mut self, id: EntityId) {
        let Some(entity) = self.snapshot.entities.iter().find(|e| e.employee_id == id) else {
            debug!(entity_id = %id, "Cannot focus, entity has no location");
            return;
        };
        let message = HostMessage::Focus {
            latitude: entity.latitude,
            longitude: entity.longitude,
            zoom: FOCUS_ZOOM,
        };
        if let Err(e) = self.bridge.send(&message) {
            warn!(error = %e, "Failed to focus map");
        }
    }

    fn render(&mut self) {
        let now = Local::now().naive_local();
        if let Err(e) = self.bridge.render(&self.snapshot.render_input(), now) {
            warn!(error = %e, "Failed to render map");
        }
    }

    /// State to return to when no popup is shown.
    fn settled_state(&self) -> SessionState {
        if self.snapshot.selection.is_empty() {
            SessionState::Idle
        } else if self.snapshot.has_data() && self.fetches.is_empty() {
            SessionState::Rendered
        } else {
            SessionState::Loading
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot.clone());
    }
}

async fn run_cycle(api: Arc<dyn TrackingApi>, ids: Vec<EntityId>, include_layers: bool) -> Cycle {
    if include_layers {
        let (batch, layers) = tokio::join!(fetch_many(Arc::clone(&api), &ids), fetch_layers(api.as_ref()));
        Cycle {
            batch,
            layers: Some(layers),
        }
    } else {
        Cycle {
            batch: fetch_many(api, &ids).await,
            layers: None,
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) -> Instant {
    match interval {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ids: Vec<EntityId>) -> TrackingConfig {
        TrackingConfig {
            entity_ids: ids,
            poll_interval_secs: 10,
            single_entity_poll_interval_secs: 30,
            include_layers: true,
        }
    }

    #[test]
    fn test_options_from_config() {
        let options = SessionOptions::from_config(&config(vec![EntityId(1), EntityId(2)]));
        assert_eq!(options.poll_interval, Duration::from_secs(10));
        assert_eq!(options.single_entity_poll_interval, Duration::from_secs(30));
        assert!(options.include_layers);
        assert_eq!(options.initial_selection.len(), 2);
    }

    #[test]
    fn test_interval_depends_on_selection_size() {
        let options = SessionOptions::default();
        assert_eq!(options.interval_for(1), Duration::from_secs(30));
        assert_eq!(options.interval_for(2), Duration::from_secs(10));
    }

    #[test]
    fn test_default_snapshot_has_no_data() {
        let snapshot = Snapshot::default();
        assert!(!snapshot.has_data());
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(snapshot.assessments(Local::now().naive_local()).is_empty());
    }
}
