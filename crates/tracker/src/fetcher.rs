//! Snapshot fetching for one or many tracked entities.
//!
//! Every entity is fetched in its own task so a failure for one of them is
//! recorded and never aborts the rest of the batch.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use domain::models::{EntityId, Geofence, LineLayer, ThreatZone, TrackedEntity};

use crate::client::TrackingApi;
use crate::error::FetchError;

/// Location and geofences of a single entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    /// `None` when the entity has no recent location.
    pub location: Option<TrackedEntity>,
    pub geofences: Vec<Geofence>,
}

/// An entity whose fetch failed within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub entity_id: EntityId,
    pub error: String,
    pub retryable: bool,
}

impl FetchFailure {
    fn new(entity_id: EntityId, error: &FetchError) -> Self {
        Self {
            entity_id,
            error: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Result of a multi-entity fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSnapshot {
    /// Locations in selection order; entities without a fix are absent.
    pub locations: Vec<TrackedEntity>,
    /// Geofences of every entity, de-duplicated by id (first wins).
    pub geofences: Vec<Geofence>,
    pub failures: Vec<FetchFailure>,
    /// Number of distinct entities requested.
    pub requested: usize,
}

impl BatchSnapshot {
    /// True when not a single entity could be fetched.
    pub fn all_failed(&self) -> bool {
        self.requested > 0 && self.failures.len() == self.requested
    }
}

/// Shared map layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSnapshot {
    pub threats: Vec<ThreatZone>,
    pub lines: Vec<LineLayer>,
}

/// Fetches the location and geofences of one entity.
pub async fn fetch_one(api: &dyn TrackingApi, id: EntityId) -> Result<EntitySnapshot, FetchError> {
    let (location, geofences) = tokio::join!(api.location(id), api.geofences(id));

    Ok(EntitySnapshot {
        entity_id: id,
        location: location?,
        geofences: geofences?,
    })
}

/// Fetches every entity concurrently.
///
/// Duplicate ids are collapsed. Per-entity errors end up in
/// [`BatchSnapshot::failures`]; only an empty id set is an error.
pub async fn fetch_many(
    api: Arc<dyn TrackingApi>,
    ids: &[EntityId],
) -> Result<BatchSnapshot, FetchError> {
    let ids = dedup_ids(ids);
    if ids.is_empty() {
        return Err(FetchError::NoEntities);
    }

    let mut tasks = JoinSet::new();
    for (idx, id) in ids.iter().copied().enumerate() {
        let api = Arc::clone(&api);
        tasks.spawn(async move { (idx, fetch_one(api.as_ref(), id).await) });
    }

    let mut results: Vec<Option<Result<EntitySnapshot, FetchError>>> =
        (0..ids.len()).map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, result)) => results[idx] = Some(result),
            Err(e) => warn!(error = %e, "Entity fetch task failed"),
        }
    }

    let mut batch = BatchSnapshot {
        requested: ids.len(),
        ..Default::default()
    };
    let mut seen_geofences = HashSet::new();

    for (id, result) in ids.iter().copied().zip(results) {
        match result.unwrap_or(Err(FetchError::Aborted(id))) {
            Ok(snapshot) => {
                if let Some(location) = snapshot.location {
                    batch.locations.push(location);
                } else {
                    debug!(entity_id = %id, "Entity has no recent location");
                }
                for geofence in snapshot.geofences {
                    if seen_geofences.insert(geofence.geofence_id) {
                        batch.geofences.push(geofence);
                    }
                }
            }
            Err(e) => {
                warn!(entity_id = %id, error = %e, "Entity fetch failed");
                batch.failures.push(FetchFailure::new(id, &e));
            }
        }
    }

    Ok(batch)
}

/// Fetches threat zones and line layers.
pub async fn fetch_layers(api: &dyn TrackingApi) -> Result<LayerSnapshot, FetchError> {
    let (threats, lines) = tokio::try_join!(api.threats(), api.lines())?;
    Ok(LayerSnapshot { threats, lines })
}

/// Removes duplicate ids, keeping first-occurrence order.
pub fn dedup_ids(ids: &[EntityId]) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
