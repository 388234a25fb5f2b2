//! REST client for the tracking backend.
//!
//! Only the read endpoints the tracking loop needs are covered: latest
//! location and assigned geofences per entity, plus the shared map layers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use validator::Validate;

use domain::models::{EntityId, Geofence, LineLayer, ThreatZone, TrackedEntity};

use crate::config::ApiConfig;
use crate::error::FetchError;

/// Read access to the tracking backend.
#[async_trait]
pub trait TrackingApi: Send + Sync {
    /// Latest location of an entity, `None` when it has no recent fix.
    async fn location(&self, id: EntityId) -> Result<Option<TrackedEntity>, FetchError>;

    /// Geofences assigned to an entity.
    async fn geofences(&self, id: EntityId) -> Result<Vec<Geofence>, FetchError>;

    async fn threats(&self) -> Result<Vec<ThreatZone>, FetchError>;

    async fn lines(&self) -> Result<Vec<LineLayer>, FetchError>;
}

/// [`TrackingApi`] over JSON/HTTP.
pub struct HttpTrackingApi {
    client: Client,
    config: ApiConfig,
}

impl HttpTrackingApi {
    pub fn new(config: ApiConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .build()
            .map_err(FetchError::Http)?;

        Ok(Self { client, config })
    }

    /// Builds `{base_url}/{path}[/{id}]`.
    fn endpoint(&self, path: &str, id: Option<EntityId>) -> String {
        build_endpoint(&self.config.base_url, path, id)
    }

    /// GET a JSON document. 404 maps to `Ok(None)`.
    async fn get_json(&self, url: &str) -> Result<Option<Value>, FetchError> {
        debug!(url = %url, "Requesting tracking data");

        let mut request = self.client.get(url);
        if let Some(token) = self.config.auth_token.as_deref().filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.config.timeout_secs)
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                endpoint: url.to_string(),
            });
        }

        let body = response.text().await.map_err(FetchError::Http)?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| FetchError::InvalidResponse {
                endpoint: url.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl TrackingApi for HttpTrackingApi {
    async fn location(&self, id: EntityId) -> Result<Option<TrackedEntity>, FetchError> {
        let url = self.endpoint(&self.config.location_path, Some(id));
        match self.get_json(&url).await? {
            Some(body) => decode_location(body, id),
            None => Ok(None),
        }
    }

    async fn geofences(&self, id: EntityId) -> Result<Vec<Geofence>, FetchError> {
        let url = self.endpoint(&self.config.geofence_path, Some(id));
        let body = self.get_json(&url).await?;
        decode_list(body, &["geofences", "data"], &url)
    }

    async fn threats(&self) -> Result<Vec<ThreatZone>, FetchError> {
        let url = self.endpoint(&self.config.threat_path, None);
        let body = self.get_json(&url).await?;
        decode_list(body, &["threats", "data"], &url)
    }

    async fn lines(&self) -> Result<Vec<LineLayer>, FetchError> {
        let url = self.endpoint(&self.config.line_path, None);
        let body = self.get_json(&url).await?;
        decode_list(body, &["lines", "data"], &url)
    }
}

pub(crate) fn build_endpoint(base_url: &str, path: &str, id: Option<EntityId>) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_matches('/');
    match id {
        Some(id) => format!("{}/{}/{}", base, path, id),
        None => format!("{}/{}", base, path),
    }
}

/// Decodes a location body.
///
/// Accepts a bare object, an object wrapped in `location`/`data`, or an
/// array (the first element wins). Missing data and positions outside the
/// valid coordinate range both read as "no location".
pub(crate) fn decode_location(
    body: Value,
    id: EntityId,
) -> Result<Option<TrackedEntity>, FetchError> {
    let value = match unwrap_envelope(body, &["location", "data"]) {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return Ok(None),
        },
        Value::Object(map) if map.is_empty() => return Ok(None),
        Value::Null => return Ok(None),
        other => other,
    };

    let entity: TrackedEntity =
        serde_json::from_value(value).map_err(|e| FetchError::InvalidResponse {
            endpoint: format!("location/{}", id),
            message: e.to_string(),
        })?;

    if let Err(e) = entity.validate() {
        warn!(entity_id = %id, error = %e, "Discarding location with invalid coordinates");
        return Ok(None);
    }

    Ok(Some(entity))
}

/// Decodes a list body, skipping elements that fail to decode.
pub(crate) fn decode_list<T: DeserializeOwned>(
    body: Option<Value>,
    envelope_keys: &[&str],
    endpoint: &str,
) -> Result<Vec<T>, FetchError> {
    let Some(body) = body else {
        return Ok(Vec::new());
    };

    let items = match unwrap_envelope(body, envelope_keys) {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(FetchError::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: format!("expected a list, got {}", json_type(&other)),
            })
        }
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(endpoint = %endpoint, index = idx, error = %e, "Skipping malformed item");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        debug!(
            endpoint = %endpoint,
            total = total,
            decoded = decoded.len(),
            "Partially decoded list"
        );
    }

    Ok(decoded)
}

fn unwrap_envelope(body: Value, keys: &[&str]) -> Value {
    match body {
        Value::Object(mut map) => {
            for key in keys {
                if let Some(inner) = map.remove(*key) {
                    return inner;
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
