//! Host side of the map surface protocol.
//!
//! The surface runs its own script and talks to the host only through
//! fire-and-forget messages. [`MapBridge`] gates outbound messages on the
//! surface's `map_ready` signal and turns inbound text into typed events.

use chrono::NaiveDateTime;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use domain::models::{HostMessage, SurfaceEvent};
use domain::services::{render_message, RenderInput};

use crate::error::BridgeError;

/// Longest prefix of a malformed message kept in logs.
const MAX_LOGGED_MESSAGE_LEN: usize = 200;

/// Destination for outbound map messages.
pub trait MapSurface: Send {
    fn post(&mut self, message: &HostMessage) -> Result<(), BridgeError>;
}

/// Delivers encoded JSON messages over an unbounded channel.
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSurface {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MapSurface for ChannelSurface {
    fn post(&mut self, message: &HostMessage) -> Result<(), BridgeError> {
        let json = message.encode()?;
        self.tx.send(json).map_err(|_| BridgeError::SurfaceClosed)
    }
}

/// Hands a ready-to-evaluate script to a webview injector.
pub struct ScriptSurface<F: FnMut(String) + Send> {
    inject: F,
}

impl<F: FnMut(String) + Send> ScriptSurface<F> {
    pub fn new(inject: F) -> Self {
        Self { inject }
    }
}

impl<F: FnMut(String) + Send> MapSurface for ScriptSurface<F> {
    fn post(&mut self, message: &HostMessage) -> Result<(), BridgeError> {
        let script = message.to_injection_script()?;
        (self.inject)(script);
        Ok(())
    }
}

/// Readiness-gated connection to one map surface.
pub struct MapBridge<S: MapSurface> {
    surface: S,
    ready: bool,
}

impl<S: MapSurface> MapBridge<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Sends a message if the surface is ready.
    ///
    /// Returns `Ok(false)` when the message was dropped because the surface
    /// has not signalled readiness. Nothing is queued.
    pub fn send(&mut self, message: &HostMessage) -> Result<bool, BridgeError> {
        if !self.ready {
            debug!(kind = message.kind(), "Map surface not ready, dropping message");
            return Ok(false);
        }
        self.surface.post(message)?;
        Ok(true)
    }

    /// Renders the full payload for the given collections.
    pub fn render(&mut self, input: &RenderInput<'_>, now: NaiveDateTime) -> Result<bool, BridgeError> {
        if !self.ready {
            debug!("Map surface not ready, skipping render");
            return Ok(false);
        }
        self.send(&render_message(input, now))
    }

    /// Decodes one inbound message. Malformed input is logged and dropped.
    pub fn receive(&mut self, raw: &str) -> Option<SurfaceEvent> {
        match SurfaceEvent::decode(raw) {
            Ok(event) => {
                if event == SurfaceEvent::MapReady {
                    debug!("Map surface ready");
                    self.ready = true;
                }
                Some(event)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    message = %truncate(raw, MAX_LOGGED_MESSAGE_LEN),
                    "Dropping malformed map message"
                );
                None
            }
        }
    }
}

/// Writes every message received from a [`ChannelSurface`] as one line.
///
/// Runs until the sending side is dropped. Keeps output I/O off the session
/// task.
pub async fn forward_lines<W>(
    mut messages: mpsc::UnboundedReceiver<String>,
    mut writer: W,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = messages.recv().await {
        writer.write_all(message.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{EntityId, TrackedEntity};
    use domain::services::geofence_status::parse_date_time;

    fn now() -> NaiveDateTime {
        parse_date_time("2024-01-05", None).unwrap()
    }

    fn entities() -> Vec<TrackedEntity> {
        vec![TrackedEntity {
            employee_id: EntityId(1),
            latitude: 24.86,
            longitude: 67.0,
            name: Some("Sana".to_string()),
            image: None,
            recorded_at: None,
        }]
    }

    #[test]
    fn test_render_is_noop_until_ready() {
        let (surface, mut rx) = ChannelSurface::new();
        let mut bridge = MapBridge::new(surface);
        let entities = entities();
        let input = RenderInput {
            entities: &entities,
            ..Default::default()
        };

        assert!(!bridge.render(&input, now()).unwrap());
        assert!(rx.try_recv().is_err());

        assert_eq!(bridge.receive(r#"{"type":"map_ready"}"#), Some(SurfaceEvent::MapReady));
        assert!(bridge.is_ready());
        assert!(bridge.render(&input, now()).unwrap());

        let sent: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(sent["type"], "render");
        assert_eq!(sent["markers"][0]["employee_id"], 1);
        // Dropped renders are not replayed.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_receive_malformed_returns_none() {
        let (surface, _rx) = ChannelSurface::new();
        let mut bridge = MapBridge::new(surface);
        assert_eq!(bridge.receive("not json"), None);
        assert_eq!(bridge.receive(r#"{"type":"unknown"}"#), None);
        assert!(!bridge.is_ready());
    }

    #[test]
    fn test_closed_channel_is_an_error() {
        let (surface, rx) = ChannelSurface::new();
        drop(rx);
        let mut bridge = MapBridge::new(surface);
        bridge.receive(r#"{"type":"map_ready"}"#);
        assert!(matches!(
            bridge.send(&HostMessage::Clear),
            Err(BridgeError::SurfaceClosed)
        ));
    }

    #[tokio::test]
    async fn test_forward_lines_writes_json_lines() {
        let (surface, rx) = ChannelSurface::new();
        let mut bridge = MapBridge::new(surface);
        bridge.receive(r#"{"type":"map_ready"}"#);
        bridge.send(&HostMessage::Clear).unwrap();
        bridge
            .send(&HostMessage::Focus {
                latitude: 1.0,
                longitude: 2.0,
                zoom: 15,
            })
            .unwrap();
        drop(bridge);

        let mut out = Vec::new();
        forward_lines(rx, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"type":"clear"}"#);
        assert!(lines[1].starts_with(r#"{"type":"focus""#));
    }

    #[test]
    fn test_script_surface_injects_scripts() {
        let scripts = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&scripts);
        let mut bridge = MapBridge::new(ScriptSurface::new(move |s| sink.lock().unwrap().push(s)));
        bridge.receive(r#"{"type":"map_ready"}"#);
        bridge.send(&HostMessage::Clear).unwrap();

        let scripts = scripts.lock().unwrap();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].starts_with("window.dispatchEvent("));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
