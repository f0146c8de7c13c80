//! Session glue between pointer input, the sync channel and the scene.
//!
//! The host feeds pointer events and calls [`Session::pump`] once per turn
//! of its event loop. Every mutation is followed by an explicit scene
//! rebuild; there is no hidden re-render scheduling.

use kurbo::{Point, Vec2};
use thiserror::Error;

use crate::config::SessionConfig;
use crate::drag::{CursorHint, DragController, MoveOutcome};
use crate::scene::{Scene, SceneStyle};
use crate::sync::{ConnectionState, Endpoint, PlatformSyncChannel, SyncError, SyncEvent};

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Endpoint cannot change while the connection is {0}")]
    EndpointLocked(ConnectionState),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Owns the drag controller, the sync channel and the current scene.
pub struct Session {
    drag: DragController,
    channel: PlatformSyncChannel,
    endpoint: Endpoint,
    style: SceneStyle,
    scene: Scene,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let drag = DragController::new(config.surface, config.point, config.radius);
        let style = SceneStyle::default();
        let scene = Scene::build(drag.surface().bounds(), drag.point(), drag.radius(), style);
        Self {
            drag,
            channel: PlatformSyncChannel::new(),
            endpoint: config.endpoint,
            style,
            scene,
        }
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn radius(&self) -> f64 {
        self.drag.radius()
    }

    /// Replace the scene style and redraw.
    pub fn set_style(&mut self, style: SceneStyle) {
        self.style = style;
        self.rebuild_scene();
    }

    /// Change the peer address. Only allowed while disconnected.
    pub fn set_endpoint(&mut self, endpoint: Endpoint) -> Result<(), SessionError> {
        let state = self.channel.state();
        if state != ConnectionState::Disconnected {
            return Err(SessionError::EndpointLocked(state));
        }
        self.endpoint = endpoint;
        Ok(())
    }

    /// Connect to the configured endpoint.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        log::info!("Connect requested to: {}", self.endpoint.url());
        self.channel.connect(&self.endpoint)?;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.channel.disconnect();
    }

    /// Connect when disconnected, disconnect otherwise.
    pub fn toggle_connection(&mut self) -> Result<(), SessionError> {
        if self.channel.state() == ConnectionState::Disconnected {
            self.connect()
        } else {
            self.disconnect();
            Ok(())
        }
    }

    /// The surface moved within the viewport.
    pub fn set_surface_origin(&mut self, origin: Vec2) {
        self.drag.set_surface_origin(origin);
    }

    pub fn pointer_down(&mut self, viewport: Point) -> CursorHint {
        self.drag.on_pointer_down(viewport);
        self.drag.cursor_hint(viewport)
    }

    /// Move the pointer; while dragging, the new position is redrawn and
    /// sent to the peer right away.
    pub fn pointer_move(&mut self, viewport: Point) -> CursorHint {
        if let MoveOutcome::Dragged(position) = self.drag.on_pointer_move(viewport) {
            self.rebuild_scene();
            if let Err(e) = self.channel.send_position(position) {
                log::trace!("Position not sent: {}", e);
            }
        }
        self.drag.cursor_hint(viewport)
    }

    pub fn pointer_up(&mut self) -> CursorHint {
        self.drag.on_pointer_up();
        CursorHint::Default
    }

    pub fn pointer_leave(&mut self) -> CursorHint {
        self.drag.on_pointer_leave();
        CursorHint::Default
    }

    /// Apply pending channel notifications and return them for the UI.
    pub fn pump(&mut self) -> Vec<SyncEvent> {
        let events = self.channel.poll_events();
        for event in &events {
            self.apply_event(event);
        }
        events
    }

    fn apply_event(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Connected => {
                log::info!("Connected to {}", self.endpoint.url());
            }
            SyncEvent::Disconnected { reason: Some(reason) } => {
                log::warn!("Disconnected: {}", reason);
            }
            SyncEvent::Disconnected { reason: None } => {
                log::info!("Disconnected");
            }
            SyncEvent::RadiusChanged(radius) => {
                log::debug!("Radius changed to {}", radius);
                self.drag.set_radius(*radius);
                self.rebuild_scene();
            }
        }
    }

    fn rebuild_scene(&mut self) {
        self.scene = Scene::build(
            self.drag.surface().bounds(),
            self.drag.point(),
            self.drag.radius(),
            self.style,
        );
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::DragState;

    #[test]
    fn test_initial_scene() {
        let session = Session::default();
        assert_eq!(session.scene().center(), Point::new(100.0, 100.0));
        assert!((session.scene().radius() - 30.0).abs() < f64::EPSILON);
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_drag_updates_scene_while_disconnected() {
        let mut session = Session::default();
        assert_eq!(session.pointer_down(Point::new(110.0, 100.0)), CursorHint::Grabbing);
        assert_eq!(session.pointer_move(Point::new(200.0, 150.0)), CursorHint::Grabbing);

        assert_eq!(session.drag().point(), Point::new(200.0, 150.0));
        assert_eq!(session.scene().center(), Point::new(200.0, 150.0));
        assert_eq!(session.pointer_up(), CursorHint::Default);
        assert_eq!(session.drag().state(), DragState::Idle);
        // Dropped sends leave no trace.
        assert!(session.pump().is_empty());
    }

    #[test]
    fn test_missed_pointer_down_leaves_point() {
        let mut session = Session::default();
        session.pointer_down(Point::new(150.0, 100.0));
        assert_eq!(session.pointer_move(Point::new(200.0, 150.0)), CursorHint::Default);
        assert_eq!(session.pointer_move(Point::new(100.0, 100.0)), CursorHint::Pointer);
        assert_eq!(session.drag().point(), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_endpoint_change_while_disconnected() {
        let mut session = Session::default();
        session.set_endpoint(Endpoint::new("localhost", "9000")).unwrap();
        assert_eq!(session.endpoint().url(), "ws://localhost:9000");
    }

    #[test]
    fn test_endpoint_locked_while_connecting() {
        let mut session = Session::default();
        session.set_endpoint(Endpoint::new("", "not-a-port")).unwrap();
        session.connect().unwrap();
        assert_eq!(session.connection_state(), ConnectionState::Connecting);
        assert!(matches!(
            session.set_endpoint(Endpoint::default()),
            Err(SessionError::EndpointLocked(ConnectionState::Connecting))
        ));
        session.toggle_connection().unwrap();
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_radius_event_feeds_hit_test_and_scene() {
        let mut session = Session::default();
        session.apply_event(&SyncEvent::RadiusChanged(50.0));
        assert!((session.radius() - 50.0).abs() < f64::EPSILON);
        assert!((session.scene().radius() - 50.0).abs() < f64::EPSILON);

        session.pointer_down(Point::new(145.0, 100.0));
        assert!(session.drag().is_dragging());
    }
}
