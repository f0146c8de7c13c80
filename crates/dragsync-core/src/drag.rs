//! Drag controller for the single draggable point.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

use crate::surface::Surface;

/// Radius used for hit-testing until a peer says otherwise.
pub const DEFAULT_RADIUS: f64 = 30.0;

/// Initial point position in surface-local coordinates.
pub const DEFAULT_POINT: Point = Point::new(100.0, 100.0);

/// Whether the point is currently being dragged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

/// Cursor feedback for the host to display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorHint {
    #[default]
    Default,
    /// Hovering inside the circle while idle.
    Pointer,
    /// Dragging.
    Grabbing,
}

/// Result of a pointer move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    /// The point moved; carries the new surface-local position.
    Dragged(Point),
    /// Not dragging; reports whether the pointer is over the circle.
    Hover { inside: bool },
}

impl MoveOutcome {
    /// The position-change, if the move produced one.
    pub fn position(self) -> Option<Point> {
        match self {
            MoveOutcome::Dragged(point) => Some(point),
            MoveOutcome::Hover { .. } => None,
        }
    }
}

/// Owns the point position, the drag state and the hit-test radius.
#[derive(Debug, Clone)]
pub struct DragController {
    surface: Surface,
    point: Point,
    radius: f64,
    state: DragState,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new(Surface::default(), DEFAULT_POINT, DEFAULT_RADIUS)
    }
}

impl DragController {
    pub fn new(surface: Surface, point: Point, radius: f64) -> Self {
        Self {
            surface,
            point,
            radius,
            state: DragState::Idle,
        }
    }

    pub fn point(&self) -> Point {
        self.point
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state == DragState::Dragging
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Update the hit-test radius (fed back from the displayed radius).
    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    /// Move the surface within the viewport. Stored coordinates are
    /// surface-local and stay untouched.
    pub fn set_surface_origin(&mut self, origin: Vec2) {
        self.surface.origin = origin;
    }

    /// Check whether a surface-local point falls within the circle.
    /// The boundary counts as inside.
    pub fn hit_test(&self, local: Point) -> bool {
        local.distance(self.point) <= self.radius
    }

    /// Start a drag if the pointer lands on the circle.
    pub fn on_pointer_down(&mut self, viewport: Point) {
        let local = self.surface.to_local(viewport);
        if self.hit_test(local) {
            log::debug!("Drag started at ({}, {})", local.x, local.y);
            self.state = DragState::Dragging;
        }
    }

    /// Follow the pointer while dragging.
    ///
    /// Every call while dragging yields exactly one position-change; nothing
    /// is coalesced.
    pub fn on_pointer_move(&mut self, viewport: Point) -> MoveOutcome {
        let local = self.surface.to_local(viewport);
        match self.state {
            DragState::Dragging => {
                if !self.surface.contains(local) {
                    log::trace!("Dragging outside surface: ({}, {})", local.x, local.y);
                }
                self.point = local;
                MoveOutcome::Dragged(local)
            }
            DragState::Idle => MoveOutcome::Hover {
                inside: self.hit_test(local),
            },
        }
    }

    pub fn on_pointer_up(&mut self) {
        if self.state == DragState::Dragging {
            log::debug!("Drag ended at ({}, {})", self.point.x, self.point.y);
        }
        self.state = DragState::Idle;
    }

    /// Leaving the surface ends a drag the same way releasing does.
    pub fn on_pointer_leave(&mut self) {
        self.on_pointer_up();
    }

    /// Cursor feedback for a pointer at the given viewport position.
    pub fn cursor_hint(&self, viewport: Point) -> CursorHint {
        if self.is_dragging() {
            CursorHint::Grabbing
        } else if self.hit_test(self.surface.to_local(viewport)) {
            CursorHint::Pointer
        } else {
            CursorHint::Default
        }
    }
}
