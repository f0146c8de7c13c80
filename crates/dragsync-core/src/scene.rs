//! Visual representation of the draggable point.
//!
//! Hosts rebuild the scene after every state change and draw it however
//! they like; nothing here talks to a GPU or a DOM.

use kurbo::{Circle, Point, Rect};
use peniko::Color;

/// Colors and sizes used to draw the point.
#[derive(Debug, Clone, Copy)]
pub struct SceneStyle {
    /// Outline color of the radius ring.
    pub ring_color: Color,
    /// Stroke width of the radius ring.
    pub ring_width: f64,
    /// Fill color of the center dot.
    pub dot_color: Color,
    /// Radius of the center dot.
    pub dot_radius: f64,
    /// Surface background.
    pub background_color: Color,
}

impl Default for SceneStyle {
    fn default() -> Self {
        // Tailwind purple-500 on gray-900.
        let purple = Color::from_rgba8(0xa8, 0x55, 0xf7, 255);
        Self {
            ring_color: purple,
            ring_width: 2.0,
            dot_color: purple,
            dot_radius: 5.0,
            background_color: Color::from_rgba8(0x11, 0x18, 0x27, 255),
        }
    }
}

/// Everything needed to draw one frame of the surface.
#[derive(Debug, Clone)]
pub struct Scene {
    pub bounds: Rect,
    pub ring: Circle,
    pub dot: Circle,
    pub style: SceneStyle,
}

impl Scene {
    /// Recompute the scene from the current point and radius.
    pub fn build(bounds: Rect, point: Point, radius: f64, style: SceneStyle) -> Self {
        Self {
            bounds,
            // A negative radius from the peer draws nothing rather than a
            // malformed circle.
            ring: Circle::new(point, radius.max(0.0)),
            dot: Circle::new(point, style.dot_radius),
            style,
        }
    }

    pub fn center(&self) -> Point {
        self.ring.center
    }

    pub fn radius(&self) -> f64 {
        self.ring.radius
    }
}
