//! Drawing surface geometry.

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Default surface edge length in pixels.
pub const DEFAULT_SURFACE_SIZE: f64 = 400.0;

/// A fixed-size drawing surface placed somewhere in the viewport.
///
/// Pointer input arrives in viewport coordinates; everything the drag
/// controller stores is surface-local, i.e. relative to the surface's
/// top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    /// Viewport position of the surface's top-left corner.
    pub origin: Vec2,
    /// Surface dimensions.
    pub size: Size,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            size: Size::new(DEFAULT_SURFACE_SIZE, DEFAULT_SURFACE_SIZE),
        }
    }
}

impl Surface {
    /// Create a surface at the given viewport offset.
    pub fn new(origin: Vec2, size: Size) -> Self {
        Self { origin, size }
    }

    /// Convert a viewport point to surface-local coordinates.
    pub fn to_local(&self, viewport: Point) -> Point {
        viewport - self.origin
    }

    /// Convert a surface-local point back to viewport coordinates.
    pub fn to_viewport(&self, local: Point) -> Point {
        local + self.origin
    }

    /// Surface bounds in local coordinates.
    pub fn bounds(&self) -> Rect {
        self.size.to_rect()
    }

    /// Whether a local point lies on the surface (edges inclusive).
    pub fn contains(&self, local: Point) -> bool {
        local.x >= 0.0 && local.y >= 0.0 && local.x <= self.size.width && local.y <= self.size.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_surface() {
        let surface = Surface::default();
        assert_eq!(surface.origin, Vec2::ZERO);
        assert_eq!(surface.size, Size::new(400.0, 400.0));
    }

    #[test]
    fn test_to_local_identity() {
        let surface = Surface::default();
        let local = surface.to_local(Point::new(100.0, 200.0));
        assert!((local.x - 100.0).abs() < f64::EPSILON);
        assert!((local.y - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_local_with_origin() {
        let surface = Surface::new(Vec2::new(50.0, 80.0), Size::new(400.0, 400.0));
        let local = surface.to_local(Point::new(150.0, 100.0));
        assert!((local.x - 100.0).abs() < f64::EPSILON);
        assert!((local.y - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let surface = Surface::new(Vec2::new(12.5, -30.0), Size::new(400.0, 300.0));
        let original = Point::new(123.0, 456.0);
        let back = surface.to_viewport(surface.to_local(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_contains() {
        let surface = Surface::default();
        assert!(surface.contains(Point::new(0.0, 0.0)));
        assert!(surface.contains(Point::new(400.0, 400.0)));
        assert!(!surface.contains(Point::new(-1.0, 10.0)));
        assert!(!surface.contains(Point::new(10.0, 401.0)));
    }
}
