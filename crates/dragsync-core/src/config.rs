//! Session configuration.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::drag::{DEFAULT_POINT, DEFAULT_RADIUS};
use crate::surface::Surface;
use crate::sync::Endpoint;

/// Initial values for a [`Session`](crate::Session).
///
/// Every field has a default, so a host can deserialize a partial JSON
/// object and get the rest filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Peer to connect to.
    pub endpoint: Endpoint,
    /// Surface placement and size.
    pub surface: Surface,
    /// Initial point position, surface-local.
    pub point: Point,
    /// Radius used until the peer sends one.
    pub radius: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            surface: Surface::default(),
            point: DEFAULT_POINT,
            radius: DEFAULT_RADIUS,
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from JSON, filling in defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
