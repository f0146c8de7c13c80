//! Wire protocol spoken with the remote peer.
//!
//! Both directions carry JSON text frames:
//!
//! ```json
//! { "x": 200, "y": 150 }   // client -> peer, on every drag move
//! { "radius": 50 }         // peer -> client
//! ```

use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outbound position of the dragged point, in surface-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionMessage {
    pub x: f64,
    pub y: f64,
}

impl From<Point> for PositionMessage {
    fn from(point: Point) -> Self {
        Self { x: point.x, y: point.y }
    }
}

impl From<PositionMessage> for Point {
    fn from(msg: PositionMessage) -> Self {
        Point::new(msg.x, msg.y)
    }
}

impl PositionMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound radius update. Unknown fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusMessage {
    pub radius: f64,
}

/// Problems with an inbound payload. Never fatal to the connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Message has no numeric radius field")]
    MissingRadius,
}

/// Extract the radius from an inbound text frame.
pub fn parse_inbound(text: &str) -> Result<f64, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    value
        .get("radius")
        .and_then(serde_json::Value::as_f64)
        .ok_or(ProtocolError::MissingRadius)
}
