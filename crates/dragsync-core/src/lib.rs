//! DragSync Core Library
//!
//! Platform-agnostic drag handling and WebSocket synchronization for a
//! single draggable point whose radius is driven by a remote peer.

pub mod config;
pub mod drag;
pub mod protocol;
pub mod scene;
pub mod session;
pub mod surface;
pub mod sync;

pub use config::SessionConfig;
pub use drag::{CursorHint, DragController, DragState, MoveOutcome};
pub use protocol::{PositionMessage, ProtocolError, RadiusMessage, parse_inbound};
pub use scene::{Scene, SceneStyle};
pub use session::{Session, SessionError};
pub use surface::Surface;
pub use sync::{ConnectionState, Endpoint, PlatformSyncChannel, SyncError, SyncEvent};
