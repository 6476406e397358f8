pub mod error;
pub mod protocol;

pub use error::{RecorderError, SnapshotError, StoreError, TransportError};
pub use protocol::{Action, ActionKind, EventPhase, KeyStroke, Payload, PointerPosition, Record};
