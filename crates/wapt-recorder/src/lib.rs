pub mod capture;
pub mod clock;
pub mod config;
pub mod machine;
pub mod page;
pub mod recorder;
pub mod serializer;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod transport;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use wapt_common::error;
pub use wapt_common::protocol;

pub use capture::{DomEvent, EventBus, EventCapture, EventKind, LocalEventBus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::schema::{DeliveryConfig, DeliveryMode, RecorderConfig};
pub use machine::{MachineState, RecordSignal, SessionMachine, Transition};
pub use page::{Page, StaticPage, TargetMarker, Viewport};
pub use recorder::{Recorder, RecorderParts};
pub use serializer::ActionSerializer;
pub use session::{Session, SessionStatus};
pub use snapshot::{ScriptMatcher, snapshot};
pub use store::{MemoryStore, SessionStore};
pub use transport::{CollectingTransport, Delivery, HttpTransport, Transport};
