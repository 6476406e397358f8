#![allow(dead_code)]

use std::rc::Rc;
use wapt_recorder::error::RecorderError;
use wapt_recorder::protocol::{Record, record_key};
use wapt_recorder::{
    CollectingTransport, DomEvent, EventKind, LocalEventBus, ManualClock, MemoryStore, Recorder,
    RecorderConfig, RecorderParts, Session, SessionStore, StaticPage, Transition, Viewport,
};

pub const ORIGIN: &str = "http://app.test";

pub fn markup(title: &str) -> String {
    format!(
        r#"<html><head><title>{}</title></head><body><input id="q" name="q"><button id="go">Go</button><script id="wapt-recorder" src="/wapt.js"></script></body></html>"#,
        title
    )
}

/// One browsing context: a store that outlives page loads, and a fresh page
/// plus event bus per load.
pub struct Harness {
    pub store: Rc<MemoryStore>,
    pub page: Rc<StaticPage>,
    pub clock: Rc<ManualClock>,
    pub transport: Rc<CollectingTransport>,
    pub config: RecorderConfig,
    pub bus: LocalEventBus,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_parts(MemoryStore::new(), CollectingTransport::new())
    }

    pub fn with_parts(store: MemoryStore, transport: CollectingTransport) -> Self {
        let mut config = RecorderConfig::default();
        config.delivery.retry_delay_ms = 1;
        Self {
            store: Rc::new(store),
            page: Rc::new(StaticPage::new(ORIGIN, Viewport::new(1280, 720), "")),
            clock: Rc::new(ManualClock::new(1_000)),
            transport: Rc::new(transport),
            config,
            bus: LocalEventBus::new(),
        }
    }

    pub fn parts(&self) -> RecorderParts {
        RecorderParts {
            store: self.store.clone(),
            page: self.page.clone(),
            clock: self.clock.clone(),
            transport: self.transport.clone(),
            config: self.config.clone(),
        }
    }

    /// Navigate to `path` (relative to the test origin) and run the recorder.
    pub async fn load(&mut self, path: &str) -> Result<Transition, RecorderError> {
        self.page.load(format!("{}{}", ORIGIN, path), markup(path));
        self.bus = LocalEventBus::new();
        Recorder::install(self.parts(), &mut self.bus).await
    }

    pub fn fire(&self, event: DomEvent) -> usize {
        self.bus.dispatch(&event)
    }

    pub fn click(&self, x: i32, y: i32) {
        self.fire(DomEvent::pointer(EventKind::Click, x, y).with_target(self.page.target("go")));
    }

    pub fn key(&self, kind: EventKind, key: char) {
        self.fire(DomEvent::key(kind, key).with_target(self.page.target("q")));
    }

    pub fn scroll(&self) {
        self.fire(DomEvent::new(EventKind::Scroll));
    }

    pub fn record_count(&self) -> u64 {
        Session::load(&*self.store)
            .unwrap()
            .map_or(0, |session| session.record_count)
    }

    pub fn record(&self, index: u64) -> Record {
        let raw = self
            .store
            .get(&record_key(index))
            .unwrap()
            .unwrap_or_else(|| panic!("record {} missing", index));
        serde_json::from_str(&raw).unwrap()
    }
}
