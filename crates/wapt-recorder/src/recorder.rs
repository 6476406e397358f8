use crate::capture::{EventBus, EventCapture, EventKind};
use crate::clock::Clock;
use crate::config::schema::RecorderConfig;
use crate::machine::{SessionMachine, Transition};
use crate::page::Page;
use crate::serializer::ActionSerializer;
use crate::store::SessionStore;
use crate::transport::Transport;
use std::rc::Rc;
use tracing::info;
use wapt_common::error::RecorderError;

/// Collaborators the recorder needs on every page load.
#[derive(Clone)]
pub struct RecorderParts {
    pub store: Rc<dyn SessionStore>,
    pub page: Rc<dyn Page>,
    pub clock: Rc<dyn Clock>,
    pub transport: Rc<dyn Transport>,
    pub config: RecorderConfig,
}

/// Per-page-load wiring of capture, serializer and session machine.
pub struct Recorder {
    serializer: Rc<ActionSerializer>,
    machine: SessionMachine,
    listeners: Vec<EventKind>,
}

impl Recorder {
    pub fn new(parts: RecorderParts) -> Result<Self, RecorderError> {
        let matcher = parts.config.script_matcher()?;
        let listeners = parts.config.listeners();
        let serializer = Rc::new(ActionSerializer::new(
            Rc::clone(&parts.store),
            Rc::clone(&parts.page),
            Rc::clone(&parts.clock),
            matcher,
        ));
        let machine = SessionMachine::new(
            parts.store,
            parts.page,
            parts.clock,
            Rc::clone(&serializer),
            parts.transport,
            parts.config,
        );
        Ok(Self {
            serializer,
            machine,
            listeners,
        })
    }

    /// Everything a freshly loaded page does: probe the store, bind listeners,
    /// then evaluate the session machine once.
    pub async fn install(
        parts: RecorderParts,
        bus: &mut dyn EventBus,
    ) -> Result<Transition, RecorderError> {
        if !parts.store.probe() {
            info!("Session store unavailable, recording disabled");
            return Ok(Transition::Inert);
        }

        let recorder = Self::new(parts)?;
        recorder.attach(bus);
        recorder.machine.on_page_load().await
    }

    pub fn attach(&self, bus: &mut dyn EventBus) {
        EventCapture::register(bus, Rc::clone(&self.serializer), &self.listeners);
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn serializer(&self) -> &Rc<ActionSerializer> {
        &self.serializer
    }
}
