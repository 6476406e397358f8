use crate::page::TargetMarker;
use crate::serializer::ActionSerializer;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use tracing::{debug, error, trace, warn};
use wapt_common::error::RecorderError;
use wapt_common::protocol::{Action, ActionKind, EventPhase, KeyStroke, PointerPosition};

/// DOM event types the recorder listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    DblClick,
    MouseDown,
    MouseUp,
    KeyPress,
    KeyDown,
    KeyUp,
    Scroll,
    Load,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::Click,
        EventKind::DblClick,
        EventKind::MouseDown,
        EventKind::MouseUp,
        EventKind::KeyPress,
        EventKind::KeyDown,
        EventKind::KeyUp,
        EventKind::Scroll,
        EventKind::Load,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::DblClick => "dblclick",
            EventKind::MouseDown => "mousedown",
            EventKind::MouseUp => "mouseup",
            EventKind::KeyPress => "keypress",
            EventKind::KeyDown => "keydown",
            EventKind::KeyUp => "keyup",
            EventKind::Scroll => "scroll",
            EventKind::Load => "load",
        }
    }

    /// The fixed listener set, with scroll optional.
    pub fn listeners(capture_scroll: bool) -> Vec<EventKind> {
        Self::ALL
            .into_iter()
            .filter(|kind| capture_scroll || *kind != EventKind::Scroll)
            .collect()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event type '{}'", s))
    }
}

/// Browser-independent view of a DOM event occurrence.
#[derive(Clone)]
pub struct DomEvent {
    pub kind: EventKind,
    pub phase: EventPhase,
    pub page_x: i32,
    pub page_y: i32,
    pub key_code: u32,
    pub char_code: u32,
    pub key: String,
    pub target: Option<Rc<dyn TargetMarker>>,
}

impl DomEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            phase: EventPhase::Capturing,
            page_x: 0,
            page_y: 0,
            key_code: 0,
            char_code: 0,
            key: String::new(),
            target: None,
        }
    }

    pub fn pointer(kind: EventKind, x: i32, y: i32) -> Self {
        Self {
            page_x: x,
            page_y: y,
            ..Self::new(kind)
        }
    }

    /// Keyboard event for a single character, with legacy `keyCode`/`charCode`
    /// values the way browsers report them: key events carry the upper-case
    /// code, `keypress` carries the character itself in both fields.
    pub fn key(kind: EventKind, key: char) -> Self {
        let (key_code, char_code) = if kind == EventKind::KeyPress {
            (key as u32, key as u32)
        } else {
            (key.to_ascii_uppercase() as u32, 0)
        };
        Self {
            key_code,
            char_code,
            key: key.to_string(),
            ..Self::new(kind)
        }
    }

    pub fn with_phase(mut self, phase: EventPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_target(mut self, target: Rc<dyn TargetMarker>) -> Self {
        self.target = Some(target);
        self
    }

    /// The action this event describes, if its type produces one.
    pub fn to_action(&self) -> Option<Action> {
        let position = PointerPosition {
            x: self.page_x,
            y: self.page_y,
        };
        let stroke = || KeyStroke::new(self.key_code, self.char_code, self.key.clone());
        let kind = match self.kind {
            EventKind::Click => ActionKind::Click(position),
            EventKind::DblClick => ActionKind::DblClick(position),
            EventKind::MouseDown => ActionKind::MouseDown(position),
            EventKind::MouseUp => ActionKind::MouseUp(position),
            EventKind::KeyPress => ActionKind::KeyPress(stroke()),
            EventKind::KeyDown => ActionKind::KeyDown(stroke()),
            EventKind::KeyUp => ActionKind::KeyUp(stroke()),
            EventKind::Scroll => ActionKind::Scroll,
            // Page loads are recorded as navigateTo by the session machine.
            EventKind::Load => return None,
        };
        Some(Action::new(kind))
    }
}

impl fmt::Debug for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomEvent")
            .field("kind", &self.kind)
            .field("phase", &self.phase)
            .field("page_x", &self.page_x)
            .field("page_y", &self.page_y)
            .field("key_code", &self.key_code)
            .field("char_code", &self.char_code)
            .field("key", &self.key)
            .field("has_target", &self.target.is_some())
            .finish()
    }
}

pub type Handler = Box<dyn Fn(&DomEvent)>;

/// Where event handlers are registered: the live document in a browser, a
/// [`LocalEventBus`] everywhere else.
pub trait EventBus {
    fn on_event(&mut self, kind: EventKind, handler: Handler);
}

/// Synchronous in-process dispatcher for synthetic events.
#[derive(Default)]
pub struct LocalEventBus {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every handler bound to the event's type; returns how many ran.
    pub fn dispatch(&self, event: &DomEvent) -> usize {
        let Some(handlers) = self.handlers.get(&event.kind) else {
            return 0;
        };
        for handler in handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}

impl EventBus for LocalEventBus {
    fn on_event(&mut self, kind: EventKind, handler: Handler) {
        self.handlers.entry(kind).or_default().push(handler);
    }
}

/// Binds one handler per listened event type and routes occurrences to the
/// serializer. Whether anything is persisted is decided by the serializer.
pub struct EventCapture;

impl EventCapture {
    pub fn register(
        bus: &mut dyn EventBus,
        serializer: Rc<ActionSerializer>,
        listeners: &[EventKind],
    ) {
        for &kind in listeners {
            let serializer = Rc::clone(&serializer);
            bus.on_event(
                kind,
                Box::new(move |event: &DomEvent| handle(&serializer, event)),
            );
        }
        debug!("Registered {} capturing listeners", listeners.len());
    }
}

fn handle(serializer: &ActionSerializer, event: &DomEvent) {
    let Some(action) = event.to_action() else {
        trace!("Ignoring {} event", event.kind);
        return;
    };

    match serializer.record(Some(event), action) {
        Ok(_) => {}
        Err(e @ RecorderError::Snapshot(_)) => {
            error!("Dropping {} record: {}", event.kind, e);
        }
        Err(e) => warn!("Failed to record {} event: {}", event.kind, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_listener_is_optional() {
        assert_eq!(EventKind::listeners(true).len(), 9);
        let without = EventKind::listeners(false);
        assert_eq!(without.len(), 8);
        assert!(!without.contains(&EventKind::Scroll));
        assert!(without.contains(&EventKind::Load));
    }

    #[test]
    fn event_kind_parses_dom_names() {
        assert_eq!("dblclick".parse::<EventKind>(), Ok(EventKind::DblClick));
        assert!("wheel".parse::<EventKind>().is_err());
    }

    #[test]
    fn keydown_uses_upper_case_key_code() {
        let event = DomEvent::key(EventKind::KeyDown, 'a');
        let action = event.to_action().unwrap();
        match action.kind {
            ActionKind::KeyDown(stroke) => {
                assert_eq!(stroke.key_code, 65);
                assert_eq!(stroke.char_code, 0);
                assert_eq!(stroke.human_readable, "A");
                assert_eq!(stroke.key, "a");
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn load_produces_no_action() {
        assert!(DomEvent::new(EventKind::Load).to_action().is_none());
    }

    #[test]
    fn local_bus_dispatches_by_kind() {
        use std::cell::Cell;

        let hits = Rc::new(Cell::new(0));
        let mut bus = LocalEventBus::new();
        let counter = Rc::clone(&hits);
        bus.on_event(
            EventKind::Click,
            Box::new(move |_: &DomEvent| counter.set(counter.get() + 1)),
        );

        assert_eq!(bus.dispatch(&DomEvent::pointer(EventKind::Click, 1, 1)), 1);
        assert_eq!(bus.dispatch(&DomEvent::new(EventKind::KeyUp)), 0);
        assert_eq!(hits.get(), 1);
        assert_eq!(bus.listener_count(EventKind::Click), 1);
    }
}
