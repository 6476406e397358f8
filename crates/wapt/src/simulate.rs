use std::rc::Rc;
use tracing::{debug, info};
use wapt_common::protocol::Payload;
use wapt_recorder::{
    Clock, CollectingTransport, DomEvent, EventKind, LocalEventBus, ManualClock, MemoryStore,
    Recorder, RecorderConfig, RecorderParts, StaticPage, SystemClock, Transition, Viewport,
};

const SIMULATED_VIEWPORT: Viewport = Viewport {
    width: 1280,
    height: 720,
};

/// One line of a simulation script.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Load(String),
    Pointer(EventKind, i32, i32),
    Key(EventKind, char),
    Scroll,
    Wait(u64),
}

pub fn parse_step(line: &str) -> Result<Step, String> {
    let mut parts = line.split_whitespace();
    let command = parts.next().ok_or("empty line")?;
    let args: Vec<&str> = parts.collect();

    let step = match command {
        "load" => match args.as_slice() {
            [url] => Step::Load(url.to_string()),
            _ => return Err("usage: load <url>".into()),
        },
        "click" | "dblclick" | "mousedown" | "mouseup" => {
            let kind = command.parse::<EventKind>()?;
            match args.as_slice() {
                [x, y] => Step::Pointer(kind, parse_number(x)?, parse_number(y)?),
                _ => return Err(format!("usage: {} <x> <y>", command)),
            }
        }
        "key" | "keypress" | "keyup" => {
            let kind = match command {
                "keypress" => EventKind::KeyPress,
                "keyup" => EventKind::KeyUp,
                _ => EventKind::KeyDown,
            };
            match args.as_slice() {
                [key] if key.chars().count() == 1 => {
                    Step::Key(kind, key.chars().next().ok_or("missing key")?)
                }
                _ => return Err(format!("usage: {} <char>", command)),
            }
        }
        "scroll" => Step::Scroll,
        "wait" => match args.as_slice() {
            [ms] => Step::Wait(parse_number(ms)?),
            _ => return Err("usage: wait <ms>".into()),
        },
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(step)
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))
}

/// Markup for a simulated page: just enough for the recorder's own script tag
/// to be found and stripped from snapshots.
fn page_markup(url: &str, config: &RecorderConfig) -> String {
    let src = config.script_src.as_deref().unwrap_or("/wapt.js");
    format!(
        r#"<html><head><title>{}</title></head><body><script id="{}" src="{}"></script></body></html>"#,
        url, config.script_id, src
    )
}

/// Runs scripts against an in-memory browsing context that survives page loads.
pub struct Simulator {
    store: Rc<MemoryStore>,
    page: Rc<StaticPage>,
    clock: Rc<ManualClock>,
    transport: Rc<CollectingTransport>,
    config: RecorderConfig,
    bus: LocalEventBus,
}

impl Simulator {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            store: Rc::new(MemoryStore::new()),
            page: Rc::new(StaticPage::new("about:blank", SIMULATED_VIEWPORT, "")),
            clock: Rc::new(ManualClock::new(SystemClock.now_ms())),
            transport: Rc::new(CollectingTransport::new()),
            config,
            bus: LocalEventBus::new(),
        }
    }

    /// Execute every non-comment line and return the payloads that were
    /// finalized along the way.
    pub async fn run_script(&mut self, script: &str) -> Result<Vec<Payload>, String> {
        for (number, line) in script.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let step = parse_step(trimmed).map_err(|e| format!("line {}: {}", number + 1, e))?;
            self.step(step)
                .await
                .map_err(|e| format!("line {} '{}': {}", number + 1, trimmed, e))?;
        }

        Ok(self
            .transport
            .sent()
            .into_iter()
            .map(|(_, payload)| payload)
            .collect())
    }

    pub async fn step(&mut self, step: Step) -> Result<(), String> {
        debug!("Simulating {:?}", step);
        match step {
            Step::Load(url) => {
                let markup = page_markup(&url, &self.config);
                self.page.load(url.as_str(), markup);
                self.bus = LocalEventBus::new();
                let transition = Recorder::install(self.parts(), &mut self.bus)
                    .await
                    .map_err(|e| e.to_string())?;
                info!("Loaded {}: {:?}", url, transition);
                if let Transition::Finalized { records, .. } = transition {
                    info!("Session finalized with {} records", records);
                }
            }
            Step::Pointer(kind, x, y) => self.fire(DomEvent::pointer(kind, x, y)),
            Step::Key(kind, key) => self.fire(DomEvent::key(kind, key)),
            Step::Scroll => self.fire(DomEvent::new(EventKind::Scroll)),
            Step::Wait(ms) => self.clock.advance(ms),
        }
        Ok(())
    }

    fn fire(&self, event: DomEvent) {
        if self.bus.dispatch(&event) == 0 {
            debug!("No listener for {}, was a page loaded?", event.kind);
        }
    }

    fn parts(&self) -> RecorderParts {
        RecorderParts {
            store: self.store.clone(),
            page: self.page.clone(),
            clock: self.clock.clone(),
            transport: self.transport.clone(),
            config: self.config.clone(),
        }
    }
}
