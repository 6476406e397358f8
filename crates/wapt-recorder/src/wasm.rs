use crate::capture::{DomEvent, EventBus, EventKind, Handler};
use crate::clock::Clock;
use crate::config::schema::RecorderConfig;
use crate::machine::Transition;
use crate::page::{Page, TARGET_MARKER_ATTR, TargetMarker, Viewport};
use crate::recorder::{Recorder, RecorderParts};
use crate::store::SessionStore;
use crate::transport::HttpTransport;
use std::rc::Rc;
use std::time::Duration;
use wapt_common::error::{RecorderError, StoreError};
use wapt_common::protocol::{EventPhase, NAMESPACE};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, Event, KeyboardEvent, MouseEvent, Storage, Window};

/// Page entry point: runs once per document the script is injected into.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_bindgen_futures::spawn_local(async {
        if let Err(e) = run().await {
            web_sys::console::error_1(&JsValue::from_str(&format!("wapt recorder: {}", e)));
        }
    });
}

#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

async fn run() -> Result<Transition, RecorderError> {
    let Some(window) = web_sys::window() else {
        return Ok(Transition::Inert);
    };
    let Some(store) = LocalStorageStore::open(&window) else {
        return Ok(Transition::Inert);
    };
    let Some(document) = window.document() else {
        return Ok(Transition::Inert);
    };

    let config = RecorderConfig::default();
    let transport = HttpTransport::new(config.delivery.timeout());
    let parts = RecorderParts {
        store: Rc::new(store),
        page: Rc::new(BrowserPage {
            window,
            document: document.clone(),
        }),
        clock: Rc::new(JsClock),
        transport: Rc::new(transport),
        config,
    };

    let mut bus = DocumentEventBus { document };
    Recorder::install(parts, &mut bus).await
}

/// `window.localStorage`, restricted to the recorder's key namespace on clear.
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    /// `None` when storage is disabled or access throws.
    pub fn open(window: &Window) -> Option<Self> {
        window
            .local_storage()
            .ok()
            .flatten()
            .map(|storage| Self { storage })
    }
}

fn js_error(e: JsValue) -> StoreError {
    StoreError::Other(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

impl SessionStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage.get_item(key).map_err(js_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| StoreError::WriteRejected {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.storage.remove_item(key).map_err(js_error)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let len = self.storage.length().map_err(js_error)?;
        let mut owned = Vec::new();
        for i in 0..len {
            if let Some(key) = self.storage.key(i).map_err(js_error)?
                && key.starts_with(NAMESPACE)
            {
                owned.push(key);
            }
        }
        for key in owned {
            self.remove(&key)?;
        }
        Ok(())
    }
}

struct BrowserPage {
    window: Window,
    document: Document,
}

impl Page for BrowserPage {
    fn href(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn pathname(&self) -> String {
        self.window.location().pathname().unwrap_or_default()
    }

    fn viewport(&self) -> Viewport {
        let dimension = |value: Result<JsValue, JsValue>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or_default() as u32
        };
        Viewport::new(
            dimension(self.window.inner_width()),
            dimension(self.window.inner_height()),
        )
    }

    fn outer_html(&self) -> String {
        self.document
            .document_element()
            .map(|root| root.outer_html())
            .unwrap_or_default()
    }
}

struct ElementMarker(Element);

impl TargetMarker for ElementMarker {
    fn set_marked(&self, marked: bool) {
        let result = if marked {
            self.0.set_attribute(TARGET_MARKER_ATTR, "true")
        } else {
            self.0.remove_attribute(TARGET_MARKER_ATTR)
        };
        if result.is_err() {
            tracing::debug!("Could not toggle target marker");
        }
    }
}

/// Registers capturing-phase listeners on the document.
struct DocumentEventBus {
    document: Document,
}

impl EventBus for DocumentEventBus {
    fn on_event(&mut self, kind: EventKind, handler: Handler) {
        let closure = Closure::<dyn Fn(Event)>::new(move |event: Event| {
            handler(&to_dom_event(kind, &event));
        });
        if let Err(e) = self.document.add_event_listener_with_callback_and_bool(
            kind.as_str(),
            closure.as_ref().unchecked_ref(),
            true,
        ) {
            web_sys::console::warn_1(&e);
        }
        // Listeners live as long as the page.
        closure.forget();
    }
}

fn to_dom_event(kind: EventKind, event: &Event) -> DomEvent {
    let phase = u8::try_from(event.event_phase())
        .ok()
        .and_then(|p| EventPhase::try_from(p).ok())
        .unwrap_or(EventPhase::None);
    let mut dom = DomEvent::new(kind).with_phase(phase);

    if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
        dom.page_x = mouse.page_x();
        dom.page_y = mouse.page_y();
    }
    if let Some(key) = event.dyn_ref::<KeyboardEvent>() {
        dom.key_code = key.key_code();
        dom.char_code = key.char_code();
        dom.key = key.key();
    }
    if let Some(element) = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
    {
        dom.target = Some(Rc::new(ElementMarker(element)));
    }
    dom
}

struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

pub(crate) async fn sleep(duration: Duration) {
    let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().map(|window| {
            window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
        });
        if !matches!(scheduled, Some(Ok(_))) {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}
