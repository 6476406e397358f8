use crate::config::schema::DeliveryConfig;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tracing::{info, warn};
use wapt_common::error::TransportError;
use wapt_common::protocol::Payload;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// How a finalized session left the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing was recorded, so nothing was sent.
    Skipped,
    /// The server answered with a 2xx status.
    Acknowledged { status: u16 },
    /// Sent without waiting for an answer.
    Dispatched,
}

/// Carries the final payload to the server.
///
/// The recorder runs on a single thread, so implementations are not required to
/// be `Send`.
#[async_trait(?Send)]
pub trait Transport {
    /// POST the payload and wait for the answer. Only 2xx statuses are `Ok`.
    async fn send(&self, url: &str, payload: &Payload) -> Result<u16, TransportError>;

    /// POST the payload without observing the outcome.
    fn dispatch(&self, url: String, payload: Payload);
}

/// Send with exponential backoff until acknowledged or out of retries.
pub async fn deliver_with_retry(
    transport: &dyn Transport,
    url: &str,
    payload: &Payload,
    config: &DeliveryConfig,
) -> Result<u16, TransportError> {
    let attempts = config.max_retries + 1;
    let mut delay = Duration::from_millis(config.retry_delay_ms);
    let mut last = String::new();

    for attempt in 1..=attempts {
        match transport.send(url, payload).await {
            Ok(status) => {
                info!(
                    "Delivered {} records to {} (status {})",
                    payload.len(),
                    url,
                    status
                );
                return Ok(status);
            }
            Err(e) => {
                warn!("Delivery attempt {}/{} failed: {}", attempt, attempts, e);
                last = e.to_string();
                if attempt < attempts {
                    sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(TransportError::Exhausted { attempts, last })
}

#[cfg(not(target_arch = "wasm32"))]
async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(target_arch = "wasm32")]
async fn sleep(duration: Duration) {
    crate::wasm::sleep(duration).await;
}

/// JSON-over-HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        #[cfg(target_arch = "wasm32")]
        let client = {
            let _ = timeout;
            reqwest::Client::new()
        };
        Self { client }
    }

    pub async fn post(&self, url: &str, payload: &Payload) -> Result<u16, TransportError> {
        // `json` keeps an explicit content type, so the charset survives.
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, payload: &Payload) -> Result<u16, TransportError> {
        self.post(url, payload).await
    }

    fn dispatch(&self, url: String, payload: Payload) {
        let transport = self.clone();
        let task = async move {
            if let Err(e) = transport.post(&url, &payload).await {
                warn!("Unobserved delivery to {} failed: {}", url, e);
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(task);
                }
                Err(_) => warn!("No async runtime available, payload dropped"),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(task);
        }
    }
}

/// Keeps payloads in memory instead of sending them. Can be told to fail the
/// first few sends.
#[derive(Debug, Default)]
pub struct CollectingTransport {
    sent: RefCell<Vec<(String, Payload)>>,
    attempts: Cell<u32>,
    failures_left: Cell<u32>,
}

impl CollectingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: u32) -> Self {
        let transport = Self::default();
        transport.failures_left.set(times);
        transport
    }

    pub fn sent(&self) -> Vec<(String, Payload)> {
        self.sent.borrow().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.get()
    }
}

#[async_trait(?Send)]
impl Transport for CollectingTransport {
    async fn send(&self, url: &str, payload: &Payload) -> Result<u16, TransportError> {
        self.attempts.set(self.attempts.get() + 1);
        if self.failures_left.get() > 0 {
            self.failures_left.set(self.failures_left.get() - 1);
            return Err(TransportError::Status(503));
        }
        self.sent
            .borrow_mut()
            .push((url.to_string(), payload.clone()));
        Ok(200)
    }

    fn dispatch(&self, url: String, payload: Payload) {
        self.attempts.set(self.attempts.get() + 1);
        self.sent.borrow_mut().push((url, payload));
    }
}
