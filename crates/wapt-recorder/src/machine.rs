use crate::clock::Clock;
use crate::config::schema::{DeliveryMode, RecorderConfig};
use crate::page::Page;
use crate::serializer::ActionSerializer;
use crate::session::{Session, SessionStatus, task_name_from_path};
use crate::store::SessionStore;
use crate::transport::{Delivery, Transport, deliver_with_retry};
use std::rc::Rc;
use tracing::{error, info, warn};
use url::Url;
use wapt_common::error::RecorderError;
use wapt_common::protocol::{Action, Payload, Record, record_key};

/// Value of the `record` query parameter on the loaded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSignal {
    Start,
    Stop,
    Absent,
}

impl RecordSignal {
    /// Only the exact values `true` and `false` are signals; anything else is
    /// treated as absent.
    pub fn from_url(href: &str, param: &str) -> Result<Self, RecorderError> {
        let url = Url::parse(href).map_err(|e| RecorderError::InvalidUrl(e.to_string()))?;
        let value = url
            .query_pairs()
            .find(|(key, _)| key == param)
            .map(|(_, value)| value.into_owned());
        Ok(match value.as_deref() {
            Some("true") => RecordSignal::Start,
            Some("false") => RecordSignal::Stop,
            _ => RecordSignal::Absent,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Idle,
    Recording,
    /// Stopped and waiting for delivery; persists across loads until a
    /// delivery succeeds.
    Finalizing,
}

/// What a page load did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The store is unusable; recording is disabled for this page.
    Inert,
    Idle,
    Started {
        task_name: String,
        index: Option<u64>,
    },
    Resumed {
        index: Option<u64>,
    },
    /// An undelivered session is waiting for the next stop signal.
    Pending {
        task_name: String,
    },
    Finalized {
        records: usize,
        delivery: Delivery,
    },
}

/// Decides, once per page load, whether to start, continue or finalize a session.
pub struct SessionMachine {
    store: Rc<dyn SessionStore>,
    page: Rc<dyn Page>,
    clock: Rc<dyn Clock>,
    serializer: Rc<ActionSerializer>,
    transport: Rc<dyn Transport>,
    config: RecorderConfig,
}

impl SessionMachine {
    pub fn new(
        store: Rc<dyn SessionStore>,
        page: Rc<dyn Page>,
        clock: Rc<dyn Clock>,
        serializer: Rc<ActionSerializer>,
        transport: Rc<dyn Transport>,
        config: RecorderConfig,
    ) -> Self {
        Self {
            store,
            page,
            clock,
            serializer,
            transport,
            config,
        }
    }

    pub fn state(&self) -> Result<MachineState, RecorderError> {
        Ok(match Session::status(&*self.store)? {
            Some(SessionStatus::Recording) => MachineState::Recording,
            Some(SessionStatus::Finalizing) => MachineState::Finalizing,
            None => MachineState::Idle,
        })
    }

    pub async fn on_page_load(&self) -> Result<Transition, RecorderError> {
        let href = self.page.href();
        let signal = RecordSignal::from_url(&href, &self.config.query_param)?;
        let session = self.load_session()?;

        match (signal, session) {
            (RecordSignal::Stop, session) => self.finalize(session, &href).await,
            (_, Some(session)) if session.status == SessionStatus::Finalizing => {
                warn!(
                    "Task '{}' is awaiting delivery, load with {}=false to retry",
                    session.task_name, self.config.query_param
                );
                Ok(Transition::Pending {
                    task_name: session.task_name,
                })
            }
            (RecordSignal::Start, None) => self.start(&href),
            (_, Some(_)) => {
                let index = self.serializer.record(None, Action::navigate_to(&href))?;
                info!("Resumed recording on {}", href);
                Ok(Transition::Resumed { index })
            }
            (RecordSignal::Absent, None) => Ok(Transition::Idle),
        }
    }

    /// A session whose header is out of sync with its flag is discarded.
    fn load_session(&self) -> Result<Option<Session>, RecorderError> {
        match Session::load(&*self.store) {
            Err(RecorderError::CorruptSession { field }) => {
                warn!("Discarding corrupt session (bad '{}')", field);
                Session::clear(&*self.store)?;
                Ok(None)
            }
            other => other,
        }
    }

    fn start(&self, href: &str) -> Result<Transition, RecorderError> {
        let task_name = task_name_from_path(&self.page.pathname());
        let session = Session::begin(
            task_name.clone(),
            self.clock.now_ms(),
            self.page.viewport(),
        );
        session.save(&*self.store)?;
        info!("Started recording task '{}'", task_name);

        let index = self.serializer.record(None, Action::navigate_to(href))?;
        Ok(Transition::Started { task_name, index })
    }

    async fn finalize(
        &self,
        session: Option<Session>,
        href: &str,
    ) -> Result<Transition, RecorderError> {
        let Some(session) = session.filter(|s| s.record_count > 0) else {
            Session::clear(&*self.store)?;
            info!("Finalize requested with nothing recorded");
            return Ok(Transition::Finalized {
                records: 0,
                delivery: Delivery::Skipped,
            });
        };

        // Events fired while the payload is in flight, or after a failed
        // delivery, are not part of the trace.
        Session::mark_finalizing(&*self.store)?;

        let payload = self.collect_payload(&session)?;
        if payload.is_empty() {
            Session::clear(&*self.store)?;
            warn!("No readable records for '{}', nothing sent", session.task_name);
            return Ok(Transition::Finalized {
                records: 0,
                delivery: Delivery::Skipped,
            });
        }
        let records = payload.len();

        let delivery = match self.config.delivery.mode {
            DeliveryMode::AckThenClear => {
                let status =
                    deliver_with_retry(&*self.transport, href, &payload, &self.config.delivery)
                        .await
                        .map_err(|e| {
                            error!(
                                "Keeping {} records of '{}' after failed delivery: {}",
                                records, session.task_name, e
                            );
                            e
                        })?;
                Delivery::Acknowledged { status }
            }
            DeliveryMode::FireAndForget => {
                self.transport.dispatch(href.to_string(), payload);
                Delivery::Dispatched
            }
        };

        Session::clear(&*self.store)?;
        info!("Finalized task '{}' with {} records", session.task_name, records);
        Ok(Transition::Finalized { records, delivery })
    }

    /// Records `1..` in index order, up to the first one that is missing or
    /// unreadable. Later records are dropped rather than renumbered.
    pub fn collect_payload(&self, session: &Session) -> Result<Payload, RecorderError> {
        let mut records = Vec::new();
        for index in 1..=session.record_count {
            let Some(raw) = self.store.get(&record_key(index))? else {
                warn!(
                    "Record #{} missing, sending {} of {} counted records",
                    index,
                    records.len(),
                    session.record_count
                );
                break;
            };
            match serde_json::from_str::<Record>(&raw) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        "Record #{} unreadable ({}), sending {} of {} counted records",
                        index,
                        e,
                        records.len(),
                        session.record_count
                    );
                    break;
                }
            }
        }

        Ok(Payload {
            task_name: session.task_name.clone(),
            window_width: session.viewport.width,
            window_height: session.viewport.height,
            records,
        })
    }
}
