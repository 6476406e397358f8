use crate::capture::DomEvent;
use crate::clock::Clock;
use crate::page::Page;
use crate::session::{Session, SessionStatus};
use crate::snapshot::{ScriptMatcher, snapshot};
use crate::store::SessionStore;
use std::rc::Rc;
use tracing::{debug, warn};
use wapt_common::error::{RecorderError, SnapshotError};
use wapt_common::protocol::{Action, Record, record_key};

/// Turns actions into persisted records.
pub struct ActionSerializer {
    store: Rc<dyn SessionStore>,
    page: Rc<dyn Page>,
    clock: Rc<dyn Clock>,
    matcher: ScriptMatcher,
}

impl ActionSerializer {
    pub fn new(
        store: Rc<dyn SessionStore>,
        page: Rc<dyn Page>,
        clock: Rc<dyn Clock>,
        matcher: ScriptMatcher,
    ) -> Self {
        Self {
            store,
            page,
            clock,
            matcher,
        }
    }

    /// Persist `action` as the next record of the active session.
    ///
    /// Returns the index written, or `None` when nothing was persisted: no
    /// session is recording (none exists, or it is being finalized), or the
    /// action is a scroll directly following another scroll record.
    pub fn record(
        &self,
        event: Option<&DomEvent>,
        mut action: Action,
    ) -> Result<Option<u64>, RecorderError> {
        let Some(session) = Session::load(&*self.store)? else {
            return Ok(None);
        };
        if session.status != SessionStatus::Recording {
            debug!("Session is finalizing, ignoring {}", action.kind.type_name());
            return Ok(None);
        }
        let index = session
            .record_count
            .checked_add(1)
            .ok_or_else(|| RecorderError::corrupt("nrecords"))?;

        if action.kind.is_scroll() && self.last_record_is_scroll(session.record_count)? {
            debug!("Suppressing repeated scroll");
            return Ok(None);
        }

        if let Some(event) = event {
            action.timing = Some(event.phase);
        }

        let time = self.clock.now_ms() as i64 - session.start_time as i64;
        let dom = if action.kind.carries_snapshot() {
            Some(self.capture_dom(event)?)
        } else {
            None
        };

        let type_name = action.kind.type_name();
        let record = Record { time, action, dom };

        // Record before counter: a failure in between leaves an orphan that the
        // next write overwrites, never a gap.
        self.store
            .set(&record_key(index), &serde_json::to_string(&record)?)?;
        Session::set_record_count(&*self.store, index)?;

        debug!("Recorded #{} {} at +{}ms", index, type_name, time);
        Ok(Some(index))
    }

    fn capture_dom(&self, event: Option<&DomEvent>) -> Result<String, SnapshotError> {
        let target = event.and_then(|e| e.target.as_ref());
        if let Some(target) = target {
            target.set_marked(true);
        }
        let markup = self.page.outer_html();
        if let Some(target) = target {
            target.set_marked(false);
        }
        snapshot(&markup, &self.matcher)
    }

    fn last_record_is_scroll(&self, record_count: u64) -> Result<bool, RecorderError> {
        if record_count == 0 {
            return Ok(false);
        }
        let Some(raw) = self.store.get(&record_key(record_count))? else {
            return Ok(false);
        };
        match serde_json::from_str::<Record>(&raw) {
            Ok(last) => Ok(last.action.kind.is_scroll()),
            Err(e) => {
                warn!("Last record #{} is unreadable: {}", record_count, e);
                Ok(false)
            }
        }
    }
}
