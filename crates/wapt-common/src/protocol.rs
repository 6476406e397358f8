use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix shared by every key the recorder writes to the session store.
pub const NAMESPACE: &str = "wapt_";

pub const KEY_RECORDING: &str = "wapt_session_recording";
pub const KEY_TASK_NAME: &str = "wapt_session_taskname";
pub const KEY_START_TIME: &str = "wapt_session_start_time";
pub const KEY_RECORD_COUNT: &str = "wapt_session_nrecords";
pub const KEY_WIDTH: &str = "wapt_session_width";
pub const KEY_HEIGHT: &str = "wapt_session_height";
pub const RECORD_KEY_PREFIX: &str = "wapt_record_";

/// Store key of the record with the given 1-based index.
pub fn record_key(index: u64) -> String {
    format!("{}{}", RECORD_KEY_PREFIX, index)
}

/// DOM `Event.eventPhase` at the moment a listener fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EventPhase {
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

impl From<EventPhase> for u8 {
    fn from(phase: EventPhase) -> u8 {
        match phase {
            EventPhase::None => 0,
            EventPhase::Capturing => 1,
            EventPhase::AtTarget => 2,
            EventPhase::Bubbling => 3,
        }
    }
}

impl TryFrom<u8> for EventPhase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventPhase::None),
            1 => Ok(EventPhase::Capturing),
            2 => Ok(EventPhase::AtTarget),
            3 => Ok(EventPhase::Bubbling),
            other => Err(format!("unknown event phase {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStroke {
    pub key_code: u32,
    pub char_code: u32,
    pub human_readable: String,
    #[serde(default)]
    pub key: String,
}

impl KeyStroke {
    /// `human_readable` is the character whose code point is `key_code`.
    pub fn new(key_code: u32, char_code: u32, key: impl Into<String>) -> Self {
        let human_readable = char::from_u32(key_code)
            .map(|c| c.to_string())
            .unwrap_or_default();
        Self {
            key_code,
            char_code,
            human_readable,
            key: key.into(),
        }
    }
}

/// What the user did, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionKind {
    Click(PointerPosition),
    DblClick(PointerPosition),
    MouseDown(PointerPosition),
    MouseUp(PointerPosition),
    KeyPress(KeyStroke),
    KeyDown(KeyStroke),
    KeyUp(KeyStroke),
    Scroll,
    #[serde(rename = "navigateTo")]
    NavigateTo { url: String },
}

impl ActionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionKind::Click(_) => "click",
            ActionKind::DblClick(_) => "dblclick",
            ActionKind::MouseDown(_) => "mousedown",
            ActionKind::MouseUp(_) => "mouseup",
            ActionKind::KeyPress(_) => "keypress",
            ActionKind::KeyDown(_) => "keydown",
            ActionKind::KeyUp(_) => "keyup",
            ActionKind::Scroll => "scroll",
            ActionKind::NavigateTo { .. } => "navigateTo",
        }
    }

    pub fn is_scroll(&self) -> bool {
        matches!(self, ActionKind::Scroll)
    }

    /// Navigation markers are written before the new page exists, so they never
    /// carry a DOM snapshot.
    pub fn carries_snapshot(&self) -> bool {
        !matches!(self, ActionKind::NavigateTo { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<EventPhase>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, timing: None }
    }

    pub fn click(x: i32, y: i32) -> Self {
        Self::new(ActionKind::Click(PointerPosition { x, y }))
    }

    pub fn scroll() -> Self {
        Self::new(ActionKind::Scroll)
    }

    pub fn navigate_to(url: impl Into<String>) -> Self {
        Self::new(ActionKind::NavigateTo { url: url.into() })
    }

    pub fn with_timing(mut self, phase: EventPhase) -> Self {
        self.timing = Some(phase);
        self
    }
}

/// One persisted unit of a recording session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Milliseconds since the session started.
    pub time: i64,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom: Option<String>,
}

/// The document posted when a session is finalized.
///
/// On the wire records are flattened next to the header fields under their
/// 1-based index: `{"task_name": .., "window_width": .., "1": {..}, "2": {..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub task_name: String,
    pub window_width: u32,
    pub window_height: u32,
    pub records: Vec<Record>,
}

impl Payload {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.records.len()))?;
        map.serialize_entry("task_name", &self.task_name)?;
        map.serialize_entry("window_width", &self.window_width)?;
        map.serialize_entry("window_height", &self.window_height)?;
        for (i, record) in self.records.iter().enumerate() {
            map.serialize_entry(&(i + 1).to_string(), record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;

        let task_name = match fields.remove("task_name") {
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "task_name must be a string, got {}",
                    other
                )));
            }
            None => return Err(de::Error::missing_field("task_name")),
        };
        let window_width = dimension(fields.remove("window_width")).map_err(de::Error::custom)?;
        let window_height = dimension(fields.remove("window_height")).map_err(de::Error::custom)?;

        let mut indexed = Vec::new();
        for (key, value) in fields {
            // Older scripts posted records under their store key.
            let index_str = key.strip_prefix(RECORD_KEY_PREFIX).unwrap_or(&key);
            let Ok(index) = index_str.parse::<u64>() else {
                continue;
            };
            let record = decode_record(value)
                .map_err(|e| de::Error::custom(format!("record {}: {}", key, e)))?;
            indexed.push((index, record));
        }
        indexed.sort_by_key(|(index, _)| *index);

        Ok(Payload {
            task_name,
            window_width,
            window_height,
            records: indexed.into_iter().map(|(_, record)| record).collect(),
        })
    }
}

fn dimension(value: Option<Value>) -> Result<u32, String> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| format!("invalid window dimension {}", n)),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| format!("invalid window dimension '{}'", s)),
        Some(other) => Err(format!("invalid window dimension {}", other)),
    }
}

/// Records arrive either as objects or as the raw JSON strings held by the store.
fn decode_record(value: Value) -> Result<Record, serde_json::Error> {
    match value {
        Value::String(raw) => serde_json::from_str(&raw),
        other => serde_json::from_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_stroke_derives_human_readable() {
        assert_eq!(KeyStroke::new(65, 0, "a").human_readable, "A");
        assert_eq!(KeyStroke::new(0xD800, 0, "").human_readable, "");
    }

    #[test]
    fn record_keys_are_namespaced() {
        assert_eq!(record_key(7), "wapt_record_7");
        assert!(record_key(1).starts_with(NAMESPACE));
    }
}
