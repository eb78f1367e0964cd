use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp { seconds: 0, nanos: 0 };

    pub fn now() -> Self {
        OffsetDateTime::now_utc().into()
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(at: OffsetDateTime) -> Self {
        Self {
            seconds: at.unix_timestamp(),
            nanos: at.nanosecond(),
        }
    }
}

/// A single field of a schemaless document.
///
/// Stored as plain JSON (`null`, `true`, `3`, `1.5`, `"text"`,
/// `{"seconds":..,"nanos":..}`). `ServerTimestamp` only exists on the write
/// path: the store swaps it for its own clock when the write commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(Timestamp),
    #[serde(skip)]
    ServerTimestamp,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Double(_) => "double",
            FieldValue::String(_) => "string",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::ServerTimestamp => "server timestamp",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(ts: Timestamp) -> Self {
        FieldValue::Timestamp(ts)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// Builds a [`Fields`] map: `fields! { "uid" => uid, "status" => "Pending" }`.
#[macro_export]
macro_rules! fields {
    ($($k:expr => $v:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut fields = $crate::store::Fields::new();
        $(fields.insert(($k).to_string(), $crate::store::FieldValue::from($v));)*
        fields
    }};
}

pub(crate) fn resolve_server_timestamps(fields: &mut Fields, now: Timestamp) {
    for value in fields.values_mut() {
        if matches!(value, FieldValue::ServerTimestamp) {
            *value = FieldValue::Timestamp(now);
        }
    }
}

/// A stored document as handed to renderers: `{id, ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    /// The `timestamp` field, or the epoch when it is missing or not a timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.get("timestamp")
            .and_then(FieldValue::as_timestamp)
            .unwrap_or(Timestamp::EPOCH)
    }
}

/// Orders documents newest first.
///
/// Filtered queries never ask the database for an ordering, so they keep
/// working without a compound index; every caller sorts here instead. The
/// sort is stable, so equal (or missing) timestamps keep their fetched order.
pub fn sort_newest_first(docs: &mut [Document]) {
    docs.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
}
