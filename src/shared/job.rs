//! Job Snapshot
//!
//! A cached copy of a job as the server last returned it. Apart from the
//! identifier the store treats every field as opaque JSON; local edits never
//! touch the snapshot directly, they go through the sync queue.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Latest known server snapshot of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Primary key
    pub id: String,
    /// Server-shaped fields (status, assignment, schedule, notes, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Job {
    /// Create a job from an id and a JSON object of fields
    ///
    /// Non-object values yield an empty field map. An `id` key inside
    /// `fields` is dropped in favour of the explicit id.
    pub fn new(id: impl Into<String>, fields: Value) -> Self {
        let mut fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Parse a job from a server row; the row must carry a string or numeric `id`
    pub fn from_value(value: Value) -> Option<Self> {
        let id = match value.get("id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self::new(id, value))
    }

    /// Current status, if present
    pub fn status(&self) -> Option<&str> {
        self.fields.get("status").and_then(Value::as_str)
    }

    /// Free-form notes, if present
    pub fn notes(&self) -> Option<&str> {
        self.fields.get("notes").and_then(Value::as_str)
    }

    /// Assigned technician, if present
    pub fn technician_id(&self) -> Option<&str> {
        self.fields.get("technician_id").and_then(Value::as_str)
    }

    /// Set or replace a field
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

/// Append a note to existing notes with a newline separator
pub fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
        _ => note.to_string(),
    }
}
