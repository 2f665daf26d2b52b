//! Wire protocol for the collaboration WebSocket endpoint, spec
//! §4.10/§6: one JSON object per frame, action-coded by the `a` field.
//!
//! [`ClientMessage`] is what a connected editor sends; [`ServerMessage`]
//! is what this server sends back or fans out. [`Envelope`] is the
//! payload this server itself publishes on the Redis broker — distinct
//! from both, since it carries the originating connection's `source` id
//! so fanout can skip echoing an op back to the connection that
//! submitted it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gridbase_domain::error::Error;
use gridbase_domain::events::RecordEvent;
use gridbase_domain::value_objects::{CellValue, FieldId};

/// One JSON0-style op component: `p` is a path into the document, the
/// rest are mutually exclusive mutation kinds. Only `oi`/`od` (object
/// insert/delete) are produced by this server today; `li`/`ld` round-trip
/// for clients that send list ops against array-valued cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub p: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub oi: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub od: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub li: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ld: Option<serde_json::Value>,
}

impl Operation {
    /// An op writing `value` at `data.<field_id>`, the shape this server
    /// emits for every changed field on create/update.
    #[must_use]
    pub fn field_write(field_id: FieldId, value: &CellValue) -> Self {
        Self {
            p: vec!["data".into(), field_id.to_string().into()],
            oi: serde_json::to_value(value).ok(),
            od: None,
            li: None,
            ld: None,
        }
    }

    /// The field this op targets, if it is shaped like `data.<field_id>`.
    #[must_use]
    pub fn field_id(&self) -> Option<FieldId> {
        if self.p.first().and_then(|v| v.as_str()) != Some("data") {
            return None;
        }
        self.p
            .get(1)
            .and_then(|v| v.as_str())
            .and_then(|s| FieldId::parse(s).ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "a")]
pub enum ClientMessage {
    #[serde(rename = "hs")]
    Handshake,
    #[serde(rename = "s")]
    Subscribe { c: String, d: String },
    #[serde(rename = "u")]
    Unsubscribe { c: String, d: String },
    #[serde(rename = "p")]
    Ping,
    #[serde(rename = "op")]
    Op {
        c: String,
        d: String,
        v: i64,
        op: Vec<Operation>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "a")]
pub enum ServerMessage {
    #[serde(rename = "hs")]
    Handshake,
    #[serde(rename = "s")]
    Subscribed {
        c: String,
        d: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<serde_json::Value>,
    },
    #[serde(rename = "u")]
    Unsubscribed { c: String, d: String },
    #[serde(rename = "op")]
    Op {
        c: String,
        d: String,
        v: i64,
        op: Vec<Operation>,
    },
    #[serde(rename = "err")]
    Err { code: u32, message: String },
}

impl ServerMessage {
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        Self::Err {
            code: error_code(err),
            message: err.to_string(),
        }
    }
}

/// Maps the domain error taxonomy onto the small, stable numeric space
/// the wire protocol exposes to clients (spec §6 leaves the exact
/// numbers unspecified; HTTP status codes are the obvious, already
/// documented choice).
#[must_use]
pub fn error_code(err: &Error) -> u32 {
    match err {
        Error::Validation { .. } | Error::Json { .. } => 400,
        Error::NotFound { .. } => 404,
        Error::Conflict { .. } => 409,
        Error::Referential { .. } => 422,
        Error::Computation { .. }
        | Error::Database { .. }
        | Error::Transport { .. }
        | Error::Config { .. }
        | Error::Io { .. }
        | Error::Cache { .. }
        | Error::Internal { .. } => 500,
    }
}

/// What this server actually publishes on the Redis broker: the
/// [`RecordEvent`] the in-process commit produced, tagged with the
/// submitting connection's id so every other subscriber's fanout task
/// can skip replaying it back to its own originator (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub source: String,
    pub event: RecordEvent,
}

impl Envelope {
    #[must_use]
    pub fn ops(&self) -> Vec<Operation> {
        match &self.event {
            RecordEvent::Create { fields, .. } | RecordEvent::Update { fields, .. } => {
                ops_for_fields(fields)
            }
            RecordEvent::Delete { .. } => Vec::new(),
        }
    }

    #[must_use]
    pub fn version(&self) -> i64 {
        self.event.new_version().unwrap_or_default()
    }
}

#[must_use]
fn ops_for_fields(fields: &BTreeMap<FieldId, CellValue>) -> Vec<Operation> {
    fields
        .iter()
        .map(|(field_id, value)| Operation::field_write(*field_id, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_subscribe_round_trips() {
        let raw = r#"{"a":"s","c":"rec_t1","d":"r1"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { c, d } if c == "rec_t1" && d == "r1"));
    }

    #[test]
    fn server_err_serializes_with_action_tag() {
        let msg = ServerMessage::Err {
            code: 404,
            message: "field not found: f1".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["a"], "err");
        assert_eq!(json["code"], 404);
    }

    #[test]
    fn operation_field_id_parses_data_path() {
        let field_id = FieldId::new();
        let op = Operation::field_write(field_id, &CellValue::Text("x".into()));
        assert_eq!(op.field_id(), Some(field_id));
    }

    #[test]
    fn operation_field_id_none_for_non_data_path() {
        let op = Operation {
            p: vec!["meta".into()],
            oi: None,
            od: None,
            li: None,
            ld: None,
        };
        assert_eq!(op.field_id(), None);
    }
}
