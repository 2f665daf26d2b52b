//! Per-connection handling, spec §4.10: one reader loop processing
//! client frames off the socket, one writer task draining an outbound
//! channel, and one fanout task per active subscription relaying
//! broker messages back onto that same channel. Nothing else is shared
//! between these tasks.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use gridbase_domain::error::Error;
use gridbase_domain::events::RecordEvent;
use gridbase_domain::value_objects::{CellValue, FieldId, RecordId, TableId};

use crate::protocol::{ClientMessage, Envelope, Operation, ServerMessage};
use crate::state::AppState;

const RECORD_COLLECTION_PREFIX: &str = "rec_";

fn parse_doc(collection: &str, doc: &str) -> Result<(TableId, RecordId), Error> {
    let table_str = collection
        .strip_prefix(RECORD_COLLECTION_PREFIX)
        .ok_or_else(|| Error::validation(format!("unrecognized collection {collection}")))?;
    let table_id = TableId::parse(table_str)
        .map_err(|_| Error::validation(format!("invalid table id in collection {collection}")))?;
    let record_id = RecordId::parse(doc)
        .map_err(|_| Error::validation(format!("invalid record id {doc}")))?;
    Ok((table_id, record_id))
}

fn channel_name(c: &str, d: &str) -> String {
    format!("sharedb:{c}.{d}")
}

/// Tracks what one open connection is subscribed to. The reader loop
/// owns this; the writer task only ever sees `outbound`.
struct Connection {
    client_id: String,
    user_id: String,
    outbound: mpsc::UnboundedSender<Message>,
    subscriptions: DashMap<(String, String), JoinHandle<()>>,
}

impl Connection {
    fn new(client_id: String, user_id: String, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            client_id,
            user_id,
            outbound,
            subscriptions: DashMap::new(),
        }
    }

    fn send(&self, msg: &ServerMessage) {
        let Ok(text) = serde_json::to_string(msg) else {
            tracing::warn!("failed to serialize outgoing server message");
            return;
        };
        let _ = self.outbound.send(Message::Text(text.into()));
    }

    async fn handle_subscribe(self: &Arc<Self>, state: &Arc<AppState>, c: String, d: String) {
        let key = (c.clone(), d.clone());
        if self.subscriptions.contains_key(&key) {
            return;
        }

        let (table_id, record_id) = match parse_doc(&c, &d) {
            Ok(ids) => ids,
            Err(err) => {
                self.send(&ServerMessage::from_error(&err));
                return;
            }
        };

        let snapshot = match state.records.find_record(table_id, record_id).await {
            Ok(Some(record)) => serde_json::to_value(&record).ok(),
            Ok(None) => None,
            Err(err) => {
                self.send(&ServerMessage::from_error(&err));
                return;
            }
        };

        let fanout = spawn_fanout(
            Arc::clone(state),
            Arc::clone(self),
            channel_name(&c, &d),
            c.clone(),
            d.clone(),
        );
        self.subscriptions.insert(key, fanout);
        self.send(&ServerMessage::Subscribed { c, d, snapshot });
    }

    fn handle_unsubscribe(&self, c: String, d: String) {
        if let Some((_, handle)) = self.subscriptions.remove(&(c.clone(), d.clone())) {
            handle.abort();
        }
        self.send(&ServerMessage::Unsubscribed { c, d });
    }

    async fn handle_op(
        &self,
        state: &Arc<AppState>,
        c: String,
        d: String,
        v: i64,
        ops: Vec<Operation>,
    ) {
        let (table_id, record_id) = match parse_doc(&c, &d) {
            Ok(ids) => ids,
            Err(err) => {
                self.send(&ServerMessage::from_error(&err));
                return;
            }
        };

        let mut changes: BTreeMap<FieldId, CellValue> = BTreeMap::new();
        for op in &ops {
            let Some(field_id) = op.field_id() else {
                continue;
            };
            let Some(raw) = op.oi.clone() else {
                continue;
            };
            match serde_json::from_value::<CellValue>(raw) {
                Ok(value) => {
                    changes.insert(field_id, value);
                }
                Err(err) => {
                    self.send(&ServerMessage::from_error(&Error::from(err)));
                    return;
                }
            }
        }

        if changes.is_empty() {
            self.send(&ServerMessage::from_error(&Error::validation(
                "op carried no recognizable field writes",
            )));
            return;
        }

        let result = state
            .record_service
            .update_record(table_id, record_id, changes.clone(), v, self.user_id.clone())
            .await;

        match result {
            Ok(updated) => {
                state.metrics.increment("ops_applied");
                self.send(&ServerMessage::Op {
                    c: c.clone(),
                    d: d.clone(),
                    v: updated.version,
                    op: ops,
                });
                self.publish_fanout(state, &c, &d, table_id, record_id, changes, v, updated.version)
                    .await;
            }
            Err(err) => self.send(&ServerMessage::from_error(&err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn publish_fanout(
        &self,
        state: &Arc<AppState>,
        c: &str,
        d: &str,
        table_id: TableId,
        record_id: RecordId,
        fields: BTreeMap<FieldId, CellValue>,
        old_version: i64,
        new_version: i64,
    ) {
        let event = RecordEvent::Update {
            table_id,
            record_id,
            fields,
            user_id: self.user_id.clone(),
            old_version,
            new_version,
        };
        let envelope = Envelope {
            source: self.client_id.clone(),
            event,
        };
        let Ok(payload) = serde_json::to_vec(&envelope) else {
            tracing::warn!("failed to serialize fanout envelope");
            return;
        };
        let channel = channel_name(c, d);
        if let Err(err) = state.pubsub.publish(&channel, payload).await {
            tracing::warn!(%channel, error = %err, "failed to publish op fanout");
        }
    }

    fn shutdown(&self) {
        for entry in self.subscriptions.iter() {
            entry.value().abort();
        }
        self.subscriptions.clear();
    }
}

fn spawn_fanout(
    state: Arc<AppState>,
    conn: Arc<Connection>,
    channel: String,
    c: String,
    d: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscription = match state.pubsub.subscribe(&channel).await {
            Ok(subscription) => subscription,
            Err(err) => {
                tracing::warn!(%channel, error = %err, "failed to subscribe to fanout channel");
                return;
            }
        };
        loop {
            match subscription.recv().await {
                Ok(Some(payload)) => {
                    let Ok(envelope) = serde_json::from_slice::<Envelope>(&payload) else {
                        continue;
                    };
                    if envelope.source == conn.client_id {
                        continue;
                    }
                    conn.send(&ServerMessage::Op {
                        c: c.clone(),
                        d: d.clone(),
                        v: envelope.version(),
                        op: envelope.ops(),
                    });
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%channel, error = %err, "fanout subscription error");
                    break;
                }
            }
        }
    })
}

/// Drives one WebSocket connection end-to-end, spec §4.10's scheduling
/// model: the reader loop below owns the connection's lifetime, a
/// single writer task drains `outbound`, and every active subscription
/// gets its own fanout task cancelled on unsubscribe or disconnect.
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, token: Option<String>) {
    let user_id = match state.auth.verify(token.as_deref()).await {
        Ok(user_id) => user_id,
        Err(err) => {
            tracing::warn!(error = %err, "websocket rejected by auth verifier");
            return;
        }
    };

    state.metrics.increment("connections_opened");
    let client_id = uuid::Uuid::new_v4().to_string();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let conn = Arc::new(Connection::new(client_id, user_id, tx));
    let mut handshaked = false;

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };

        let parsed: Result<ClientMessage, _> = serde_json::from_str(&text);
        match parsed {
            Ok(ClientMessage::Handshake) => {
                handshaked = true;
                conn.send(&ServerMessage::Handshake);
            }
            Ok(ClientMessage::Subscribe { c, d }) if handshaked => {
                conn.handle_subscribe(&state, c, d).await;
            }
            Ok(ClientMessage::Unsubscribe { c, d }) if handshaked => {
                conn.handle_unsubscribe(c, d);
            }
            Ok(ClientMessage::Op { c, d, v, op }) if handshaked => {
                conn.handle_op(&state, c, d, v, op).await;
            }
            Ok(ClientMessage::Ping) if handshaked => {}
            Ok(_) => conn.send(&ServerMessage::Err {
                code: 400,
                message: "handshake required before any other message".into(),
            }),
            Err(err) => conn.send(&ServerMessage::Err {
                code: 400,
                message: format!("malformed message: {err}"),
            }),
        }
    }

    conn.shutdown();
    writer.abort();
    state.metrics.increment("connections_closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_doc_rejects_unknown_collection() {
        assert!(parse_doc("views_x", "r1").is_err());
    }

    #[test]
    fn parse_doc_accepts_well_formed_ids() {
        let table_id = TableId::new();
        let record_id = RecordId::new();
        let collection = format!("rec_{table_id}");
        let (parsed_table, parsed_record) =
            parse_doc(&collection, &record_id.to_string()).unwrap();
        assert_eq!(parsed_table, table_id);
        assert_eq!(parsed_record, record_id);
    }
}
