//! JSON frames exchanged over the real-time socket.
//!
//! Every frame is `{"event": <name>, "data": <payload>}`; alert updates also carry a
//! top-level `kind` of `created` or `updated`.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;
use uuid::Uuid;

use crate::bus::{AlertEvent, EventKind};
use crate::models::{Alert, AlertPayload};

pub const ALERT_UPDATE: &str = "alertUpdate";
pub const ALERT_REMOVED: &str = "alertRemoved";
pub const NEW_ALERT: &str = "newAlert";
pub const ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// Full authoritative record after a create or update.
    AlertUpdate { kind: EventKind, alert: Alert },
    AlertRemoved { id: Uuid },
    Error { message: String },
}

#[derive(Serialize)]
struct WireFrame<'a, T: Serialize> {
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<EventKind>,
    data: &'a T,
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for ServerFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ServerFrame::AlertUpdate { kind, alert } => WireFrame {
                event: ALERT_UPDATE,
                kind: Some(*kind),
                data: alert,
            }
            .serialize(serializer),
            ServerFrame::AlertRemoved { id } => WireFrame {
                event: ALERT_REMOVED,
                kind: None,
                data: &json!({ "id": id }),
            }
            .serialize(serializer),
            ServerFrame::Error { message } => WireFrame {
                event: ERROR,
                kind: None,
                data: &json!({ "message": message }),
            }
            .serialize(serializer),
        }
    }
}

impl From<AlertEvent> for ServerFrame {
    fn from(event: AlertEvent) -> Self {
        let kind = event.kind();
        match event {
            AlertEvent::Created(alert) | AlertEvent::Updated(alert) => {
                ServerFrame::AlertUpdate { kind, alert }
            }
            AlertEvent::Deleted { id } => ServerFrame::AlertRemoved { id },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientFrame {
    /// Legacy path for creating an alert over the socket instead of HTTP.
    #[serde(rename = "newAlert")]
    NewAlert(AlertPayload),
    #[serde(rename = "ping")]
    Ping,
}
