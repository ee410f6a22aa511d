//! JSON wire protocol spoken over the room socket.
//!
//! Outbound:
//! ```text
//! {"id":"<uuid>","method":"subscription","params":{"path":"rooms.canvas.getStream","input":{"json":{"roomSlug":"main"}}}}
//! {"id":"<uuid>","method":"subscription.stop"}
//! {"method":"mutation","params":{"path":"rooms.placePixel","input":{"json":{"roomSlug":"main","posX":1,"posY":2,"color":3}}}}
//! ```
//!
//! Inbound (every frame carries the correlation id it answers):
//! ```text
//! {"id":"<uuid>","result":{"type":"started"}}
//! {"id":"<uuid>","result":{"type":"data","data":{"json":{...}}}}
//! {"id":"<uuid>","error":{"json":{"message":"...","data":{"code":"UNAUTHORIZED"}}}}
//! ```
//!
//! Ids are normalized to strings at decode time; numeric ids from the
//! authority become their decimal form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown subscription topic '{0}'")]
    UnknownTopic(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Malformed frame: {0}")]
    Malformed(String),
    #[error("Frame has no correlation id")]
    MissingId,
    #[error("Frame has neither result nor error")]
    EmptyFrame,
}

/// Streams a client can subscribe to, each scoped by room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    CanvasStream,
    ChatStream,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::CanvasStream, Topic::ChatStream];

    pub const fn path(self) -> &'static str {
        match self {
            Topic::CanvasStream => "rooms.canvas.getStream",
            Topic::ChatStream => "rooms.getChat",
        }
    }
}

impl FromStr for Topic {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.path() == s)
            .ok_or_else(|| ProtocolError::UnknownTopic(s.to_string()))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Canonical correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SubscriptionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Signed(n) => Self(n.to_string()),
            RawId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

/// superjson-style `{"json": ...}` wrapper around every input and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub json: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInput {
    pub room_slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacePixelInput {
    pub room_slug: String,
    pub pos_x: u32,
    pub pos_y: u32,
    pub color: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    pub room_slug: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MutationInput {
    PlacePixel(PlacePixelInput),
    SendMessage(SendMessageInput),
}

impl MutationInput {
    pub fn path(&self) -> &'static str {
        match self {
            MutationInput::PlacePixel(_) => "rooms.placePixel",
            MutationInput::SendMessage(_) => "rooms.sendMessage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params<I> {
    pub path: String,
    pub input: Envelope<I>,
}

/// Client → authority frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum OutboundFrame {
    #[serde(rename = "subscription")]
    Subscribe {
        id: SubscriptionId,
        params: Params<RoomInput>,
    },
    #[serde(rename = "subscription.stop")]
    Stop { id: SubscriptionId },
    #[serde(rename = "mutation")]
    Mutation { params: Params<MutationInput> },
}

impl OutboundFrame {
    pub fn subscribe(id: SubscriptionId, topic: Topic, room_slug: impl Into<String>) -> Self {
        OutboundFrame::Subscribe {
            id,
            params: Params {
                path: topic.path().to_string(),
                input: Envelope {
                    json: RoomInput {
                        room_slug: room_slug.into(),
                    },
                },
            },
        }
    }

    pub fn stop(id: SubscriptionId) -> Self {
        OutboundFrame::Stop { id }
    }

    pub fn mutation(input: MutationInput) -> Self {
        OutboundFrame::Mutation {
            params: Params {
                path: input.path().to_string(),
                input: Envelope { json: input },
            },
        }
    }

    pub fn place_pixel(room_slug: impl Into<String>, x: u32, y: u32, color: u16) -> Self {
        Self::mutation(MutationInput::PlacePixel(PlacePixelInput {
            room_slug: room_slug.into(),
            pos_x: x,
            pos_y: y,
            color,
        }))
    }

    pub fn send_message(room_slug: impl Into<String>, message: impl Into<String>) -> Self {
        Self::mutation(MutationInput::SendMessage(SendMessageInput {
            room_slug: room_slug.into(),
            message: message.into(),
        }))
    }

    /// `(id, topic path, room)` for subscription starts.
    pub fn subscription(&self) -> Option<(&SubscriptionId, &str, &str)> {
        match self {
            OutboundFrame::Subscribe { id, params } => {
                Some((id, params.path.as_str(), params.input.json.room_slug.as_str()))
            }
            _ => None,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Error reported by the authority for a correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub message: String,
    /// Symbolic code such as `UNAUTHORIZED` or `TOO_MANY_REQUESTS`.
    pub code: Option<String>,
    pub http_status: Option<u16>,
    pub raw: Value,
}

impl RemoteError {
    fn from_value(raw: Value) -> Self {
        let body = raw.get("json").unwrap_or(&raw);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        let data = body.get("data");
        let code = data
            .and_then(|d| d.get("code"))
            .or_else(|| body.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let http_status = data
            .and_then(|d| d.get("httpStatus"))
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok());
        Self {
            message,
            code,
            http_status,
            raw,
        }
    }

    /// The authority wants the client to re-authenticate.
    pub fn is_unauthorized(&self) -> bool {
        self.code.as_deref() == Some("UNAUTHORIZED") || self.http_status == Some(401)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundBody {
    /// Subscription acknowledged. Advisory only.
    Started,
    /// Subscription ended by the authority.
    Stopped,
    /// One stream payload, envelope already removed.
    Data(Value),
    Error(RemoteError),
}

/// Authority → client frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub id: SubscriptionId,
    pub body: InboundBody,
}

#[derive(Deserialize)]
struct RawInbound {
    #[serde(default)]
    id: Option<SubscriptionId>,
    #[serde(default)]
    result: Option<RawResult>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawResult {
    Started,
    Stopped,
    Data {
        #[serde(default)]
        data: Value,
    },
}

impl InboundFrame {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawInbound =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let id = raw.id.ok_or(ProtocolError::MissingId)?;

        let body = match (raw.result, raw.error) {
            (_, Some(error)) => InboundBody::Error(RemoteError::from_value(error)),
            (Some(RawResult::Started), None) => InboundBody::Started,
            (Some(RawResult::Stopped), None) => InboundBody::Stopped,
            (Some(RawResult::Data { mut data }), None) => {
                let payload = match data.get_mut("json") {
                    Some(inner) => inner.take(),
                    None => data,
                };
                InboundBody::Data(payload)
            }
            (None, None) => return Err(ProtocolError::EmptyFrame),
        };
        Ok(Self { id, body })
    }

    /// Build a data frame (used by test authorities).
    pub fn data(id: SubscriptionId, payload: Value) -> Self {
        Self {
            id,
            body: InboundBody::Data(payload),
        }
    }

    /// Wire form, wrapping payloads in the `json` envelope.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let value = match &self.body {
            InboundBody::Started => serde_json::json!({"id": self.id, "result": {"type": "started"}}),
            InboundBody::Stopped => serde_json::json!({"id": self.id, "result": {"type": "stopped"}}),
            InboundBody::Data(payload) => serde_json::json!({
                "id": self.id,
                "result": {"type": "data", "data": {"json": payload}},
            }),
            InboundBody::Error(err) => serde_json::json!({"id": self.id, "error": err.raw}),
        };
        serde_json::to_string(&value).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}

/// Canvas stream payload: one cell changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelUpdate {
    #[serde(default)]
    pub room_slug: String,
    pub pos_x: i64,
    pub pos_y: i64,
    pub color: i64,
}

/// Chat stream payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub room_slug: String,
    #[serde(default)]
    pub author_uid: Option<String>,
    #[serde(default)]
    pub sent_at: Option<Value>,
    pub content: String,
}
