//! Wire protocol: JSON frames from the relay, plain text frames to it.
//!
//! Server → client:
//!   `{"initial": true, "userId": 7}`     identity assignment
//!   `{"text": "hi", "userId": 3}`        chat message (`userId` may be absent)
//!
//! Client → server: the payload itself, no envelope. The relay attributes
//! the sender when it rebroadcasts.

use serde::Serialize;
use serde_json::Value;
use transcript::Identity;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("unsupported userId: {0}")]
    BadIdentity(Value),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
}

/// A decoded frame from the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    IdentityAssignment(Identity),
    ChatMessage {
        sender: Option<Identity>,
        text: String,
    },
}

/// A frame to send to the relay. Both variants go out as a plain text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    /// A `data:` URL carrying a whole file.
    File(String),
}

impl OutboundFrame {
    pub fn into_payload(self) -> String {
        match self {
            OutboundFrame::Text(s) | OutboundFrame::File(s) => s,
        }
    }
}

/// Frame written by the relay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayFrame {
    pub user_id: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub initial: bool,
}

impl RelayFrame {
    pub fn welcome(user_id: Identity) -> Self {
        Self {
            user_id,
            text: None,
            initial: true,
        }
    }

    pub fn chat(user_id: Identity, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: Some(text.into()),
            initial: false,
        }
    }
}

/// Decode a raw text frame from the relay.
///
/// A frame is an identity assignment when it carries an `initial` key (any
/// value) and a truthy `userId`. Everything else is a chat message.
pub fn decode_inbound(raw: &str) -> Result<InboundFrame, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(map) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let user_id = match map.get("userId") {
        Some(v) => identity_from_value(v)?,
        None => None,
    };

    if map.contains_key("initial") {
        if let Some(id) = user_id {
            return Ok(InboundFrame::IdentityAssignment(id));
        }
    }

    let text = match map.get("text") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    Ok(InboundFrame::ChatMessage {
        sender: user_id,
        text,
    })
}

/// Map a JSON `userId` to an identity. Falsy values (`null`, `false`, `0`,
/// `""`) mean "no sender".
fn identity_from_value(value: &Value) -> Result<Option<Identity>, DecodeError> {
    match value {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(Identity::Text(s.clone()))),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(None),
            Some(id) => Ok(Some(Identity::Number(id))),
            None if n.as_f64() == Some(0.0) => Ok(None),
            None => Ok(Some(Identity::Text(n.to_string()))),
        },
        other => Err(DecodeError::BadIdentity(other.clone())),
    }
}

/// Derive the chat endpoint from a page URL: same host, `ws` appended to the
/// page path, `http(s)` swapped for `ws(s)`.
pub fn endpoint_url(page: &Url) -> Result<Url, ProtocolError> {
    let scheme = match page.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ProtocolError::UnsupportedScheme(other.to_string())),
    };

    let host = page
        .host_str()
        .ok_or_else(|| ProtocolError::InvalidUrl(url::ParseError::EmptyHost))?;
    let authority = match page.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    Ok(Url::parse(&format!(
        "{}://{}{}ws",
        scheme,
        authority,
        page.path()
    ))?)
}
