use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned user identifier. Opaque to the client: it is only ever
/// compared for equality and displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    Number(u64),
    Text(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Number(n) => write!(f, "{}", n),
            Identity::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Identity {
    fn from(n: u64) -> Self {
        Identity::Number(n)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity::Text(s.to_string())
    }
}

/// Who a rendered message is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    /// Authored by this client.
    Local,
    Remote(Identity),
    /// No attributable sender (e.g. a system message).
    Unattributed,
}
