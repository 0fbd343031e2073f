use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An inbound message. Fields are private so a received query cannot be edited in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    session_id: SessionId,
    text: String,
    received_at: DateTime<Utc>,
}

impl Query {
    pub fn new(session_id: SessionId, text: impl Into<String>) -> Self {
        Self::received_at(session_id, text, Utc::now())
    }

    pub fn received_at(
        session_id: SessionId,
        text: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self { session_id, text: text.into(), received_at }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.received_at
    }
}
