//! Session identifiers.
//!
//! A session id is minted when a connection is accepted and appears in every
//! log line the session produces. It renders as `sess_` followed by the
//! 32 hex digits of a v4 UUID so it stays greppable among other ids.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

const PREFIX: &str = "sess_";

/// Identifies one caller connection for its whole lifetime.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mints the id for a connection that was just accepted.
    #[must_use]
    pub fn accept() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.0.simple())
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| Error::InvalidSessionId {
            value: s.to_owned(),
            reason,
        };
        let digits = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| invalid(format!("missing `{PREFIX}` prefix")))?;
        let uuid = Uuid::try_parse(digits).map_err(|err| invalid(err.to_string()))?;
        Ok(Self(uuid))
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SessionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_session_prefix() {
        let id = SessionId::accept();
        let text = id.to_string();
        assert!(text.starts_with("sess_"));
        assert_eq!(text.len(), PREFIX.len() + 32);
        assert_eq!(text.parse::<SessionId>().unwrap(), id);
    }

    #[test]
    fn each_accept_is_distinct() {
        assert_ne!(SessionId::accept(), SessionId::accept());
    }

    #[test]
    fn bare_uuids_and_garbage_are_rejected() {
        let bare = Uuid::new_v4().to_string();
        let err = bare.parse::<SessionId>().unwrap_err();
        assert!(err.to_string().contains("missing `sess_` prefix"));
        assert!("sess_not-hex".parse::<SessionId>().is_err());
    }

    #[test]
    fn serializes_as_its_display_form() {
        let id = SessionId::accept();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        assert_eq!(serde_json::from_value::<SessionId>(json).unwrap(), id);
    }
}
