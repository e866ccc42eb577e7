use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque identifier of an upstream face search.
///
/// Never parsed or rewritten after it has been extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub const MAX_LEN: usize = 128;

    /// Accept an identifier supplied from outside (e.g. a URL path segment).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Overall status reported to the caller for one verification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Accepted,
    Pending,
    Rejected,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_opaque_tokens() {
        assert_eq!(JobId::parse(" 789 ").unwrap().as_str(), "789");
        assert!(JobId::parse("abc-DEF_1").is_some());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(JobId::parse("").is_none());
        assert!(JobId::parse("../etc").is_none());
        assert!(JobId::parse(&"9".repeat(JobId::MAX_LEN + 1)).is_none());
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&JobStatus::Accepted).unwrap(), "\"accepted\"");
        assert_eq!(JobStatus::Rejected.to_string(), "rejected");
    }
}
