use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Request identifier (UUID v4) printed with every command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub request_id: RequestId,
    pub command: &'static str,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// What every command prints: metadata plus its command-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub meta: Metadata,
    pub data: Value,
}

impl Envelope {
    pub fn new(command: &'static str, elapsed_ms: u64, warnings: Vec<String>, data: Value) -> Self {
        Self {
            meta: Metadata {
                request_id: RequestId::new_v4(),
                command,
                elapsed_ms,
                warnings,
            },
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_id_is_uuid_v4() {
        let request_id = RequestId::new_v4();
        assert_eq!(request_id.0.get_version_num(), 4);
    }

    #[test]
    fn empty_warnings_are_omitted() {
        let envelope = Envelope::new("report", 12, Vec::new(), json!({ "rows": [] }));

        let rendered = serde_json::to_value(&envelope).expect("serializes");

        assert_eq!(rendered["meta"]["command"], "report");
        assert_eq!(rendered["meta"]["elapsed_ms"], 12);
        assert!(rendered["meta"].get("warnings").is_none());
    }
}
