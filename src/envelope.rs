use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Uniform `{status_code, response}` result of a completed attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub response: JsonValue,
}

impl ResponseEnvelope {
    /// Builds an envelope from a raw response body.
    ///
    /// A body that is not valid JSON is kept as text, nested as
    /// `{status_code, response: <text>}`.
    pub fn from_body(status_code: u16, body: &str) -> Self {
        let response = serde_json::from_str::<JsonValue>(body).unwrap_or_else(|_| {
            json!({
                "status_code": status_code,
                "response": body,
            })
        });
        Self {
            status_code,
            response,
        }
    }

    /// `true` for statuses that end the retry loop (anything below 500).
    pub fn is_acceptable(&self) -> bool {
        self.status_code < 500
    }

    pub fn into_json(self) -> JsonValue {
        json!({
            "status_code": self.status_code,
            "response": self.response,
        })
    }
}
