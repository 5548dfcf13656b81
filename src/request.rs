use std::{fmt, time::Duration};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{DelaySchedule, DispatchError, Result};

/// Method used when none is given.
pub const DEFAULT_METHOD: &str = "POST";
/// Per-attempt timeout used when none is given.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Arguments of one dispatch call.
///
/// `headers`, `params` and `payload` are kept as raw JSON so their shape can
/// be checked; each must be a JSON object. Missing fields in a JSON argument
/// document take the same defaults as [`RequestSpec::new`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Target URL.
    pub url: String,
    /// HTTP method name, case-insensitive.
    #[serde(default = "default_method")]
    pub method: String,
    /// Header name to value object.
    #[serde(default = "empty_object")]
    pub headers: JsonValue,
    /// Query parameter object. Accepted but not transmitted.
    #[serde(default = "empty_object")]
    pub params: JsonValue,
    /// JSON body object.
    #[serde(default = "empty_object")]
    pub payload: JsonValue,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries allowed after the first attempt.
    #[serde(default)]
    pub max_retries: usize,
    /// Regions rotated through the region header, one per attempt.
    #[serde(default)]
    pub allowed_regions: Option<Vec<String>>,
}

fn default_method() -> String {
    DEFAULT_METHOD.to_owned()
}

fn empty_object() -> JsonValue {
    JsonValue::Object(Map::new())
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl RequestSpec {
    /// Creates a `POST` request with empty headers, params and payload.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: empty_object(),
            params: empty_object(),
            payload: empty_object(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: 0,
            allowed_regions: None,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Adds one header. Has no effect if `headers` was replaced with a
    /// non-object value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let JsonValue::Object(map) = &mut self.headers {
            map.insert(name.into(), JsonValue::String(value.into()));
        }
        self
    }

    pub fn headers(mut self, headers: JsonValue) -> Self {
        self.headers = headers;
        self
    }

    pub fn params(mut self, params: JsonValue) -> Self {
        self.params = params;
        self
    }

    pub fn payload(mut self, payload: JsonValue) -> Self {
        self.payload = payload;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn allowed_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    /// Validates the arguments against `schedule` and converts them into
    /// their wire-ready form. No network activity happens here.
    pub fn prepare(&self, schedule: &DelaySchedule) -> Result<PreparedRequest> {
        let headers = expect_object("headers", &self.headers)?;
        let params = expect_object("params", &self.params)?;
        let payload = expect_object("payload", &self.payload)?;

        if let Some(regions) = &self.allowed_regions {
            if regions.is_empty() {
                return Err(DispatchError::InvalidArgument(
                    "allowed_regions must not be empty when provided".to_owned(),
                ));
            }
        }

        if !schedule.supports(self.max_retries) {
            return Err(DispatchError::InvalidArgument(format!(
                "max_retries {} exceeds the delay schedule ({} entries)",
                self.max_retries,
                schedule.len()
            )));
        }

        if self.url.trim().is_empty() {
            return Err(DispatchError::InvalidArgument(
                "url must not be empty".to_owned(),
            ));
        }

        let method = parse_method(&self.method)?;

        Ok(PreparedRequest {
            url: self.url.trim().to_owned(),
            method,
            headers: HeaderList::from_json(headers),
            params: params.clone(),
            payload: payload.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            allowed_regions: self.allowed_regions.clone(),
        })
    }
}

fn expect_object<'a>(field: &str, value: &'a JsonValue) -> Result<&'a Map<String, JsonValue>> {
    value.as_object().ok_or_else(|| {
        DispatchError::InvalidArgument(format!(
            "{field} must be a JSON object, got {}",
            json_kind(value)
        ))
    })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn parse_method(method: &str) -> Result<Method> {
    let normalized = method.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return Err(DispatchError::InvalidArgument(
            "method must not be empty".to_owned(),
        ));
    }
    Method::from_bytes(normalized.as_bytes())
        .map_err(|_| DispatchError::InvalidArgument(format!("invalid HTTP method '{method}'")))
}

/// Validated request, ready for attempts.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderList,
    pub params: Map<String, JsonValue>,
    pub payload: Map<String, JsonValue>,
    pub timeout: Duration,
    pub max_retries: usize,
    pub allowed_regions: Option<Vec<String>>,
}

/// Header names whose values are hidden in traces.
const REDACTED_HEADERS: [&str; 5] = [
    "authorization",
    "proxy-authorization",
    "apikey",
    "x-api-key",
    "cookie",
];

/// Ordered flat list of header name/value pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    /// Converts a JSON object; strings are taken verbatim, other values use
    /// their JSON text and `null` becomes an empty value.
    pub fn from_json(headers: &Map<String, JsonValue>) -> Self {
        Self(
            headers
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        JsonValue::String(text) => text.clone(),
                        JsonValue::Null => String::new(),
                        other => other.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect(),
        )
    }

    /// Sets `name`, dropping every entry with the same name regardless of case.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.0.push((name.to_owned(), value.into()));
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display adapter that hides credential-bearing values.
    pub fn redacted(&self) -> Redacted<'_> {
        Redacted(self)
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// See [`HeaderList::redacted`].
pub struct Redacted<'a>(&'a HeaderList);

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.0.iter() {
            let hidden = REDACTED_HEADERS
                .iter()
                .any(|secret| name.eq_ignore_ascii_case(secret));
            if hidden {
                map.entry(&name, &"<redacted>");
            } else {
                map.entry(&name, &value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Method;
    use serde_json::json;

    use super::{HeaderList, RequestSpec, DEFAULT_TIMEOUT_MS};
    use crate::{DelaySchedule, DispatchError};

    fn prepare(spec: &RequestSpec) -> Result<super::PreparedRequest, DispatchError> {
        spec.prepare(&DelaySchedule::standard())
    }

    #[test]
    fn array_headers_are_rejected() {
        let spec = RequestSpec::new("http://localhost").headers(json!([1, 2, 3]));
        let err = prepare(&spec).expect_err("must fail");
        match err {
            DispatchError::InvalidArgument(message) => {
                assert!(message.contains("headers"));
                assert!(message.contains("array"));
            }
            other => panic!("expected invalid argument, got {other:?}"),
        }
    }

    #[test]
    fn null_and_scalar_shapes_are_rejected() {
        let params = RequestSpec::new("http://localhost").params(json!(null));
        assert!(matches!(
            prepare(&params),
            Err(DispatchError::InvalidArgument(_))
        ));

        let payload = RequestSpec::new("http://localhost").payload(json!("text"));
        assert!(matches!(
            prepare(&payload),
            Err(DispatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn empty_region_list_is_rejected() {
        let spec = RequestSpec::new("http://localhost").allowed_regions(Vec::<String>::new());
        assert!(matches!(
            prepare(&spec),
            Err(DispatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn retries_beyond_schedule_are_rejected() {
        assert!(prepare(&RequestSpec::new("http://localhost").max_retries(5)).is_ok());
        let err = prepare(&RequestSpec::new("http://localhost").max_retries(6))
            .expect_err("must fail");
        assert!(err.to_string().contains("max_retries 6"));
    }

    #[test]
    fn method_is_normalized_and_checked() {
        let prepared =
            prepare(&RequestSpec::new("http://localhost").method("patch")).expect("valid");
        assert_eq!(prepared.method, Method::PATCH);

        let err = prepare(&RequestSpec::new("http://localhost").method("GE T"))
            .expect_err("must fail");
        assert!(matches!(err, DispatchError::InvalidArgument(_)));
    }

    #[test]
    fn json_document_defaults() {
        let spec: RequestSpec =
            serde_json::from_value(json!({"url": "http://localhost/hook"})).expect("must parse");
        assert_eq!(spec.method, "POST");
        assert_eq!(spec.headers, json!({}));
        assert_eq!(spec.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(spec.max_retries, 0);
        assert!(spec.allowed_regions.is_none());

        let prepared = prepare(&spec).expect("valid");
        assert_eq!(prepared.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn explicit_null_headers_in_document_are_rejected() {
        let spec: RequestSpec =
            serde_json::from_value(json!({"url": "http://localhost", "headers": null}))
                .expect("must parse");
        assert!(matches!(
            prepare(&spec),
            Err(DispatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn header_values_render_as_text() {
        let spec = RequestSpec::new("http://localhost")
            .headers(json!({"x-count": 3, "x-flag": true, "x-name": "kit", "x-none": null}));
        let prepared = prepare(&spec).expect("valid");
        assert_eq!(prepared.headers.get("x-count"), Some("3"));
        assert_eq!(prepared.headers.get("X-FLAG"), Some("true"));
        assert_eq!(prepared.headers.get("x-name"), Some("kit"));
        assert_eq!(prepared.headers.get("x-none"), Some(""));
    }

    #[test]
    fn set_replaces_case_insensitively() {
        let mut headers: HeaderList = [("X-Region", "ap")].into_iter().collect();
        headers.set("x-region", "us");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-region"), Some("us"));
        headers.set("x-trace", "1");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn set_drops_every_case_variant() {
        let mut headers: HeaderList = [("X-Region", "ap"), ("accept", "*/*"), ("x-region", "zz")]
            .into_iter()
            .collect();
        headers.set("x-region", "eu");
        assert_eq!(headers.len(), 2);
        let regions: Vec<&str> = headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("x-region"))
            .map(|(_, value)| value)
            .collect();
        assert_eq!(regions, ["eu"]);
    }

    #[test]
    fn redacted_display_hides_credentials() {
        let headers: HeaderList = [("Authorization", "Bearer secret"), ("x-region", "eu")]
            .into_iter()
            .collect();
        let rendered = headers.redacted().to_string();
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("eu"));
        assert!(!rendered.contains("secret"));
    }
}
