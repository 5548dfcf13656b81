use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Method,
};

use crate::{options::read_non_empty, HeaderList, TransportError};

/// One outbound HTTP call as handed to a [`Transport`].
#[derive(Clone, Debug, PartialEq)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderList,
    /// Content type declared for `body`. Caller headers may override it.
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

/// Raw status and body text of a completed call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

/// Performs a single HTTP call. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        (**self).execute(request).await
    }
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing client, e.g. one with custom TLS or proxy settings.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Builds a client that sends `user_agent` on every request.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { http })
    }

    /// Reads `HTTP_DISPATCH_USER_AGENT`; unset keeps reqwest's default.
    ///
    /// Fails if the variable is set but empty, or the client cannot be built.
    pub fn from_env() -> std::result::Result<Self, String> {
        match read_non_empty("HTTP_DISPATCH_USER_AGENT")? {
            Some(user_agent) => Self::with_user_agent(&user_agent)
                .map_err(|err| format!("could not build HTTP client: {err}")),
            None => Ok(Self::new()),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let headers = to_header_map(&request.headers, request.content_type)?;
        let response = self
            .http
            .request(request.method, &request.url)
            .headers(headers)
            .timeout(request.timeout)
            .body(request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(WireResponse { status, body })
    }
}

fn to_header_map(headers: &HeaderList, content_type: &str) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len() + 1);
    if !headers.contains(CONTENT_TYPE.as_str()) {
        let value = HeaderValue::from_str(content_type).map_err(|_| TransportError::InvalidHeader {
            name: CONTENT_TYPE.as_str().to_owned(),
        })?;
        map.insert(CONTENT_TYPE, value);
    }
    for (name, value) in headers.iter() {
        let invalid = || TransportError::InvalidHeader {
            name: name.to_owned(),
        };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        if header_name == CONTENT_TYPE {
            map.insert(header_name, header_value);
        } else {
            map.append(header_name, header_value);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::to_header_map;
    use crate::{HeaderList, TransportError};

    #[test]
    fn content_type_defaults_to_declared_body_type() {
        let headers: HeaderList = [("x-region", "eu")].into_iter().collect();
        let map = to_header_map(&headers, "application/json").expect("valid headers");
        assert_eq!(map["content-type"], "application/json");
        assert_eq!(map["x-region"], "eu");
    }

    #[test]
    fn caller_content_type_wins() {
        let headers: HeaderList = [("Content-Type", "text/plain")].into_iter().collect();
        let map = to_header_map(&headers, "application/json").expect("valid headers");
        assert_eq!(map.get_all("content-type").iter().count(), 1);
        assert_eq!(map["content-type"], "text/plain");
    }

    #[test]
    fn duplicate_content_type_spellings_collapse_to_one() {
        let headers: HeaderList = [("Content-Type", "text/plain"), ("content-type", "text/csv")]
            .into_iter()
            .collect();
        let map = to_header_map(&headers, "application/json").expect("valid headers");
        assert_eq!(map.get_all("content-type").iter().count(), 1);
        assert_eq!(map["content-type"], "text/csv");
    }

    #[test]
    fn other_repeated_headers_are_kept() {
        let headers: HeaderList = [("Accept", "text/html"), ("accept", "application/json")]
            .into_iter()
            .collect();
        let map = to_header_map(&headers, "application/json").expect("valid headers");
        assert_eq!(map.get_all("accept").iter().count(), 2);
    }

    #[test]
    fn unencodable_header_is_a_transport_error() {
        let headers: HeaderList = [("bad header", "x")].into_iter().collect();
        let err = to_header_map(&headers, "application/json").expect_err("must fail");
        assert!(matches!(err, TransportError::InvalidHeader { name } if name == "bad header"));
    }
}
