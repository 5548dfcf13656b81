use crate::{
    transport::{Transport, WireRequest},
    HeaderList, PreparedRequest, ResponseEnvelope, TransportError,
};

/// Content type passed to the transport for every body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Performs exactly one HTTP call and normalizes the result.
#[derive(Clone, Debug)]
pub struct SingleShotRequester<T> {
    transport: T,
}

impl<T: Transport> SingleShotRequester<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `request` with `headers` in place of the request's own headers.
    ///
    /// The payload always goes out JSON-encoded. Query params are not
    /// appended to the URL. Bodies that are not JSON come back as a
    /// text-carrying envelope rather than an error.
    pub async fn send(
        &self,
        request: &PreparedRequest,
        headers: &HeaderList,
    ) -> Result<ResponseEnvelope, TransportError> {
        #[cfg(feature = "tracing")]
        if !request.params.is_empty() {
            tracing::debug!(
                count = request.params.len(),
                "query params are accepted but not transmitted"
            );
        }

        let body = serde_json::to_vec(&request.payload)
            .map_err(|err| TransportError::Unavailable(format!("payload encoding failed: {err}")))?;

        let wire = WireRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: headers.clone(),
            content_type: JSON_CONTENT_TYPE,
            body,
            timeout: request.timeout,
        };

        let response = self.transport.execute(wire).await?;
        Ok(ResponseEnvelope::from_body(response.status, &response.body))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::{SingleShotRequester, JSON_CONTENT_TYPE};
    use crate::{
        transport::{Transport, WireRequest, WireResponse},
        DelaySchedule, RequestSpec, TransportError,
    };

    struct Capture {
        seen: Mutex<Vec<WireRequest>>,
        reply: WireResponse,
    }

    #[async_trait]
    impl Transport for Capture {
        async fn execute(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
            self.seen.lock().expect("capture lock").push(request);
            Ok(self.reply.clone())
        }
    }

    fn capture(status: u16, body: &str) -> Capture {
        Capture {
            seen: Mutex::new(Vec::new()),
            reply: WireResponse {
                status,
                body: body.to_owned(),
            },
        }
    }

    #[tokio::test]
    async fn payload_is_json_encoded_and_params_are_dropped() {
        let requester = SingleShotRequester::new(capture(200, r#"{"id":1}"#));
        let prepared = RequestSpec::new("http://localhost/hook?fixed=1")
            .method("put")
            .params(json!({"page": "2"}))
            .payload(json!({"name": "kit"}))
            .timeout_ms(750)
            .prepare(&DelaySchedule::standard())
            .expect("valid spec");

        let envelope = requester
            .send(&prepared, &prepared.headers)
            .await
            .expect("must succeed");
        assert_eq!(envelope.response, json!({"id": 1}));

        let seen = requester.transport().seen.lock().expect("capture lock");
        assert_eq!(seen.len(), 1);
        let wire = &seen[0];
        assert_eq!(wire.url, "http://localhost/hook?fixed=1");
        assert_eq!(wire.method, reqwest::Method::PUT);
        assert_eq!(wire.content_type, JSON_CONTENT_TYPE);
        assert_eq!(wire.timeout.as_millis(), 750);
        let body: serde_json::Value = serde_json::from_slice(&wire.body).expect("json body");
        assert_eq!(body, json!({"name": "kit"}));
    }

    #[tokio::test]
    async fn text_body_degrades_to_envelope() {
        let requester = SingleShotRequester::new(capture(502, "Bad Gateway"));
        let prepared = RequestSpec::new("http://localhost")
            .prepare(&DelaySchedule::standard())
            .expect("valid spec");

        let envelope = requester
            .send(&prepared, &prepared.headers)
            .await
            .expect("parse failure is not an error");
        assert_eq!(envelope.status_code, 502);
        assert_eq!(
            envelope.response,
            json!({"status_code": 502, "response": "Bad Gateway"})
        );
    }
}
