use std::{fmt, time::Duration};

use tokio::time::sleep;

use crate::{
    transport::{ReqwestTransport, Transport},
    ClientOptions, DispatchError, HeaderList, PreparedRequest, RegionCursor, RequestSpec,
    ResponseEnvelope, Result, SingleShotRequester, TransportError,
};

/// Retrying JSON HTTP dispatcher.
///
/// Each [`dispatch`](Self::dispatch) call validates its arguments once, then
/// runs up to `max_retries + 1` attempts in the caller's task, waiting
/// between attempts according to the configured delay schedule. Any status
/// below 500 ends the loop; 5xx statuses and transport failures are retried.
#[derive(Clone)]
pub struct HttpDispatcher<T = ReqwestTransport> {
    requester: SingleShotRequester<T>,
    options: ClientOptions,
}

impl<T> fmt::Debug for HttpDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDispatcher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl HttpDispatcher<ReqwestTransport> {
    /// Creates a dispatcher over a default `reqwest` client.
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Creates a dispatcher from [`ClientOptions::from_env`] and
    /// [`ReqwestTransport::from_env`].
    ///
    /// Fails if an override variable is set but empty, or if the configured
    /// user agent cannot be used.
    pub fn from_env() -> std::result::Result<Self, String> {
        let options = ClientOptions::from_env()?;
        let transport = ReqwestTransport::from_env()?;
        Ok(Self::with_transport(transport).with_options(options))
    }
}

impl Default for HttpDispatcher<ReqwestTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> HttpDispatcher<T> {
    /// Creates a dispatcher over any [`Transport`].
    pub fn with_transport(transport: T) -> Self {
        Self {
            requester: SingleShotRequester::new(transport),
            options: ClientOptions::default(),
        }
    }

    /// Applies delay schedule and region header options.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        self.requester.transport()
    }

    /// Sends `spec`, retrying 5xx statuses and transport failures.
    ///
    /// Returns the first envelope with a status below 500, 4xx included.
    /// Fails with [`DispatchError::InvalidArgument`] before any network call
    /// when the arguments are malformed, and with
    /// [`DispatchError::RetryExhausted`] once every attempt has failed.
    pub async fn dispatch(&self, spec: &RequestSpec) -> Result<ResponseEnvelope> {
        let request = spec.prepare(&self.options.delay_schedule)?;
        self.dispatch_prepared(&request).await
    }

    /// Like [`dispatch`](Self::dispatch) but returns the envelope as JSON.
    pub async fn dispatch_json(&self, spec: &RequestSpec) -> Result<serde_json::Value> {
        self.dispatch(spec).await.map(ResponseEnvelope::into_json)
    }

    async fn dispatch_prepared(&self, request: &PreparedRequest) -> Result<ResponseEnvelope> {
        let mut regions = request.allowed_regions.as_deref().and_then(RegionCursor::new);
        let mut attempt = 0usize;
        loop {
            if attempt > 0 {
                self.wait_before_retry(attempt).await;
            }

            let headers = self.attempt_headers(request, regions.as_mut());

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt,
                method = %request.method,
                url = %request.url,
                headers = %headers.redacted(),
                "dispatching request"
            );

            let outcome = self
                .requester
                .send(request, &headers)
                .await
                .and_then(Self::classify);

            match outcome {
                Ok(envelope) => return Ok(envelope),
                Err(err) if attempt >= request.max_retries => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        attempts = attempt + 1,
                        error = %err,
                        "request failed, retries exhausted"
                    );
                    return Err(DispatchError::RetryExhausted {
                        attempts: attempt + 1,
                        source: err,
                    });
                }
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(attempt, error = %_err, "request attempt failed, retrying");
                    attempt += 1;
                }
            }
        }
    }

    fn attempt_headers(
        &self,
        request: &PreparedRequest,
        regions: Option<&mut RegionCursor<'_>>,
    ) -> HeaderList {
        let mut headers = request.headers.clone();
        if let Some(cursor) = regions {
            headers.set(&self.options.region_header, cursor.advance());
        }
        headers
    }

    fn classify(envelope: ResponseEnvelope) -> std::result::Result<ResponseEnvelope, TransportError> {
        if envelope.is_acceptable() {
            Ok(envelope)
        } else {
            Err(TransportError::Status {
                status_code: envelope.status_code,
                response: envelope.response,
            })
        }
    }

    /// Waits the scheduled delay for `attempt` before it runs.
    async fn wait_before_retry(&self, attempt: usize) {
        let delay = self.options.delay_schedule.delay_for(attempt);

        #[cfg(feature = "tracing")]
        tracing::debug!("retrying request after {} ms", delay.as_millis());

        if delay > Duration::ZERO {
            sleep(delay).await;
        }
    }
}
