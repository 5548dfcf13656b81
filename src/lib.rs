//! `pg-http-retry` dispatches JSON HTTP requests from database procedures.
//!
//! The crate provides:
//! - [`HttpDispatcher::dispatch`], a retrying dispatcher with a fixed delay
//!   schedule and per-attempt region header rotation
//! - [`SingleShotRequester`], the single attempt it wraps
//! - [`SecretAccessor::fetch_secret`], a role-gated secret lookup

mod dispatcher;
mod envelope;
mod error;
mod options;
mod request;
mod requester;
mod schedule;
pub mod secret;
pub mod transport;

pub use dispatcher::HttpDispatcher;
pub use envelope::ResponseEnvelope;
pub use error::{DispatchError, TransportError};
pub use options::{ClientOptions, DEFAULT_REGION_HEADER};
pub use request::{
    HeaderList, PreparedRequest, Redacted, RequestSpec, DEFAULT_METHOD, DEFAULT_TIMEOUT_MS,
};
pub use requester::{SingleShotRequester, JSON_CONTENT_TYPE};
pub use schedule::{DelaySchedule, RegionCursor, STANDARD_DELAYS_MS};
pub use secret::{CallerIdentity, InMemorySecretStore, SecretAccessor, SecretPolicy, SecretStore};
pub use transport::{ReqwestTransport, Transport};

pub type Result<T> = std::result::Result<T, DispatchError>;
