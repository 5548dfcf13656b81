use crate::DelaySchedule;

/// Header carrying the region hint on each attempt.
pub const DEFAULT_REGION_HEADER: &str = "x-region";

/// Configures the retry table and region header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Waits between attempts, indexed by attempt number.
    pub delay_schedule: DelaySchedule,
    /// Name of the header set from `allowed_regions`.
    pub region_header: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            delay_schedule: DelaySchedule::standard(),
            region_header: DEFAULT_REGION_HEADER.to_owned(),
        }
    }
}

impl ClientOptions {
    /// Reads overrides from the environment.
    ///
    /// - `HTTP_DISPATCH_REGION_HEADER` — header name used for region hints
    ///
    /// Unset variables keep their defaults; variables set to an empty value
    /// are rejected. The transport's user agent is read by
    /// [`ReqwestTransport::from_env`](crate::ReqwestTransport::from_env).
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut options = Self::default();
        if let Some(header) = read_non_empty("HTTP_DISPATCH_REGION_HEADER")? {
            options.region_header = header;
        }
        Ok(options)
    }

    pub fn with_delay_schedule(mut self, schedule: DelaySchedule) -> Self {
        self.delay_schedule = schedule;
        self
    }

    pub fn with_region_header(mut self, header: impl Into<String>) -> Self {
        self.region_header = header.into();
        self
    }
}

pub(crate) fn read_non_empty(name: &str) -> std::result::Result<Option<String>, String> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(format!("{name} is set but empty")),
        Ok(value) => Ok(Some(value.trim().to_owned())),
        Err(_) => Ok(None),
    }
}
