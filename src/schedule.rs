use std::time::Duration;

/// Wait table used between attempts, in milliseconds.
pub const STANDARD_DELAYS_MS: [u64; 6] = [0, 250, 500, 1_000, 2_500, 5_000];

/// Ordered table of waits, indexed by attempt number.
///
/// Entry `0` belongs to the first attempt and is never waited on. A schedule
/// with `n` entries supports at most `n - 1` retries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DelaySchedule {
    delays: Vec<Duration>,
}

impl DelaySchedule {
    /// The standard `0, 250ms, 500ms, 1s, 2.5s, 5s` table.
    pub fn standard() -> Self {
        Self::from_millis(STANDARD_DELAYS_MS)
    }

    /// Builds a schedule from millisecond values.
    pub fn from_millis(delays_ms: impl IntoIterator<Item = u64>) -> Self {
        Self {
            delays: delays_ms.into_iter().map(Duration::from_millis).collect(),
        }
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Largest `max_retries` this schedule can serve.
    pub fn max_supported_retries(&self) -> Option<usize> {
        self.delays.len().checked_sub(1)
    }

    /// Whether `max_retries + 1` attempts fit in the table.
    pub fn supports(&self, max_retries: usize) -> bool {
        max_retries < self.delays.len()
    }

    /// Wait before attempt `attempt`; zero outside the table.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        self.delays.get(attempt).copied().unwrap_or_default()
    }

    /// Sum of the waits incurred by `max_retries` retries.
    pub fn total_wait(&self, max_retries: usize) -> Duration {
        (1..=max_retries).map(|attempt| self.delay_for(attempt)).sum()
    }
}

impl Default for DelaySchedule {
    fn default() -> Self {
        Self::standard()
    }
}

/// Round-robin position over an ordered, non-empty region list.
#[derive(Debug)]
pub struct RegionCursor<'a> {
    regions: &'a [String],
    index: usize,
}

impl<'a> RegionCursor<'a> {
    /// Returns `None` for an empty list.
    pub fn new(regions: &'a [String]) -> Option<Self> {
        (!regions.is_empty()).then_some(Self { regions, index: 0 })
    }

    /// Returns the current region and moves to the next one, wrapping.
    pub fn advance(&mut self) -> &'a str {
        let region = &self.regions[self.index];
        self.index = (self.index + 1) % self.regions.len();
        region
    }
}
