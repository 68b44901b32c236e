use std::time::Duration;

/// Runner tuning. A query whose elapsed time exceeds the threshold is
/// reported to the slow-query sink after it completes; it is never aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunnerConfig {
    pub slow_query_threshold: Option<Duration>,
}

impl RunnerConfig {
    #[must_use]
    pub fn with_slow_query_threshold(threshold: Duration) -> Self {
        Self {
            slow_query_threshold: Some(threshold),
        }
    }
}
