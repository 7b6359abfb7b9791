use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Local top-of-hour time the run was scheduled for.
    pub tick: NaiveDateTime,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, tick: NaiveDateTime) -> Self {
        Self {
            cancellation_token,
            tick,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
