use stepwatch_core::StepError;

/// Why a monitored session ended without success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorFailure {
    /// The producer reported the job itself failed. Not retryable.
    #[error("job failed: {message}")]
    Job { message: String },
    /// The transport could not be re-established within the reconnection budget.
    #[error("connection lost after {attempts} reconnect attempts")]
    ConnectionExhausted { attempts: u32 },
}

impl MonitorFailure {
    pub const JOB_FAILED: &'static str = "job-failed";
    pub const CONNECTION_EXHAUSTED: &'static str = "connection-exhausted";

    /// Stable machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            MonitorFailure::Job { .. } => Self::JOB_FAILED,
            MonitorFailure::ConnectionExhausted { .. } => Self::CONNECTION_EXHAUSTED,
        }
    }

    /// Text for the user: the producer's message, or the connection-lost notice.
    pub fn user_message(&self) -> &str {
        match self {
            MonitorFailure::Job { message } => message,
            MonitorFailure::ConnectionExhausted { .. } => stepwatch_config::EXHAUSTED_MESSAGE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("job id must not be empty")]
    EmptyJobId,
    #[error("invalid step declaration: {0}")]
    Steps(#[from] StepError),
    #[error("no async runtime available: {0}")]
    Runtime(String),
}
