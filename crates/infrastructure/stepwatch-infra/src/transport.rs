use futures::stream::BoxStream;

/// Text frames pushed by the server; the stream ending means the connection dropped.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered with status {status}")]
    Status { status: u16 },
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("stream interrupted: {0}")]
    Interrupted(String),
}

impl TransportError {
    /// Short discriminator for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::InvalidEndpoint(_) => "invalid-endpoint",
            TransportError::Request(e) if e.is_connect() => "connect",
            TransportError::Request(e) if e.is_timeout() => "timeout",
            TransportError::Request(_) => "request",
            TransportError::Status { .. } => "status",
            TransportError::Refused(_) => "refused",
            TransportError::Interrupted(_) => "interrupted",
        }
    }
}

/// Opens the server-push channel for one job.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, job_id: &str) -> Result<FrameStream, TransportError>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn open(&self, job_id: &str) -> Result<FrameStream, TransportError> {
        (**self).open(job_id).await
    }
}
