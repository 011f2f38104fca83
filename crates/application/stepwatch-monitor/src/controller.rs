use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stepwatch_config::EXHAUSTED_MESSAGE;
use stepwatch_core::{declare_steps, decode_frame, Applied, JobId, Phase, Session, StepDef};
use stepwatch_infra::{FrameStream, SseTransport, Transport, TransportError};

use crate::connection::{ConnectionManager, ReconnectDecision};
use crate::failure::{MonitorFailure, StartError};
use crate::handle::{SessionHandle, Shared};
use crate::policy::MonitorConfig;

type EventFn = Box<dyn FnMut(&Session) + Send>;
type CompleteFn = Box<dyn FnOnce(Value) + Send>;
type ErrorFn = Box<dyn FnOnce(MonitorFailure) + Send>;

/// Caller-supplied observers for one session.
///
/// `on_complete` and `on_error` are one-shot; at most one of them ever runs.
pub struct SessionCallbacks {
    on_event: Option<EventFn>,
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
}

impl SessionCallbacks {
    pub fn new(
        on_complete: impl FnOnce(Value) + Send + 'static,
        on_error: impl FnOnce(MonitorFailure) + Send + 'static,
    ) -> Self {
        Self {
            on_event: None,
            on_complete: Some(Box::new(on_complete)),
            on_error: Some(Box::new(on_error)),
        }
    }

    /// Observe every processed frame and connection phase change.
    pub fn on_event(mut self, f: impl FnMut(&Session) + Send + 'static) -> Self {
        self.on_event = Some(Box::new(f));
        self
    }
}

/// Entry point: starts independent, isolated monitoring sessions over one transport.
pub struct ProgressMonitor<T> {
    transport: Arc<T>,
    config: MonitorConfig,
}

impl ProgressMonitor<SseTransport> {
    /// Monitor over HTTP Server-Sent Events at `endpoint` (a `{job_id}` URL template).
    pub fn http(endpoint: &str, config: MonitorConfig) -> Result<Self, TransportError> {
        let client = stepwatch_infra::default_http_client()?;
        let endpoint = stepwatch_infra::Endpoint::parse(endpoint)?;
        Ok(Self::new(SseTransport::new(client, endpoint), config))
    }
}

impl<T: Transport> ProgressMonitor<T> {
    pub fn new(transport: T, config: MonitorConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Begin monitoring `job_id`. Returns immediately; the session runs on
    /// the ambient tokio runtime, or on a shared background runtime when
    /// called from outside one.
    pub fn start(
        &self,
        job_id: impl Into<JobId>,
        steps: &[StepDef],
        callbacks: SessionCallbacks,
    ) -> Result<SessionHandle, StartError> {
        let job_id = job_id.into();
        if job_id.trim().is_empty() {
            return Err(StartError::EmptyJobId);
        }
        let steps = declare_steps(steps)?;
        let runtime =
            crate::async_runtime::handle().map_err(|e| StartError::Runtime(e.to_string()))?;

        let id = Uuid::new_v4();
        let session = Session::new(job_id, steps);
        let shared = Arc::new(Shared::new(session.clone()));
        let cancel = CancellationToken::new();

        let driver = SessionDriver {
            id,
            transport: self.transport.clone(),
            idle_timeout: self.config.idle_timeout,
            conn: ConnectionManager::new(self.config.reconnect.clone()),
            session,
            shared: shared.clone(),
            callbacks,
            cancel: cancel.clone(),
        };

        info!(session = %id, job_id = %driver.session.job_id, "starting progress monitor");
        let task = runtime.spawn(driver.run());
        Ok(SessionHandle::new(id, shared, cancel, task))
    }
}

enum Read {
    Frame(String),
    Failed(TransportError),
    Ended,
    Idle,
}

async fn next_frame(frames: &mut FrameStream, idle: Option<Duration>) -> Read {
    let next = match idle {
        Some(limit) => match tokio::time::timeout(limit, frames.next()).await {
            Ok(next) => next,
            Err(_) => return Read::Idle,
        },
        None => frames.next().await,
    };
    match next {
        Some(Ok(raw)) => Read::Frame(raw),
        Some(Err(e)) => Read::Failed(e),
        None => Read::Ended,
    }
}

/// Owns the session value and the transport for one `start()` call.
struct SessionDriver<T> {
    id: Uuid,
    transport: Arc<T>,
    idle_timeout: Option<Duration>,
    conn: ConnectionManager,
    session: Session,
    shared: Arc<Shared>,
    callbacks: SessionCallbacks,
    cancel: CancellationToken,
}

impl<T: Transport> SessionDriver<T> {
    async fn run(mut self) -> Session {
        let cancel = self.cancel.clone();
        let job_id = self.session.job_id.clone();

        'session: while self.conn.begin_open() {
            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'session,
                res = self.transport.open(&job_id) => res,
            };

            let loss = match opened {
                Ok(mut frames) => {
                    self.conn.opened();
                    info!(session = %self.id, job_id = %job_id, "event stream open");
                    if self.session.set_monitoring() {
                        self.publish();
                    }

                    loop {
                        let read = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break 'session,
                            read = next_frame(&mut frames, self.idle_timeout) => read,
                        };
                        match read {
                            Read::Frame(raw) => {
                                if self.handle_frame(&raw) {
                                    break 'session;
                                }
                            }
                            Read::Failed(e) => {
                                debug!(session = %self.id, kind = e.kind(), "event stream failed");
                                break e.to_string();
                            }
                            Read::Ended => break "stream closed by server".to_string(),
                            Read::Idle => break "no data within idle timeout".to_string(),
                        }
                    }
                }
                Err(e) => {
                    debug!(session = %self.id, kind = e.kind(), "event stream did not open");
                    e.to_string()
                }
            };

            match self.conn.lost() {
                ReconnectDecision::Retry { attempt, delay } => {
                    warn!(
                        session = %self.id,
                        job_id = %job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %loss,
                        "event stream lost, reconnecting"
                    );
                    if self.session.set_connecting(attempt) {
                        self.publish();
                    }
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break 'session,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                ReconnectDecision::Exhausted { attempts } => {
                    warn!(
                        session = %self.id,
                        job_id = %job_id,
                        attempts,
                        reason = %loss,
                        "reconnection budget exhausted"
                    );
                    if self.session.fail(EXHAUSTED_MESSAGE) {
                        self.publish();
                        self.dispatch_error(MonitorFailure::ConnectionExhausted { attempts });
                    }
                    break 'session;
                }
                ReconnectDecision::Suppressed => break 'session,
            }
        }

        self.conn.close();
        self.shared.store(&self.session);
        debug!(session = %self.id, phase = ?self.session.phase, "session closed");
        self.session
    }

    /// Returns true once the session reached a terminal state.
    fn handle_frame(&mut self, raw: &str) -> bool {
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session = %self.id, error = %e, "dropping undecodable frame");
                return false;
            }
        };
        self.conn.liveness();

        match self.session.apply(&frame) {
            Applied::Progress => {
                debug!(session = %self.id, event = ?frame.event, "progress");
                self.publish();
                false
            }
            Applied::Duplicate => {
                debug!(session = %self.id, seq = ?frame.seq, "dropping replayed frame");
                false
            }
            Applied::Ignored => true,
            Applied::Completed(data) => {
                self.conn.mark_terminal();
                info!(session = %self.id, job_id = %self.session.job_id, "job complete");
                self.publish();
                self.dispatch_complete(data);
                true
            }
            Applied::Failed(message) => {
                self.conn.mark_terminal();
                info!(session = %self.id, job_id = %self.session.job_id, error = %message, "job failed");
                self.publish();
                self.dispatch_error(MonitorFailure::Job { message });
                true
            }
        }
    }

    fn publish(&mut self) {
        self.shared.store(&self.session);
        if let Some(on_event) = self.callbacks.on_event.as_mut() {
            let session = &self.session;
            self.shared.deliver(|| on_event(session));
        }
    }

    fn dispatch_complete(&mut self, data: Value) {
        if self.session.phase != Phase::Complete {
            return;
        }
        self.callbacks.on_error = None;
        if let Some(on_complete) = self.callbacks.on_complete.take() {
            self.shared.deliver(move || on_complete(data));
        }
    }

    fn dispatch_error(&mut self, failure: MonitorFailure) {
        if self.session.phase != Phase::Error {
            return;
        }
        self.callbacks.on_complete = None;
        if let Some(on_error) = self.callbacks.on_error.take() {
            self.shared.deliver(move || on_error(failure));
        }
    }
}
