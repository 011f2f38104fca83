//! Scripted in-memory transport for driving a monitor without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, StreamExt};

use crate::transport::{FrameStream, Transport, TransportError};

/// How a scripted connection behaves after its frames are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ending {
    /// Stream ends cleanly (server closed the response).
    Close,
    /// Stream yields an error.
    Fail(String),
    /// Stream stays open and silent forever.
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOpen {
    Refuse(String),
    Connect { frames: Vec<String>, ending: Ending },
}

impl ScriptedOpen {
    pub fn connect<I, S>(frames: I, ending: Ending) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedOpen::Connect {
            frames: frames.into_iter().map(Into::into).collect(),
            ending,
        }
    }
}

/// Each `open` consumes the next scripted connection; once the script runs
/// out every further open is refused.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    script: Arc<Mutex<VecDeque<ScriptedOpen>>>,
    opens: Arc<AtomicUsize>,
}

impl MemoryTransport {
    pub fn new(script: impl IntoIterator<Item = ScriptedOpen>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Transport whose every open is refused.
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn push(&self, open: ScriptedOpen) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(open);
    }

    /// Number of `open` calls so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, _job_id: &str) -> Result<FrameStream, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            None => Err(TransportError::Refused("script exhausted".into())),
            Some(ScriptedOpen::Refuse(reason)) => Err(TransportError::Refused(reason)),
            Some(ScriptedOpen::Connect { frames, ending }) => {
                let head = stream::iter(frames.into_iter().map(Ok::<String, TransportError>));
                let tail: FrameStream = match ending {
                    Ending::Close => stream::empty().boxed(),
                    Ending::Fail(reason) => {
                        stream::once(async move { Err(TransportError::Interrupted(reason)) })
                            .boxed()
                    }
                    Ending::Hang => stream::pending().boxed(),
                };
                Ok(head.chain(tail).boxed())
            }
        }
    }
}
