use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of progress events a job producer can push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgressEvent {
    Heartbeat,
    StepStart { step: u32, message: String },
    StepEnd { step: u32, message: String },
    Complete { data: Value },
    Error { message: String },
    /// Well-formed frame whose `type` this consumer does not know.
    Unknown { kind: String },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }

    pub fn step_number(&self) -> Option<u32> {
        match self {
            ProgressEvent::StepStart { step, .. } | ProgressEvent::StepEnd { step, .. } => {
                Some(*step)
            }
            _ => None,
        }
    }
}

/// A decoded event plus the optional ordering/progress extras carried on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: ProgressEvent,
    /// Producer-assigned monotonic sequence number, when the producer sends one.
    pub seq: Option<u64>,
    /// Producer-computed percent (0..=100) for step events.
    pub progress: Option<u8>,
}

impl Frame {
    pub fn new(event: ProgressEvent) -> Self {
        Self {
            event,
            seq: None,
            progress: None,
        }
    }
}

impl From<ProgressEvent> for Frame {
    fn from(event: ProgressEvent) -> Self {
        Frame::new(event)
    }
}
