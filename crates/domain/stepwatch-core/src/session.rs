use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{Frame, ProgressEvent};
use crate::step::{Step, StepStatus};
use crate::tracker;
use crate::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Connecting,
    Monitoring,
    Complete,
    Error,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }

    /// `Connecting` and `Monitoring` may alternate; terminal phases are final.
    pub fn can_transition_to(self, next: Phase) -> bool {
        match (self, next) {
            (Phase::Complete | Phase::Error, _) => false,
            (Phase::Connecting | Phase::Monitoring, _) => true,
        }
    }
}

/// What applying a frame did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Step/percent/message state may have changed; session still running.
    Progress,
    /// Frame carried a `seq` at or below the last accepted one.
    Duplicate,
    /// Session already terminal; frame dropped.
    Ignored,
    Completed(Value),
    Failed(String),
}

/// Observable state of one monitored job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub job_id: JobId,
    pub steps: Vec<Step>,
    pub overall_message: String,
    pub progress_percent: u8,
    pub phase: Phase,
    /// Consecutive reopen attempt in flight; 0 while the connection is healthy.
    pub reconnect_attempt: u32,
    last_seq: Option<u64>,
}

impl Session {
    pub fn new(job_id: impl Into<JobId>, steps: Vec<Step>) -> Self {
        Self {
            job_id: job_id.into(),
            steps,
            overall_message: stepwatch_config::CONNECTING_MESSAGE.to_string(),
            progress_percent: 0,
            phase: Phase::Connecting,
            reconnect_attempt: 0,
            last_seq: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn is_reconnecting(&self) -> bool {
        !self.is_terminal() && self.reconnect_attempt > 0
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn step(&self, number: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.number == number)
    }

    /// Single line suitable for a status bar.
    pub fn status_line(&self) -> &str {
        if self.is_reconnecting() {
            stepwatch_config::RECONNECTING_MESSAGE
        } else {
            &self.overall_message
        }
    }

    fn transition(&mut self, next: Phase) -> bool {
        if !self.phase.can_transition_to(next) {
            return false;
        }
        self.phase = next;
        true
    }

    /// Enter `Connecting`; `attempt` is 0 for the first open.
    pub fn set_connecting(&mut self, attempt: u32) -> bool {
        if !self.transition(Phase::Connecting) {
            return false;
        }
        self.reconnect_attempt = attempt;
        true
    }

    pub fn set_monitoring(&mut self) -> bool {
        if !self.transition(Phase::Monitoring) {
            return false;
        }
        self.reconnect_attempt = 0;
        true
    }

    /// Move to `Error`, failing every step still in progress.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.transition(Phase::Error) {
            return false;
        }
        self.reconnect_attempt = 0;
        self.overall_message = message.into();
        for step in &mut self.steps {
            if step.status == StepStatus::InProgress {
                step.status = StepStatus::Error;
            }
        }
        true
    }

    /// Reduce one decoded frame into the session.
    pub fn apply(&mut self, frame: &Frame) -> Applied {
        if self.is_terminal() {
            return Applied::Ignored;
        }
        if let Some(seq) = frame.seq {
            if self.last_seq.is_some_and(|last| seq <= last) {
                return Applied::Duplicate;
            }
            self.last_seq = Some(seq);
        }

        let steps = std::mem::take(&mut self.steps);
        self.steps = tracker::reduce(steps, &frame.event);
        self.progress_percent =
            tracker::progress_percent(&self.steps, frame, self.progress_percent);
        if let Some(msg) = tracker::message(&frame.event) {
            self.overall_message = msg;
        }

        match &frame.event {
            ProgressEvent::Complete { data } => {
                self.transition(Phase::Complete);
                self.reconnect_attempt = 0;
                Applied::Completed(data.clone())
            }
            ProgressEvent::Error { message } => {
                self.fail(message.clone());
                Applied::Failed(message.clone())
            }
            _ => Applied::Progress,
        }
    }
}
