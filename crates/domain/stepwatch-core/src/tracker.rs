use crate::event::{Frame, ProgressEvent};
use crate::step::{Step, StepStatus};

/// Apply one event to the step list. The list never grows or shrinks.
pub fn reduce(mut steps: Vec<Step>, event: &ProgressEvent) -> Vec<Step> {
    match event {
        ProgressEvent::StepStart { step, message } => {
            set_step(&mut steps, *step, StepStatus::InProgress, message);
        }
        ProgressEvent::StepEnd { step, message } => {
            set_step(&mut steps, *step, StepStatus::Completed, message);
        }
        // The server is the source of truth: a terminal event does not
        // complete or fail steps on its own.
        ProgressEvent::Heartbeat
        | ProgressEvent::Unknown { .. }
        | ProgressEvent::Complete { .. }
        | ProgressEvent::Error { .. } => {}
    }
    steps
}

fn set_step(steps: &mut [Step], number: u32, status: StepStatus, message: &str) {
    if let Some(s) = steps.iter_mut().find(|s| s.number == number) {
        s.status = status;
        s.last_message = Some(message.to_string());
    }
}

/// Percent to display after `frame` has been reduced into `steps`.
///
/// Never lower than `current`; `Complete` forces 100.
pub fn progress_percent(steps: &[Step], frame: &Frame, current: u8) -> u8 {
    let current = current.min(100);
    match &frame.event {
        ProgressEvent::Complete { .. } => 100,
        ProgressEvent::StepStart { step, .. } | ProgressEvent::StepEnd { step, .. } => {
            if !steps.iter().any(|s| s.number == *step) {
                return current;
            }
            let next = frame.progress.unwrap_or_else(|| completed_percent(steps));
            next.min(100).max(current)
        }
        ProgressEvent::Heartbeat | ProgressEvent::Unknown { .. } | ProgressEvent::Error { .. } => {
            current
        }
    }
}

fn completed_percent(steps: &[Step]) -> u8 {
    if steps.is_empty() {
        return 0;
    }
    let done = steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .count();
    (done * 100 / steps.len()) as u8
}

/// Overall message for `event`; `None` keeps whatever is displayed.
pub fn message(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::StepStart { message, .. }
        | ProgressEvent::StepEnd { message, .. }
        | ProgressEvent::Error { message } => Some(message.clone()),
        ProgressEvent::Complete { .. } => Some(stepwatch_config::COMPLETE_MESSAGE.to_string()),
        ProgressEvent::Heartbeat | ProgressEvent::Unknown { .. } => None,
    }
}
