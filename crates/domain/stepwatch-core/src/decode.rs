use serde_json::{Map, Value};
use tracing::debug;

use crate::event::{Frame, ProgressEvent};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("`{kind}` frame has no positive integer `step` field")]
    InvalidStep { kind: String },
    #[error("field `{field}` has an unexpected type")]
    InvalidField { field: &'static str },
}

/// Decode one raw payload into a typed event, discarding wire extras.
pub fn decode(raw: &str) -> Result<ProgressEvent, DecodeError> {
    decode_frame(raw).map(|frame| frame.event)
}

/// Decode one raw payload (a single JSON object) into a [`Frame`].
///
/// Unrecognized `type` values decode to [`ProgressEvent::Unknown`] so newer
/// producers keep working against older consumers.
pub fn decode_frame(raw: &str) -> Result<Frame, DecodeError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;

    let event = match kind {
        "heartbeat" => ProgressEvent::Heartbeat,
        "step_start" => ProgressEvent::StepStart {
            step: step_field(obj, kind)?,
            message: message_field(obj)?,
        },
        "step_end" => ProgressEvent::StepEnd {
            step: step_field(obj, kind)?,
            message: message_field(obj)?,
        },
        "complete" => ProgressEvent::Complete {
            data: obj.get("data").cloned().unwrap_or(Value::Null),
        },
        "error" => ProgressEvent::Error {
            message: error_message(obj),
        },
        other => ProgressEvent::Unknown {
            kind: other.to_string(),
        },
    };

    // Extras are advisory: a malformed one is dropped, never the frame.
    let progress = match event {
        ProgressEvent::StepStart { .. } | ProgressEvent::StepEnd { .. } => progress_field(obj),
        _ => None,
    };
    Ok(Frame {
        event,
        seq: seq_field(obj),
        progress,
    })
}

fn step_field(obj: &Map<String, Value>, kind: &str) -> Result<u32, DecodeError> {
    obj.get("step")
        .and_then(Value::as_u64)
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| DecodeError::InvalidStep {
            kind: kind.to_string(),
        })
}

fn message_field(obj: &Map<String, Value>) -> Result<String, DecodeError> {
    match obj.get("message") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DecodeError::InvalidField { field: "message" }),
    }
}

/// A terminal `error` must never be lost to a badly typed `message`.
fn error_message(obj: &Map<String, Value>) -> String {
    match obj.get("message") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            debug!(message = %other, "error frame carries a non-string message");
            other.to_string()
        }
    }
}

fn seq_field(obj: &Map<String, Value>) -> Option<u64> {
    let raw = obj.get("seq").filter(|v| !v.is_null())?;
    let seq = raw.as_u64();
    if seq.is_none() {
        debug!(seq = %raw, "ignoring malformed seq");
    }
    seq
}

fn progress_field(obj: &Map<String, Value>) -> Option<u8> {
    let raw = obj.get("progress").filter(|v| !v.is_null())?;
    match raw.as_f64().filter(|p| p.is_finite()) {
        Some(pct) => Some(pct.clamp(0.0, 100.0).round() as u8),
        None => {
            debug!(progress = %raw, "ignoring malformed progress");
            None
        }
    }
}
