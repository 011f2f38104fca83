#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use stepwatch_monitor::{
    Backoff, MonitorConfig, MonitorFailure, ReconnectPolicy, Session, SessionCallbacks, StepDef,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn extract_classify() -> Vec<StepDef> {
    vec![StepDef::new(1, "Extract"), StepDef::new(2, "Classify")]
}

pub fn config(max_attempts: u32) -> MonitorConfig {
    MonitorConfig {
        reconnect: ReconnectPolicy {
            max_attempts,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff: Backoff::Linear,
        },
        idle_timeout: None,
    }
}

pub fn step_start(step: u32) -> String {
    format!(r#"{{"type":"step_start","step":{step},"message":"start {step}"}}"#)
}

pub fn step_end(step: u32, message: &str) -> String {
    format!(r#"{{"type":"step_end","step":{step},"message":"{message}"}}"#)
}

pub fn complete(data: &str) -> String {
    format!(r#"{{"type":"complete","message":"","data":{data}}}"#)
}

pub fn job_error(message: &str) -> String {
    format!(r#"{{"type":"error","message":"{message}"}}"#)
}

pub const HEARTBEAT: &str = r#"{"type":"heartbeat","message":""}"#;

/// Records every callback invocation for later assertions.
#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<Session>>>,
    pub completes: Arc<Mutex<Vec<Value>>>,
    pub errors: Arc<Mutex<Vec<MonitorFailure>>>,
}

impl Recorder {
    pub fn callbacks(&self) -> SessionCallbacks {
        let completes = self.completes.clone();
        let errors = self.errors.clone();
        let events = self.events.clone();
        SessionCallbacks::new(
            move |data| completes.lock().unwrap().push(data),
            move |failure| errors.lock().unwrap().push(failure),
        )
        .on_event(move |session| events.lock().unwrap().push(session.clone()))
    }

    pub fn completes(&self) -> Vec<Value> {
        self.completes.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<MonitorFailure> {
        self.errors.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Session> {
        self.events.lock().unwrap().clone()
    }
}
