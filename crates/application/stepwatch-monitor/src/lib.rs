mod async_runtime;
pub mod connection;
pub mod controller;
pub mod failure;
pub mod handle;
pub mod policy;

pub use connection::{ConnectionManager, ConnectionState, ReconnectDecision};
pub use controller::{ProgressMonitor, SessionCallbacks};
pub use failure::{MonitorFailure, StartError};
pub use handle::SessionHandle;
pub use policy::{Backoff, MonitorConfig, ReconnectPolicy};

// Re-export the model types callers need to observe a session
pub use stepwatch_core::{JobId, Phase, Session, Step, StepDef, StepStatus};
