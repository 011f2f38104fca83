pub mod decode;
pub mod event;
pub mod session;
pub mod step;
pub mod tracker;

pub use decode::{decode, decode_frame, DecodeError};
pub use event::{Frame, ProgressEvent};
pub use session::{Applied, Phase, Session};
pub use step::{declare_steps, Step, StepDef, StepError, StepStatus};
pub use tracker::{message, progress_percent, reduce};

/// Identifier of the server-side job being observed.
pub type JobId = String;
