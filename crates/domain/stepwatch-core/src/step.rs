use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

/// Caller-declared step: a fixed number and a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDef {
    pub number: u32,
    pub name: String,
}

impl StepDef {
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub number: u32,
    pub name: String,
    pub status: StepStatus,
    pub last_message: Option<String>,
}

impl Step {
    pub fn pending(def: &StepDef) -> Self {
        Self {
            number: def.number,
            name: def.name.clone(),
            status: StepStatus::Pending,
            last_message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("step numbers start at 1 (got 0 for {name:?})")]
    ZeroNumber { name: String },
    #[error("step number {number} is declared more than once")]
    Duplicate { number: u32 },
}

/// Build the fixed, ordered step list for a new session.
pub fn declare_steps(defs: &[StepDef]) -> Result<Vec<Step>, StepError> {
    let mut seen = HashSet::new();
    defs.iter()
        .map(|def| {
            if def.number == 0 {
                return Err(StepError::ZeroNumber {
                    name: def.name.clone(),
                });
            }
            if !seen.insert(def.number) {
                return Err(StepError::Duplicate { number: def.number });
            }
            Ok(Step::pending(def))
        })
        .collect()
}
