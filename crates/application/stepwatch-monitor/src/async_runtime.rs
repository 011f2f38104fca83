use anyhow::Result;
use std::sync::OnceLock;

// Backs sessions started from threads that are not inside a tokio runtime.
static RUNTIME: OnceLock<std::result::Result<tokio::runtime::Runtime, String>> = OnceLock::new();

fn build() -> std::result::Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("stepwatch-monitor")
        .enable_all()
        .build()
        .map_err(|e| e.to_string())
}

/// Handle of the ambient runtime, or of the lazily built shared one.
pub(crate) fn handle() -> Result<tokio::runtime::Handle> {
    if let Ok(current) = tokio::runtime::Handle::try_current() {
        return Ok(current);
    }
    match RUNTIME.get_or_init(build) {
        Ok(rt) => Ok(rt.handle().clone()),
        Err(message) => Err(anyhow::anyhow!(message.clone())),
    }
}
