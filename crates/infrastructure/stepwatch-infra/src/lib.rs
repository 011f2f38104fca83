pub mod http;
pub mod memory;
pub mod sse;
pub mod transport;

// Re-exports for convenience
pub use http::{default_http_client, sse_frames, Endpoint, SseTransport};
pub use memory::{Ending, MemoryTransport, ScriptedOpen};
pub use sse::{SseMessage, SseParser};
pub use transport::{FrameStream, Transport, TransportError};
