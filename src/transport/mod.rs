//! Byte-stream transports that feed a [`crate::core::peer::Peer`]'s read/write
//! loop. Streamable HTTP, WebSocket, and auth-wrapped transports are out of
//! scope; stdio (this process's own, or a spawned child's) covers every
//! supported deployment shape.

pub mod stdio;

pub use stdio::{ChildProcessTransport, StdioTransport};
