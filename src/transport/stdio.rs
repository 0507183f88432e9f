//! Byte-stream sources a `Peer` can run over.
//!
//! `Peer::run` only needs an `AsyncRead` half and an `AsyncWrite` half —
//! everything else (framing, request correlation, dispatch) already lives on
//! `Peer` itself. This module just names the two ways this crate obtains
//! those halves: this process's own stdio, or a spawned child's pipes.

use std::process::Stdio;

use tokio::io::{Stdin, Stdout};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::core::error::{McpError, McpResult};

/// This process's own stdin/stdout, the shape a server launched as a
/// subprocess by its client runs over.
pub struct StdioTransport {
    pub reader: Stdin,
    pub writer: Stdout,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::stdin(),
            writer: tokio::io::stdout(),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// A spawned child process, the shape a client connecting to a server it
/// launches itself runs over. The child is killed when this is dropped.
pub struct ChildProcessTransport {
    child: Child,
    pub reader: ChildStdout,
    pub writer: ChildStdin,
}

impl ChildProcessTransport {
    pub fn spawn(command: &str, args: &[&str]) -> McpResult<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| McpError::TransportClosed(format!("failed to spawn {command}: {e}")))?;

        let writer = child
            .stdin
            .take()
            .ok_or_else(|| McpError::TransportClosed("child stdin unavailable".to_string()))?;
        let reader = child
            .stdout
            .take()
            .ok_or_else(|| McpError::TransportClosed("child stdout unavailable".to_string()))?;

        Ok(Self { child, reader, writer })
    }

    pub async fn wait(&mut self) -> McpResult<std::process::ExitStatus> {
        self.child.wait().await.map_err(McpError::from)
    }
}

impl Drop for ChildProcessTransport {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}
