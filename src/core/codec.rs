//! Line-delimited message codec (component A).
//!
//! Reads a byte stream assumed UTF-8, split on `\n` into one JSON message per
//! line; writes emit one JSON text per line with a trailing `\n`. The codec
//! does not interpret envelope structure — that is the peer's job.

use crate::core::error::{McpError, McpResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// One line of input, already read and stripped of its trailing newline.
pub struct LineCodec<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> LineCodec<R, W>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Reads the next line. Returns `Ok(None)` on clean EOF (transport
    /// closed by the peer).
    pub async fn read_line(&mut self) -> McpResult<Option<String>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Writes one JSON value as a line, trailing with `\n`, and flushes.
    pub async fn write_value(&mut self, value: &serde_json::Value) -> McpResult<()> {
        let mut text = serde_json::to_string(value)?;
        text.push('\n');
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Parses one already-delimited line as JSON. A parse failure on a message
/// with a recoverable `id` should become a `Parse error` response upstream;
/// the codec itself only reports the failure.
pub fn parse_line(line: &str) -> McpResult<serde_json::Value> {
    serde_json::from_str(line).map_err(|e| McpError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn read_line_strips_trailing_newline() {
        let (client, mut server) = duplex(64);
        server.write_all(b"{\"a\":1}\n").await.unwrap();
        drop(server);
        let mut codec = LineCodec::new(client, tokio::io::sink());
        let line = codec.read_line().await.unwrap();
        assert_eq!(line, Some("{\"a\":1}".to_string()));
    }

    #[tokio::test]
    async fn read_line_returns_none_on_eof() {
        let (client, server) = duplex(64);
        drop(server);
        let mut codec = LineCodec::new(client, tokio::io::sink());
        assert_eq!(codec.read_line().await.unwrap(), None);
    }

    #[test]
    fn parse_line_surfaces_serialization_error_on_malformed_json() {
        let err = parse_line("not json").unwrap_err();
        assert_eq!(err.category(), "serialization");
    }
}
