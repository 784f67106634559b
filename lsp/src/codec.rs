//! `Content-Length` framing for JSON-RPC over the child's standard streams.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single message body. The Epsilon server's messages are
/// small; anything near this size indicates a broken peer.
const MAX_MESSAGE_BYTES: usize = 8 * 1024 * 1024;

/// Reads framed JSON-RPC messages from the server's stdout.
pub struct MessageReader<R> {
    input: BufReader<R>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: BufReader::new(input),
        }
    }

    /// Read the next message. `Ok(None)` means the stream ended cleanly at
    /// a message boundary; EOF anywhere inside a message is an error.
    pub async fn read_message(&mut self) -> Result<Option<serde_json::Value>> {
        let Some(length) = self.read_content_length().await? else {
            return Ok(None);
        };
        if length > MAX_MESSAGE_BYTES {
            bail!("message of {length} bytes exceeds limit of {MAX_MESSAGE_BYTES}");
        }

        let mut body = vec![0u8; length];
        self.input
            .read_exact(&mut body)
            .await
            .context("reading message body")?;
        serde_json::from_slice(&body)
            .context("decoding message body")
            .map(Some)
    }

    /// Consume header lines up to the blank separator and return the
    /// `Content-Length` value, or `None` on EOF before any header byte.
    async fn read_content_length(&mut self) -> Result<Option<usize>> {
        let mut length = None;
        let mut line = String::new();
        let mut mid_message = false;

        loop {
            line.clear();
            if self.input.read_line(&mut line).await.context("reading header")? == 0 {
                if mid_message {
                    bail!("stream ended inside message headers");
                }
                return Ok(None);
            }
            mid_message = true;

            let header = line.trim_ascii();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':')
                && name.trim_ascii().eq_ignore_ascii_case("Content-Length")
            {
                length = Some(
                    value
                        .trim_ascii()
                        .parse()
                        .context("malformed Content-Length header")?,
                );
            }
            // Content-Type and anything else is ignored.
        }

        match length {
            Some(length) => Ok(Some(length)),
            None => bail!("message headers lack Content-Length"),
        }
    }
}

/// Writes framed JSON-RPC messages to the server's stdin.
pub struct MessageWriter<W> {
    output: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub async fn write_message(&mut self, message: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec(message).context("encoding message")?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.output
            .write_all(header.as_bytes())
            .await
            .context("writing message header")?;
        self.output
            .write_all(&body)
            .await
            .context("writing message body")?;
        self.output.flush().await.context("flushing message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_and_reads_back() {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "initialized",
            "params": {}
        });

        let mut buffer = Vec::new();
        MessageWriter::new(&mut buffer)
            .write_message(&message)
            .await
            .unwrap();

        let mut reader = MessageReader::new(buffer.as_slice());
        assert_eq!(reader.read_message().await.unwrap().unwrap(), message);
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn content_length_counts_bytes_of_multibyte_text() {
        let message = serde_json::json!({"msg": "héllo"});
        let mut buffer = Vec::new();
        MessageWriter::new(&mut buffer)
            .write_message(&message)
            .await
            .unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        let body = serde_json::to_string(&message).unwrap();
        assert!(text.starts_with(&format!("Content-Length: {}\r\n\r\n", body.len())));

        let mut reader = MessageReader::new(buffer.as_slice());
        assert_eq!(reader.read_message().await.unwrap().unwrap(), message);
    }

    #[tokio::test]
    async fn empty_stream_is_clean_eof() {
        let mut reader = MessageReader::new(&b""[..]);
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_inside_headers_is_an_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 10\r\n"[..]);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn eof_inside_body_is_an_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 50\r\n\r\n{\"tru"[..]);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn missing_content_length_is_an_error() {
        let mut reader = MessageReader::new(&b"Content-Type: application/json\r\n\r\n{}"[..]);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn header_name_is_case_insensitive_and_extras_ignored() {
        let body = r#"{"id":7}"#;
        let framed = format!(
            "Content-Type: application/vscode-jsonrpc\r\ncontent-length: {}\r\n\r\n{body}",
            body.len()
        );
        let mut reader = MessageReader::new(framed.as_bytes());
        assert_eq!(reader.read_message().await.unwrap().unwrap()["id"], 7);
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let framed = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_BYTES + 1);
        let mut reader = MessageReader::new(framed.as_bytes());
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn garbage_body_is_an_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 4\r\n\r\n~~~~"[..]);
        assert!(reader.read_message().await.is_err());
    }
}
