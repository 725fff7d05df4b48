//! LSP transport layer - Content-Length framed JSON-RPC over stdio.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Transport error types.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid Content-Length header: {0}")]
    InvalidLength(String),

    #[error("Stream closed in the middle of a message")]
    UnexpectedEof,
}

/// The routing fields of a JSON-RPC message.
#[derive(Debug, Default, Deserialize)]
pub struct MessageInfo {
    /// Request or response id.
    pub id: Option<JsonValue>,
    /// Method name for requests and notifications.
    pub method: Option<String>,
}

impl MessageInfo {
    /// Extracts id and method from a message body.
    ///
    /// Returns `None` if the body is not a JSON object.
    #[must_use]
    pub fn inspect(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// Returns whether this is a notification with the given method.
    #[must_use]
    pub fn is_notification(&self, method: &str) -> bool {
        self.id.is_none() && self.method.as_deref() == Some(method)
    }
}

/// Reads one framed message body.
///
/// Lines before the header block that are not headers (log output some
/// servers print to stdout) are skipped, as are headers other than
/// Content-Length. Returns `Ok(None)` on end of stream between messages.
///
/// # Errors
/// Returns error on I/O failure, a malformed length, or a truncated body.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return match content_length {
                Some(_) => Err(TransportError::UnexpectedEof),
                None => Ok(None),
            };
        }

        let header = line.trim();
        if header.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }

        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let value = value.trim();
                let length = value
                    .parse()
                    .map_err(|_| TransportError::InvalidLength(value.to_string()))?;
                content_length = Some(length);
            }
        }
    }

    let length = content_length.unwrap_or_default();
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::UnexpectedEof
        } else {
            TransportError::Io(e)
        }
    })?;

    Ok(Some(body))
}

/// Writes one framed message body and flushes.
///
/// # Errors
/// Returns error if the writer fails.
pub async fn write_message<W>(writer: &mut W, body: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}
