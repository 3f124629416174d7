//! HTTP handshake
//!
//! Every inbound TCP connection starts as an HTTP/1.1 request. The request
//! head is read here through a `BufReader`, which is later handed to the
//! WebSocket layer as-is so no byte after the head is lost. A valid
//! WebSocket upgrade gets `101 Switching Protocols`; anything else gets the
//! plain-text status page.

use std::collections::HashMap;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tungstenite::handshake::derive_accept_key;

use crate::utils::{RelayError, Result};

/// Upper bound on the request line plus headers.
pub const MAX_HEAD_BYTES: usize = 8192;

/// Body served to every request that does not become a WebSocket.
pub const STATUS_BODY: &str = "P2P relay server running. Connect via WebSocket.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub version: String,
    /// Header names are lowercased; repeated headers are joined with ", ".
    pub headers: HashMap<String, String>,
}

impl RequestHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    fn header_has_token(&self, name: &str, token: &str) -> bool {
        self.header(name).is_some_and(|value| {
            value
                .split(',')
                .any(|t| t.trim().eq_ignore_ascii_case(token))
        })
    }

    /// Returns the client's `Sec-WebSocket-Key` if this is a valid
    /// WebSocket upgrade request, `None` otherwise.
    pub fn websocket_key(&self) -> Option<&str> {
        if self.method != "GET" || self.version != "HTTP/1.1" {
            return None;
        }
        if !self.header_has_token("upgrade", "websocket")
            || !self.header_has_token("connection", "upgrade")
            || self.header("sec-websocket-version") != Some("13")
        {
            return None;
        }
        self.header("sec-websocket-key")
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// True when the client asked for an upgrade at all, valid or not.
    pub fn wants_upgrade(&self) -> bool {
        self.header("upgrade").is_some()
    }
}

/// Reads an HTTP request line and headers, up to the blank line.
pub async fn read_request_head<R>(reader: &mut R, limit: usize) -> Result<RequestHead>
where
    R: AsyncBufRead + Unpin,
{
    let mut consumed = 0usize;
    let mut lines = Vec::new();

    loop {
        let remaining = limit.saturating_sub(consumed);
        if remaining == 0 {
            return Err(RelayError::HeadTooLarge(limit));
        }

        let mut line = String::new();
        let n = (&mut *reader)
            .take(remaining as u64)
            .read_line(&mut line)
            .await?;
        if n == 0 {
            return Err(RelayError::MalformedRequest(
                "connection closed before end of headers".to_string(),
            ));
        }
        consumed += n;

        if !line.ends_with('\n') {
            // the take() limit cut the line short
            return Err(RelayError::HeadTooLarge(limit));
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            if lines.is_empty() {
                // tolerate leading blank lines before the request line
                continue;
            }
            break;
        }
        lines.push(line.to_string());
    }

    parse_head(&lines)
}

fn parse_head(lines: &[String]) -> Result<RequestHead> {
    let (request_line, header_lines) = lines
        .split_first()
        .ok_or_else(|| RelayError::MalformedRequest("empty request".to_string()))?;

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(RelayError::MalformedRequest(format!(
            "bad request line: {}",
            request_line.chars().take(100).collect::<String>()
        )));
    };

    let mut headers: HashMap<String, String> = HashMap::new();
    for line in header_lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(RelayError::MalformedRequest(format!(
                "bad header line: {}",
                line.chars().take(100).collect::<String>()
            )));
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    Ok(RequestHead {
        method: method.to_string(),
        path: path.to_string(),
        version: version.to_string(),
        headers,
    })
}

/// Completes the server side of the WebSocket handshake.
pub async fn write_switching_protocols<W>(writer: &mut W, key: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let accept = derive_accept_key(key.as_bytes());
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Writes the plain-text status page and closes the write side.
/// `HEAD` requests get the headers only.
pub async fn write_status_response<W>(writer: &mut W, head_only: bool) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n",
        STATUS_BODY.len()
    );
    if !head_only {
        response.push_str(STATUS_BODY);
    }
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}
