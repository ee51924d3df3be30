//! Minimal HTTP/1.1 `GET` over a unix domain socket.
//!
//! The Docker daemon's default endpoint is a local socket, which the HTTP
//! client does not dial. Each request opens a fresh connection with
//! `Connection: close`, so the response ends at EOF.

use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::error::TransportError;

use super::USER_AGENT;

/// A parsed HTTP response.
#[derive(Debug)]
pub(super) struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends `GET {path}` to the daemon listening on `socket`.
pub(super) async fn get(socket: &Path, path: &str) -> Result<Response, TransportError> {
    let mut stream = UnixStream::connect(socket).await?;

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: docker\r\n\
         User-Agent: {USER_AGENT}\r\n\
         Accept: application/json\r\n\
         Connection: close\r\n\
         \r\n"
    );

    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let mut data = Vec::new();
    stream.read_to_end(&mut data).await?;

    parse_response(&data)
}

fn parse_response(data: &[u8]) -> Result<Response, TransportError> {
    let head_end = find(data, b"\r\n\r\n")
        .ok_or_else(|| TransportError::Response("missing end of headers".to_string()))?;
    let head = std::str::from_utf8(&data[..head_end])
        .map_err(|e| TransportError::Response(format!("headers are not UTF-8: {e}")))?;
    let raw_body = &data[head_end + 4..];

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let Some(status) = status_line
        .split(' ')
        .nth(1)
        .and_then(|code| code.parse().ok())
    else {
        let message = format!("invalid status line {status_line:?}");
        return Err(TransportError::Response(message));
    };

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let mut response = Response {
        status,
        headers,
        body: Vec::new(),
    };

    let chunked = response
        .header("transfer-encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
    let content_length = response
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok());

    response.body = if chunked {
        decode_chunked(raw_body)?
    } else if let Some(len) = content_length {
        raw_body
            .get(..len)
            .ok_or_else(|| TransportError::Response("truncated body".to_string()))?
            .to_vec()
    } else {
        raw_body.to_vec()
    };

    Ok(response)
}

fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();

    loop {
        let line_end = find(data, b"\r\n")
            .ok_or_else(|| TransportError::Response("missing chunk size".to_string()))?;
        let size_line = std::str::from_utf8(&data[..line_end])
            .map_err(|e| TransportError::Response(format!("chunk size is not UTF-8: {e}")))?;
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| TransportError::Response(format!("invalid chunk size {size_hex:?}")))?;
        data = &data[line_end + 2..];

        if size == 0 {
            return Ok(body);
        }

        let chunk = data
            .get(..size)
            .ok_or_else(|| TransportError::Response("truncated chunk".to_string()))?;
        body.extend_from_slice(chunk);
        data = data[size..]
            .strip_prefix(b"\r\n")
            .ok_or_else(|| TransportError::Response("missing chunk terminator".to_string()))?;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
