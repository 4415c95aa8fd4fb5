//! HTTP replies.

use std::fs::File;
use std::io::{Cursor, Read};
use std::panic::{AssertUnwindSafe, catch_unwind};

use tiny_http::{Header, Response, StatusCode};

use super::Shared;
use crate::log;
use crate::utils::mime::types::{HTML, PLAIN};

/// Response payload.
#[derive(Debug)]
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    /// Streamed from disk.
    File(File, usize),
}

/// A fully decided response, independent of the socket layer.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Body,
}

impl Reply {
    pub fn bytes(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![
                ("Content-Type", content_type.to_string()),
                ("Content-Length", body.len().to_string()),
            ],
            body: Body::Bytes(body),
        }
    }

    pub fn file(content_type: &str, file: File, len: usize) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("Content-Type", content_type.to_string()),
                ("Content-Length", len.to_string()),
            ],
            body: Body::File(file, len),
        }
    }

    pub fn plain(body: impl Into<String>) -> Self {
        Self::bytes(200, PLAIN, body.into().into_bytes())
    }

    /// 302 Found to an already-quoted location.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 302,
            headers: vec![("Location", location.into())],
            body: Body::Empty,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn read_body(self) -> std::io::Result<Vec<u8>> {
        match self.body {
            Body::Empty => Ok(Vec::new()),
            Body::Bytes(bytes) => Ok(bytes),
            Body::File(mut file, len) => {
                let mut buf = Vec::with_capacity(len);
                file.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

/// Error page for `status`: the custom hook's body, or the status line.
pub fn error_reply(shared: &Shared, status: u16) -> Reply {
    let message = match status {
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        _ => "Error",
    };

    let handler = shared.error_handler.read().clone();
    let custom = match catch_unwind(AssertUnwindSafe(|| handler(status))) {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => {
            log!("error"; "failed to render an error page: {:#}", e);
            None
        }
        Err(_) => {
            log!("error"; "error page hook panicked for {}", status);
            None
        }
    };

    let body = custom.unwrap_or_else(|| message.as_bytes().to_vec());
    Reply::bytes(status, HTML, body)
}

/// Convert to a `tiny_http` response.
///
/// `Content-Length` travels as the data length; `tiny_http` writes the header.
pub fn into_response(reply: Reply) -> Response<Box<dyn Read + Send>> {
    let headers = reply
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("Content-Length"))
        .filter_map(|(name, value)| Header::from_bytes(name.as_bytes(), value.as_bytes()).ok())
        .collect();

    let (reader, len): (Box<dyn Read + Send>, usize) = match reply.body {
        Body::Empty => (Box::new(std::io::empty()), 0),
        Body::Bytes(bytes) => {
            let len = bytes.len();
            (Box::new(Cursor::new(bytes)), len)
        }
        Body::File(file, len) => (Box::new(file), len),
    };

    Response::new(StatusCode(reply.status), headers, reader, Some(len), None)
}
