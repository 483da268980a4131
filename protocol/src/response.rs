//! Response assembly and (for clients and tests) parsing.

use std::fmt;

use serde::Serialize;

use crate::error::ProtocolError;
use crate::headers::HeaderMap;
use crate::request::{parse_header_lines, split_head};

/// Body sent whenever the auth gate rejects a request.
pub const UNAUTHORIZED_BODY: &str = "<h1>401 Unauthorized</h1><p>You must log in to access this page.</p><a href=\"/login.html\">Login</a>";

const INTERNAL_ERROR_BODY: &str = r#"{"error": "Internal Server Error"}"#;
const NOT_FOUND_BODY: &str = "<h1>404 Not Found</h1>";

/// Numeric status code with its canonical reason phrase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: Self = Self(200);
    pub const BAD_REQUEST: Self = Self(400);
    pub const UNAUTHORIZED: Self = Self(401);
    pub const NOT_FOUND: Self = Self(404);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);

    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self.0 {
            200 => "OK",
            400 => "Bad Request",
            401 => "Unauthorized",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: status.reason().to_string(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.headers.insert("Content-Type", content_type);
        self.body = body.into();
        self
    }

    /// JSON response; falls back to a 500 when `value` cannot be encoded.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status).with_body("application/json", body),
            Err(err) => {
                log::error!("failed to encode response body: {}", err);
                Self::internal_error()
            }
        }
    }

    #[must_use]
    pub fn html(status: StatusCode, body: &str) -> Self {
        Self::new(status).with_body("text/html", body.as_bytes())
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::html(StatusCode::UNAUTHORIZED, UNAUTHORIZED_BODY)
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::html(StatusCode::NOT_FOUND, NOT_FOUND_BODY)
    }

    #[must_use]
    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
            .with_body("application/json", INTERNAL_ERROR_BODY.as_bytes())
    }

    /// Serializes status line, headers (with a computed `Content-Length`
    /// and `Connection: close`), blank line and raw body.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.reason);
        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Parses a full response as read from a closed connection.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (head, body) = split_head(raw)?;
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();

        let mut parts = status_line.splitn(3, ' ');
        let (status, reason) = match (parts.next(), parts.next(), parts.next()) {
            (Some(version), Some(code), reason) if version.starts_with("HTTP/") => {
                let code = code
                    .parse::<u16>()
                    .map_err(|_| ProtocolError::MalformedStatusLine(status_line.to_string()))?;
                (StatusCode(code), reason.unwrap_or_default().to_string())
            }
            _ => return Err(ProtocolError::MalformedStatusLine(status_line.to_string())),
        };

        let headers = parse_header_lines(lines)?;
        let body = match headers.content_length() {
            Some(len) if len < body.len() => body[..len].to_vec(),
            _ => body.to_vec(),
        };

        Ok(Self {
            status,
            reason,
            headers,
            body,
        })
    }

    #[must_use]
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
