//! Request line, header block and body parsing.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use crate::error::ProtocolError;
use crate::headers::HeaderMap;

/// Separator between the header block and the body.
pub const HEAD_BOUNDARY: &[u8] = b"\r\n\r\n";

/// Request method. Unknown tokens are kept verbatim so routing can still
/// decide on them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Other(String),
}

impl Method {
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Other(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed inbound request.
///
/// `authenticated_user` is filled by the engine's auth gate before the
/// handler runs; `remote_addr` is the peer address of the accepted socket.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub version: String,
    pub headers: HeaderMap,
    pub cookies: HashMap<String, String>,
    pub body: Vec<u8>,
    pub remote_addr: Option<SocketAddr>,
    pub authenticated_user: Option<String>,
}

impl Request {
    /// Parses one request from raw bytes.
    ///
    /// The body is whatever follows the boundary; a body cut short by the
    /// read limit is kept as-is.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (head, body) = split_head(raw)?;
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default();
        let (method, target, version) = parse_request_line(request_line)?;
        let headers = parse_header_lines(lines)?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };

        let cookies = headers.get("cookie").map(parse_cookies).unwrap_or_default();

        Ok(Self {
            method,
            path,
            query,
            version: version.to_string(),
            headers,
            cookies,
            body: body.to_vec(),
            remote_addr: None,
            authenticated_user: None,
        })
    }

    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Splits a `Cookie` header value into name/value pairs.
///
/// Pairs without `=` are ignored; values may themselves contain `=`.
#[must_use]
pub fn parse_cookies(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Byte offset of the head/body boundary, if one has been received.
pub(crate) fn find_boundary(raw: &[u8]) -> Option<usize> {
    raw.windows(HEAD_BOUNDARY.len())
        .position(|window| window == HEAD_BOUNDARY)
}

pub(crate) fn split_head(raw: &[u8]) -> Result<(&str, &[u8]), ProtocolError> {
    let boundary = find_boundary(raw).ok_or(ProtocolError::MissingBoundary)?;
    let head = std::str::from_utf8(&raw[..boundary]).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok((head, &raw[boundary + HEAD_BOUNDARY.len()..]))
}

pub(crate) fn parse_header_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<HeaderMap, ProtocolError> {
    let mut headers = HeaderMap::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(ProtocolError::MalformedHeader(line.to_string()));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ProtocolError::MalformedHeader(line.to_string()));
        }
        headers.insert(name, value.trim());
    }
    Ok(headers)
}

fn parse_request_line(line: &str) -> Result<(Method, &str, &str), ProtocolError> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version), None)
            if target.starts_with('/') && version.starts_with("HTTP/") =>
        {
            Ok((Method::parse(method), target, version))
        }
        _ => Err(ProtocolError::MalformedRequestLine(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_headers_and_body() {
        let raw = b"POST /channels/join HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 23\r\n\r\n{\"channel_name\":\"team\"}";
        let req = Request::parse(raw).unwrap();

        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path, "/channels/join");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(req.headers.get("content-type"), Some("application/json"));
        assert_eq!(req.body_text(), "{\"channel_name\":\"team\"}");
    }

    #[test]
    fn extracts_cookies() {
        let raw = b"GET /me HTTP/1.1\r\nCookie: theme=dark; session_id=abc123==\r\n\r\n";
        let req = Request::parse(raw).unwrap();

        assert_eq!(req.cookie("session_id"), Some("abc123=="));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.cookie("missing"), None);
    }

    #[test]
    fn splits_query_from_path() {
        let raw = b"GET /get-peers?verbose=1 HTTP/1.1\r\n\r\n";
        let req = Request::parse(raw).unwrap();

        assert_eq!(req.path, "/get-peers");
        assert_eq!(req.query.as_deref(), Some("verbose=1"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn missing_boundary_is_rejected() {
        let err = Request::parse(b"GET / HTTP/1.1\r\nHost: x\r\n").unwrap_err();
        assert!(matches!(err, ProtocolError::MissingBoundary));
    }

    #[test]
    fn malformed_request_line_is_rejected() {
        let err = Request::parse(b"HELLO\r\n\r\n").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedRequestLine(_)));

        let err = Request::parse(b"GET nopath HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedRequestLine(_)));
    }

    #[test]
    fn header_without_colon_is_rejected() {
        let err = Request::parse(b"GET / HTTP/1.1\r\nbroken header\r\n\r\n").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedHeader(_)));
    }

    #[test]
    fn empty_input_is_its_own_error() {
        assert!(matches!(Request::parse(b""), Err(ProtocolError::Empty)));
    }

    #[test]
    fn cookie_parser_skips_pairs_without_value() {
        let cookies = parse_cookies("flag; a=1;; =nameless");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
    }
}
