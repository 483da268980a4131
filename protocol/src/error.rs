/// Errors produced while reading or parsing a message off the wire.
///
/// Any of these closes the connection without a response.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("request is empty")]
    Empty,

    #[error("message has no blank line between head and body")]
    MissingBoundary,

    #[error("message head is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),

    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
