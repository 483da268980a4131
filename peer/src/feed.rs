//! Lines shown to the user: system notes, errors and received messages.

use std::fmt;

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLine {
    System(String),
    Error(String),
    Message {
        sender: Option<String>,
        text: String,
    },
}

impl fmt::Display for FeedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedLine::System(text) => write!(f, "[System] {}", text),
            FeedLine::Error(text) => write!(f, "[Error] {}", text),
            FeedLine::Message { sender, text } => {
                let sender = sender.as_deref().unwrap_or("unknown");
                writeln!(f, "+-- message from {} --", sender)?;
                writeln!(f, "| {}", text)?;
                write!(f, "+{}", "-".repeat(sender.len() + 19))
            }
        }
    }
}

pub type FeedReceiver = mpsc::UnboundedReceiver<FeedLine>;

/// Cloneable sink for feed lines. Lines sent after the receiver is gone are
/// dropped.
#[derive(Clone, Debug)]
pub struct MessageFeed {
    tx: mpsc::UnboundedSender<FeedLine>,
}

impl MessageFeed {
    pub fn channel() -> (Self, FeedReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn push(&self, line: FeedLine) {
        log::debug!("feed: {:?}", line);
        let _ = self.tx.send(line);
    }

    pub fn system(&self, text: impl Into<String>) {
        self.push(FeedLine::System(text.into()));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(FeedLine::Error(text.into()));
    }

    pub fn message(&self, sender: Option<String>, text: impl Into<String>) {
        self.push(FeedLine::Message {
            sender,
            text: text.into(),
        });
    }
}
