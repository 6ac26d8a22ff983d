//! Transport messages.

use bytes::Bytes;

/// Kind of payload carried by a [`WsMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// UTF-8 text
    Text,
    /// Opaque bytes
    Binary,
    /// The peer is going away
    Close,
}

/// A message as the transport sees it.
///
/// The dispatch core never looks inside; only the handler that consumes it
/// decodes the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsMessage {
    pub kind: MessageKind,
    pub contents: Bytes,
}

impl WsMessage {
    pub fn new(kind: MessageKind, contents: impl Into<Bytes>) -> Self {
        Self {
            kind,
            contents: contents.into(),
        }
    }

    /// Creates a text message.
    pub fn text(contents: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, Bytes::from(contents.into()))
    }

    /// Creates a binary message.
    pub fn binary(contents: impl Into<Bytes>) -> Self {
        Self::new(MessageKind::Binary, contents)
    }

    /// Creates an empty close message.
    pub fn close() -> Self {
        Self::new(MessageKind::Close, Bytes::new())
    }

    /// Returns the payload as text for valid UTF-8 text messages.
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Text => std::str::from_utf8(&self.contents).ok(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
