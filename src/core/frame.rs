//! Discrete transport frames.
//!
//! The engine never sees a byte stream: transports hand it whole frames and
//! accept whole frames back, the way a WebSocket does.

use bytes::Bytes;

/// Bytes of content [`Frame::describe`] renders before truncating.
pub const DESCRIBE_LIMIT: usize = 256;

/// One unit delivered by, or handed to, a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    /// Close notification (inbound) or close request (outbound).
    Close,
}

impl Frame {
    /// Frame content as bytes; empty for [`Frame::Close`].
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(data) => data,
            Frame::Close => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Printable rendering for logs. Binary frames are shown as hex.
    ///
    /// Only the first [`DESCRIBE_LIMIT`] bytes are rendered; longer frames
    /// end in `... (N bytes)`.
    pub fn describe(&self) -> String {
        let mut out = match self {
            Frame::Text(text) => {
                let mut end = text.len().min(DESCRIBE_LIMIT);
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                text[..end].to_string()
            }
            Frame::Binary(data) => data
                .iter()
                .take(DESCRIBE_LIMIT)
                .map(|b| format!("{b:02x}"))
                .collect(),
            Frame::Close => return String::from("<close>"),
        };
        if self.len() > DESCRIBE_LIMIT {
            out.push_str(&format!("... ({} bytes)", self.len()));
        }
        out
    }
}
