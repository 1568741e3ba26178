//! Credit wire protocol.
//!
//! A frame is a one-byte kind tag followed by a kind-dependent payload:
//!
//! ```text
//! +------+--------+
//! | 0x01 | amount |   Credit (2 bytes)
//! +------+--------+
//! ```
//!
//! There is no length prefix and no checksum. All fields are single bytes,
//! so there are no endianness concerns.

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Tag byte of a `Credit` frame.
pub const CREDIT_TAG: u8 = 0x01;

/// Largest frame the protocol defines.
pub const MAX_FRAME_LEN: usize = 2;

/// Errors raised while reading a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Tag byte is not a defined message kind
    #[error("Undefined message type: {0:#04x}")]
    UnknownKind(u8),

    /// Tag was read but the channel closed before its payload
    #[error("Truncated {0:?} frame: payload missing")]
    TruncatedFrame(MessageKind),

    /// Tag was read but its payload has not arrived yet
    #[error("Incomplete {0:?} frame: payload still pending")]
    Incomplete(MessageKind),

    /// The sending endpoint has been released
    #[error("Channel closed by peer")]
    Closed,

    /// The underlying read failed
    #[error("Read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message kinds defined by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Transfer of money to the receiver
    Credit = CREDIT_TAG,
}

impl MessageKind {
    /// Returns the tag byte for this kind.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            CREDIT_TAG => Ok(MessageKind::Credit),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Adds `amount` to the receiver's balance
    Credit { amount: u8 },
}

impl Message {
    /// Creates a credit message.
    pub fn credit(amount: u8) -> Self {
        Message::Credit { amount }
    }

    /// Returns the message kind.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Credit { .. } => MessageKind::Credit,
        }
    }

    /// Returns the transferred amount, if the kind carries one.
    pub fn amount(&self) -> Option<u8> {
        match self {
            Message::Credit { amount } => Some(*amount),
        }
    }

    /// Encodes the message as a complete frame.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Message::Credit { amount } => vec![CREDIT_TAG, *amount],
        }
    }
}

/// Reads exactly one frame from `reader`.
///
/// The tag read is unbounded and should only be issued once the reader is
/// known to be readable. The payload read is bounded by `payload_timeout`:
/// a tag whose payload does not follow yields `TruncatedFrame` instead of
/// blocking. On an unknown tag the payload (if any) is left unread.
///
/// A tag consumed here is lost if its payload is late. Readers that poll
/// the same stream repeatedly use [`read_frame`], which keeps it.
pub async fn read_message<R>(
    reader: &mut R,
    payload_timeout: Duration,
) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut pending = None;
    match read_frame(reader, &mut pending, payload_timeout).await {
        Err(ProtocolError::Incomplete(kind)) => Err(ProtocolError::TruncatedFrame(kind)),
        other => other,
    }
}

/// Reads one frame, resuming a frame whose tag an earlier call consumed.
///
/// If `pending` holds a kind, its payload is read without reading a new tag.
/// When the payload does not arrive within `payload_timeout` the kind is
/// stored back in `pending` and `Incomplete` is returned, so the stream
/// stays aligned on frame boundaries. A payload cut off by the peer closing
/// is `TruncatedFrame`.
pub async fn read_frame<R>(
    reader: &mut R,
    pending: &mut Option<MessageKind>,
    payload_timeout: Duration,
) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let kind = match pending.take() {
        Some(kind) => kind,
        None => {
            let tag = match reader.read_u8().await {
                Ok(tag) => tag,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(ProtocolError::Closed)
                }
                Err(e) => return Err(e.into()),
            };
            MessageKind::try_from(tag)?
        }
    };

    match kind {
        MessageKind::Credit => {
            match tokio::time::timeout(payload_timeout, reader.read_u8()).await {
                Ok(Ok(amount)) => Ok(Message::Credit { amount }),
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    Err(ProtocolError::TruncatedFrame(kind))
                }
                Ok(Err(e)) => Err(e.into()),
                Err(_elapsed) => {
                    *pending = Some(kind);
                    Err(ProtocolError::Incomplete(kind))
                }
            }
        }
    }
}
