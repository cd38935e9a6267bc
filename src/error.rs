use thiserror::Error;

use crate::protocol::packet::ErrPayloadBytes;
use crate::protocol::response::ErrPayload;

pub use color_eyre::eyre::eyre;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ErrPayload),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Invalid packet")]
    InvalidPacket,

    #[error("Unexpected end of packet")]
    UnexpectedEof,

    /// The first response to COM_STMT_PREPARE is neither an ERR packet nor a 12-byte OK header
    #[error("Malformed prepare header ({} bytes, leading byte {})", .packet.len(), leading_byte(.packet))]
    MalformedHeader { packet: Vec<u8> },

    #[error("Malformed field definition: {reason}")]
    MalformedField { reason: String, packet: Vec<u8> },

    /// The server sent a column type code this crate does not know
    #[error("Unknown column type 0x{0:02X}")]
    UnknownColumnType(u8),

    #[error("Unexpected packet while {context} (leading byte {})", leading_byte(.packet))]
    UnexpectedPacket {
        context: &'static str,
        packet: Vec<u8>,
    },

    /// The transport closed (or the worker went away) before the command produced its result
    #[error("Connection closed before the response was complete")]
    IncompleteResponse,

    /// An earlier command left the connection in an unknown protocol state
    #[error("Connection is unusable after an earlier error")]
    ConnectionBroken,

    #[error("Packet of {length} bytes exceeds the limit of {limit} bytes")]
    PacketTooLarge { length: usize, limit: usize },

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

fn leading_byte(packet: &[u8]) -> String {
    match packet.first() {
        Some(byte) => format!("0x{:02X}", byte),
        None => "<empty>".to_string(),
    }
}

impl Error {
    /// Returns true if the connection cannot be used for further commands.
    ///
    /// Malformed packets in the middle of a response leave unread packets on the wire,
    /// so they break the connection as well.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::IoError(_)
            | Error::IncompleteResponse
            | Error::ConnectionBroken
            | Error::PacketTooLarge { .. }
            | Error::MalformedField { .. }
            | Error::UnexpectedPacket { .. }
            | Error::InvalidPacket
            | Error::UnexpectedEof
            | Error::LibraryBug(_) => true,
            Error::ServerError(_)
            | Error::BadConfigError(_)
            | Error::MalformedHeader { .. }
            | Error::UnknownColumnType(_) => false,
        }
    }

    /// The raw packet attached to the error, if any
    pub fn packet(&self) -> Option<&[u8]> {
        match self {
            Error::ServerError(err) => Some(&err.packet),
            Error::MalformedHeader { packet }
            | Error::MalformedField { packet, .. }
            | Error::UnexpectedPacket { packet, .. } => Some(packet),
            _ => None,
        }
    }
}

impl<'a> From<ErrPayloadBytes<'a>> for Error {
    fn from(value: ErrPayloadBytes<'a>) -> Self {
        match ErrPayload::try_from(value) {
            Ok(err_payload) => Error::ServerError(err_payload),
            Err(err) => err,
        }
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        tracing::trace!("zerocopy cast error: {err:?}");
        Error::InvalidPacket
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
