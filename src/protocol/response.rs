use crate::constant::{EOF_HEADER, ERR_HEADER, ServerStatusFlags};
use crate::error::{Error, Result};
use crate::protocol::packet::ErrPayloadBytes;
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::U16 as U16LE;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// ERR packet response
#[derive(Debug, Clone, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
    /// The ERR packet as received
    pub packet: Vec<u8>,
}

impl TryFrom<ErrPayloadBytes<'_>> for ErrPayload {
    type Error = Error;

    fn try_from(bytes: ErrPayloadBytes<'_>) -> Result<Self> {
        let payload = bytes.0;
        let shape_error = || Error::UnexpectedPacket {
            context: "decoding an error packet",
            packet: payload.to_vec(),
        };

        let (header, data) = read_int_1(payload).map_err(|_| shape_error())?;
        if header != ERR_HEADER {
            return Err(shape_error());
        }
        let (error_code, data) = read_int_2(data).map_err(|_| shape_error())?;

        // SQL state marker '#' followed by 5 bytes
        let (sql_state, rest) = match data.split_first() {
            Some((b'#', marked)) => {
                let (state, rest) = read_string_fix(marked, 5).map_err(|_| shape_error())?;
                (String::from_utf8_lossy(state).into_owned(), rest)
            }
            _ => (String::new(), data),
        };

        Ok(ErrPayload {
            error_code,
            sql_state,
            message: String::from_utf8_lossy(rest).into_owned(),
            packet: payload.to_vec(),
        })
    }
}

/// Turn a packet that does not match the expected success layout into an error
///
/// Packets led by 0xFF are decoded as server errors; anything else is a protocol-shape error.
pub fn classify_unexpected(payload: &[u8], context: &'static str) -> Error {
    match payload.first() {
        Some(&ERR_HEADER) => ErrPayloadBytes(payload).into(),
        _ => Error::UnexpectedPacket {
            context,
            packet: payload.to_vec(),
        },
    }
}

/// Terminator (EOF) packet body after the 0xFE header (zero-copy)
///
/// - warnings: 2 bytes (little-endian)
/// - status_flags: 2 bytes (little-endian)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct TerminatorPacket {
    warnings: U16LE,
    status_flags: U16LE,
}

impl TerminatorPacket {
    /// Exact payload length of a terminator, header byte included
    pub const LEN: usize = 5;

    pub fn warnings(&self) -> u16 {
        self.warnings.get()
    }

    pub fn status_flags(&self) -> ServerStatusFlags {
        ServerStatusFlags::from_bits_retain(self.status_flags.get())
    }
}

/// Read a terminator packet: 0xFE followed by exactly 4 bytes
pub fn read_terminator(payload: &[u8]) -> Result<&TerminatorPacket> {
    match payload.split_first() {
        Some((&EOF_HEADER, body)) => Ok(TerminatorPacket::ref_from_bytes(body)?),
        _ => Err(Error::InvalidPacket),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn err_payload_with_sql_state() {
        let mut payload = vec![0xFF, 0x28, 0x04, b'#'];
        payload.extend_from_slice(b"42000");
        payload.extend_from_slice(b"You have an error in your SQL syntax");

        let err = ErrPayload::try_from(ErrPayloadBytes(&payload)).unwrap();
        assert_eq!(err.error_code, 1064);
        assert_eq!(err.sql_state, "42000");
        assert_eq!(err.message, "You have an error in your SQL syntax");
        assert_eq!(err.packet, payload);
        assert_eq!(
            err.to_string(),
            "ERROR 1064 (42000): You have an error in your SQL syntax"
        );
    }

    #[test]
    fn err_payload_without_sql_state() {
        let payload = [0xFF, 0x10, 0x04, b'T', b'o', b'o'];
        let err = ErrPayload::try_from(ErrPayloadBytes(&payload)).unwrap();
        assert_eq!(err.error_code, 1040);
        assert_eq!(err.sql_state, "");
        assert_eq!(err.message, "Too");
    }

    #[test]
    fn err_payload_truncated() {
        let payload = [0xFF, 0x10];
        let err = Error::from(ErrPayloadBytes(&payload));
        assert!(matches!(err, Error::UnexpectedPacket { ref packet, .. } if packet == &payload));
    }

    #[test]
    fn classify_server_error() {
        let payload = [0xFF, 0x19, 0x04, b'#', b'H', b'Y', b'0', b'0', b'0', b'x'];
        match classify_unexpected(&payload, "testing") {
            Error::ServerError(err) => {
                assert_eq!(err.error_code, 1049);
                assert_eq!(err.sql_state, "HY000");
                assert_eq!(err.message, "x");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn classify_shape_error() {
        let payload = [0x07, 0x01];
        match classify_unexpected(&payload, "testing") {
            Error::UnexpectedPacket { context, packet } => {
                assert_eq!(context, "testing");
                assert_eq!(packet, payload);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            classify_unexpected(&[], "testing"),
            Error::UnexpectedPacket { .. }
        ));
    }

    #[test]
    fn terminator() {
        let payload = [0xFE, 0x02, 0x00, 0x02, 0x00];
        let eof = read_terminator(&payload).unwrap();
        assert_eq!(eof.warnings(), 2);
        assert!(
            eof.status_flags()
                .contains(ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT)
        );
    }

    #[test]
    fn terminator_wrong_length() {
        assert!(read_terminator(&[0xFE, 0x00, 0x00]).is_err());
        assert!(read_terminator(&[0xFE, 0x00, 0x00, 0x00, 0x00, 0x00]).is_err());
        assert!(read_terminator(&[0x00, 0x00, 0x00, 0x00, 0x00]).is_err());
    }
}
