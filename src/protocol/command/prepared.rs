use crate::constant::{CommandByte, EOF_HEADER, ERR_HEADER, OK_HEADER};
use crate::error::{Error, Result, eyre};
use crate::prepared::PreparedStatement;
use crate::protocol::command::FieldDefinition;
use crate::protocol::packet::ErrPayloadBytes;
use crate::protocol::primitive::*;
use crate::protocol::response::{TerminatorPacket, classify_unexpected, read_terminator};
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Prepared statement OK response after the 0x00 status byte (zero-copy)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct PrepareOk {
    statement_id: U32LE,
    num_columns: U16LE,
    num_params: U16LE,
    _reserved: u8,
    warning_count: U16LE,
}

impl PrepareOk {
    /// Exact payload length of the header, status byte included
    pub const LEN: usize = 12;

    /// Get the statement ID
    pub fn statement_id(&self) -> u32 {
        self.statement_id.get()
    }

    /// Get the number of columns in the result set
    pub fn num_columns(&self) -> u16 {
        self.num_columns.get()
    }

    /// Get the number of parameters in the prepared statement
    pub fn num_params(&self) -> u16 {
        self.num_params.get()
    }

    /// Get the warning count
    pub fn warning_count(&self) -> u16 {
        self.warning_count.get()
    }
}

/// Write COM_STMT_PREPARE command
pub fn write_prepare(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::StmtPrepare as u8);
    out.extend_from_slice(sql.as_bytes());
}

/// Write COM_STMT_CLOSE command
///
/// The server sends no response to this command.
pub fn write_close_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtClose as u8);
    write_int_4(out, statement_id);
}

/// Write COM_STMT_RESET command
pub fn write_reset_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtReset as u8);
    write_int_4(out, statement_id);
}

/// Read COM_STMT_PREPARE response header
///
/// The header is exactly 12 bytes and starts with 0x00. An ERR packet becomes
/// [`Error::ServerError`], any other shape [`Error::MalformedHeader`].
pub fn read_prepare_ok(payload: &[u8]) -> Result<&PrepareOk> {
    match payload.split_first() {
        Some((&OK_HEADER, body)) if payload.len() == PrepareOk::LEN => {
            Ok(PrepareOk::ref_from_bytes(body)?)
        }
        Some((&ERR_HEADER, _)) => Err(ErrPayloadBytes(payload).into()),
        _ => Err(Error::MalformedHeader {
            packet: payload.to_vec(),
        }),
    }
}

/// Read COM_STMT_RESET response: an OK packet or an ERR packet
pub fn read_reset_response(payload: &[u8]) -> Result<()> {
    match payload.first() {
        Some(&OK_HEADER) => Ok(()),
        _ => Err(classify_unexpected(payload, "reading COM_STMT_RESET response")),
    }
}

// ============================================================================
// State Machine API for COM_STMT_PREPARE
// ============================================================================

/// Result of driving the prepare state machine
#[derive(Debug)]
pub enum PrepareResult {
    /// Feed the next packet of the response
    NeedPacket,
    /// The statement is fully assembled
    Complete(PreparedStatement),
}

/// State machine assembling the response to COM_STMT_PREPARE
///
/// The response is a 12-byte header, then `num_params` parameter definitions,
/// then `num_columns` column definitions, then a 5-byte terminator. The terminator
/// is omitted when both counts are zero.
///
/// Pure parsing state machine: each call to `drive()` consumes exactly one packet.
#[derive(Debug, Default)]
pub enum Prepare {
    /// Waiting for the header packet
    #[default]
    AwaitingHeader,
    /// Header seen, collecting field definitions
    Accumulating(PreparedStatement),
    /// The statement was handed out
    Complete,
    /// A packet could not be processed
    Failed,
}

impl Prepare {
    pub fn new() -> Self {
        Self::AwaitingHeader
    }

    /// Whether the state machine reached `Complete` or `Failed`
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Drive the state machine with the next payload
    ///
    /// # Returns
    /// * `Ok(PrepareResult::NeedPacket)` - Read another packet and call `drive()` again
    /// * `Ok(PrepareResult::Complete(_))` - The response is complete; stop reading
    /// * `Err(Error)` - The response is malformed or the server reported an error
    pub fn drive(&mut self, payload: &[u8]) -> Result<PrepareResult> {
        // Any early return below leaves the machine in `Failed`
        match std::mem::replace(self, Self::Failed) {
            Self::AwaitingHeader => {
                let header = read_prepare_ok(payload)?;
                let stmt = PreparedStatement::new(header);
                tracing::debug!(
                    statement_id = stmt.id(),
                    num_params = stmt.num_params(),
                    num_columns = stmt.num_columns(),
                    "prepare header"
                );

                if stmt.is_filled() {
                    *self = Self::Complete;
                    Ok(PrepareResult::Complete(stmt))
                } else {
                    *self = Self::Accumulating(stmt);
                    Ok(PrepareResult::NeedPacket)
                }
            }

            Self::Accumulating(mut stmt) => match payload.first() {
                // 0xFE also ends row streams elsewhere in the protocol; only a 5-byte packet
                // after every declared definition terminates this response.
                Some(&EOF_HEADER) => {
                    if stmt.is_filled() && payload.len() == TerminatorPacket::LEN {
                        let eof = read_terminator(payload)?;
                        tracing::debug!(
                            statement_id = stmt.id(),
                            warnings = eof.warnings(),
                            status_flags = ?eof.status_flags(),
                            "prepare complete"
                        );
                        *self = Self::Complete;
                        Ok(PrepareResult::Complete(stmt))
                    } else {
                        tracing::warn!(
                            statement_id = stmt.id(),
                            len = payload.len(),
                            params = stmt.params().len(),
                            columns = stmt.columns().len(),
                            "ignoring 0xFE packet that does not terminate the prepare response"
                        );
                        *self = Self::Accumulating(stmt);
                        Ok(PrepareResult::NeedPacket)
                    }
                }
                Some(&ERR_HEADER) => Err(ErrPayloadBytes(payload).into()),
                _ => {
                    let field = FieldDefinition::parse(payload)?;
                    tracing::trace!(statement_id = stmt.id(), name = %field.name, "field definition");
                    if stmt.push_field(field).is_err() {
                        return Err(Error::UnexpectedPacket {
                            context: "waiting for the prepare terminator",
                            packet: payload.to_vec(),
                        });
                    }
                    *self = Self::Accumulating(stmt);
                    Ok(PrepareResult::NeedPacket)
                }
            },

            state @ (Self::Complete | Self::Failed) => {
                *self = state;
                Err(Error::LibraryBug(eyre!(
                    "prepare state machine driven after it finished"
                )))
            }
        }
    }
}
