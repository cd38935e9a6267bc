use std::io::{BufReader, Read, Write};
use std::net::TcpStream;

use tracing::instrument;
use zerocopy::{FromBytes, FromZeros, IntoBytes};

use crate::buffer::BufferSet;
use crate::constant::MAX_PACKET_CHUNK;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::prepared::PreparedStatement;
use crate::protocol::command::prepared::{
    Prepare, PrepareResult, read_reset_response, write_close_statement, write_prepare,
    write_reset_statement,
};
use crate::protocol::packet::PacketHeader;

/// Blocking connection speaking the prepared statement subprotocol
///
/// The stream must already be authenticated. Commands are issued one at a time;
/// each call reads exactly the packets of its own response.
pub struct Conn<S: Read + Write> {
    stream: BufReader<S>,
    buffer_set: BufferSet,
    max_payload_length: usize,
    is_broken: bool,
}

impl Conn<TcpStream> {
    /// Wrap an authenticated TCP connection
    pub fn from_tcp(stream: TcpStream, opts: &Opts) -> Result<Self> {
        stream.set_nodelay(opts.tcp_nodelay)?;
        Self::new_with_stream(stream, opts)
    }
}

impl<S: Read + Write> Conn<S> {
    /// Wrap an authenticated stream
    pub fn new_with_stream(stream: S, opts: &Opts) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            stream: BufReader::new(stream),
            buffer_set: BufferSet::new(),
            max_payload_length: opts.max_payload_length,
            is_broken: false,
        })
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Whether an earlier command failed mid-response
    ///
    /// A broken connection rejects every command with [`Error::ConnectionBroken`].
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    /// Prepare a statement
    ///
    /// Reads the header, the parameter and column definitions, and the terminator.
    pub fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        self.begin()?;
        let result = self.prepare_inner(sql);
        self.finish(result)
    }

    #[instrument(skip_all)]
    fn prepare_inner(&mut self, sql: &str) -> Result<PreparedStatement> {
        write_prepare(self.buffer_set.new_write_buffer(), sql);
        self.write_payload()?;

        let mut prepare = Prepare::new();
        loop {
            self.read_payload()?;
            match prepare.drive(&self.buffer_set.read_buffer)? {
                PrepareResult::NeedPacket => {}
                PrepareResult::Complete(stmt) => return Ok(stmt),
            }
        }
    }

    /// Reset the data of a prepared statement on the server
    pub fn reset_statement(&mut self, stmt: &PreparedStatement) -> Result<()> {
        self.begin()?;
        let result = self.reset_statement_inner(stmt.id());
        self.finish(result)
    }

    #[instrument(skip_all)]
    fn reset_statement_inner(&mut self, statement_id: u32) -> Result<()> {
        write_reset_statement(self.buffer_set.new_write_buffer(), statement_id);
        self.write_payload()?;

        self.read_payload()?;
        read_reset_response(&self.buffer_set.read_buffer)
    }

    /// Deallocate a prepared statement on the server
    ///
    /// The server does not answer COM_STMT_CLOSE, so only write errors are reported.
    #[instrument(skip_all)]
    pub fn close_statement(&mut self, stmt: PreparedStatement) -> Result<()> {
        self.begin()?;
        write_close_statement(self.buffer_set.new_write_buffer(), stmt.id());
        let result = self.write_payload();
        self.finish(result)
    }

    /// Mark the connection busy until the command settles
    fn begin(&mut self) -> Result<()> {
        if self.is_broken {
            return Err(Error::ConnectionBroken);
        }
        self.is_broken = true;
        Ok(())
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        self.is_broken = matches!(&result, Err(err) if err.is_connection_broken());
        if self.is_broken {
            tracing::warn!("connection marked broken");
        }
        result
    }

    /// Write a MySQL packet from write_buffer, splitting it into 16MB chunks if necessary
    #[instrument(skip_all)]
    fn write_payload(&mut self) -> Result<()> {
        let mut sequence_id = 0u8;
        let mut buffer = self.buffer_set.write_buffer_mut().as_mut_slice();

        loop {
            let chunk_size = buffer.len().saturating_sub(4).min(MAX_PACKET_CHUNK);
            let (header, _) = PacketHeader::mut_from_prefix(buffer)?;
            header.encode_in_place(chunk_size, sequence_id);
            self.stream.get_mut().write_all(&buffer[..4 + chunk_size])?;

            if chunk_size < MAX_PACKET_CHUNK {
                break;
            }

            // the last 4 bytes of this chunk become the next header
            sequence_id = sequence_id.wrapping_add(1);
            buffer = &mut buffer[MAX_PACKET_CHUNK..];
        }
        self.stream.get_mut().flush()?;
        Ok(())
    }

    /// Read a complete payload into read_buffer, concatenating 16MB continuation packets
    #[instrument(skip_all)]
    fn read_payload(&mut self) -> Result<()> {
        let buffer = &mut self.buffer_set.read_buffer;
        buffer.clear();

        loop {
            let mut header = PacketHeader::new_zeroed();
            read_exact(&mut self.stream, header.as_mut_bytes())?;

            let length = header.length();
            let start = buffer.len();
            if start + length > self.max_payload_length {
                return Err(Error::PacketTooLarge {
                    length: start + length,
                    limit: self.max_payload_length,
                });
            }
            buffer.resize(start + length, 0);
            read_exact(&mut self.stream, &mut buffer[start..])?;
            let sequence_id = header.sequence_id;
            tracing::trace!(sequence_id, length, "packet");

            if length < MAX_PACKET_CHUNK {
                return Ok(());
            }
        }
    }
}

/// `read_exact` that reports a closed stream as an incomplete response
fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::IncompleteResponse,
        _ => Error::IoError(err),
    })
}
