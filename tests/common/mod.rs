//! Packet builders and scripted streams shared by the integration tests
#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use tokio::io::DuplexStream;
use zero_stmt::protocol::primitive::write_bytes_lenenc;

/// Route library logs to the captured test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub const TERMINATOR: [u8; 5] = [0xFE, 0x00, 0x00, 0x02, 0x00];

/// Prepend a packet header
pub fn frame(sequence_id: u8, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() as u32).to_le_bytes();
    let mut out = vec![len[0], len[1], len[2], sequence_id];
    out.extend_from_slice(payload);
    out
}

/// Frame a server response; sequence ids continue after the command's 0
pub fn response(packets: &[Vec<u8>]) -> Vec<u8> {
    packets
        .iter()
        .enumerate()
        .flat_map(|(i, packet)| frame(i as u8 + 1, packet))
        .collect()
}

/// Split a byte stream back into (sequence_id, payload) pairs
pub fn unframe(mut bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]) as usize;
        out.push((bytes[3], bytes[4..4 + len].to_vec()));
        bytes = &bytes[4 + len..];
    }
    out
}

pub fn prepare_header(statement_id: u32, num_columns: u16, num_params: u16) -> Vec<u8> {
    let mut packet = vec![0x00];
    packet.extend_from_slice(&statement_id.to_le_bytes());
    packet.extend_from_slice(&num_columns.to_le_bytes());
    packet.extend_from_slice(&num_params.to_le_bytes());
    packet.extend_from_slice(&[0x00, 0x00, 0x00]);
    packet
}

pub fn field_with_names(names: [&[u8]; 6], column_type: u8) -> Vec<u8> {
    let mut packet = Vec::new();
    for name in names {
        write_bytes_lenenc(&mut packet, name);
    }
    packet.push(0x0c);
    packet.extend_from_slice(&[
        0x21, 0x00, // charset = 33
        0x0B, 0x00, 0x00, 0x00, // column_length = 11
        column_type,
        0x01, 0x00, // flags = NOT_NULL
        0x00, // decimals
        0x00, 0x00, // reserved
    ]);
    packet
}

pub fn field(name: &str, column_type: u8) -> Vec<u8> {
    let name = name.as_bytes();
    field_with_names([b"def", b"test", b"users", b"users", name, name], column_type)
}

pub fn err_packet(code: u16, sql_state: &str, message: &str) -> Vec<u8> {
    let mut packet = vec![0xFF];
    packet.extend_from_slice(&code.to_le_bytes());
    packet.push(b'#');
    packet.extend_from_slice(sql_state.as_bytes());
    packet.extend_from_slice(message.as_bytes());
    packet
}

pub fn command(code: u8, body: &[u8]) -> Vec<u8> {
    let mut payload = vec![code];
    payload.extend_from_slice(body);
    frame(0, &payload)
}

/// In-memory stream replaying canned server bytes and recording client writes
pub struct MockStream {
    input: Cursor<Vec<u8>>,
    pub output: Vec<u8>,
}

impl MockStream {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            output: Vec::new(),
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Read one framed packet from the server side of a duplex pipe
pub async fn read_frame(stream: &mut DuplexStream) -> Option<(u8, Vec<u8>)> {
    use tokio::io::AsyncReadExt;

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.ok()?;
    let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    let mut payload = vec![0; len];
    stream.read_exact(&mut payload).await.ok()?;
    Some((header[3], payload))
}

pub async fn write_response(stream: &mut DuplexStream, packets: &[Vec<u8>]) {
    use tokio::io::AsyncWriteExt;

    stream.write_all(&response(packets)).await.unwrap();
    stream.flush().await.unwrap();
}
