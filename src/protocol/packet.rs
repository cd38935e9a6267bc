use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// MySQL packet header (zero-copy)
///
/// Layout matches MySQL wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = (length as u32).to_le_bytes();
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    /// Overwrite this header with a new length and sequence id
    pub fn encode_in_place(&mut self, length: usize, sequence_id: u8) {
        *self = Self::encode(length, sequence_id);
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }
}

/// ERR packet payload, starting with the 0xFF header byte
#[derive(Debug, Clone, Copy)]
pub struct ErrPayloadBytes<'a>(pub &'a [u8]);
