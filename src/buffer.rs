/// Reusable buffers for one connection
///
/// A connection owns a single `BufferSet` and reuses it for every command, so the
/// steady state allocates nothing beyond the assembled statements.
#[derive(Debug)]
pub struct BufferSet {
    /// Payload of the packet currently being processed
    /// Bytes are valid until the next packet is read.
    pub read_buffer: Vec<u8>,

    /// Outbound command
    /// It always has at least 4 bytes which is reserved for the first packet header.
    /// Layout: [4-byte header space][payload that is possibly larger than 16MB]
    write_buffer: Vec<u8>,
}

impl BufferSet {
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::new(),
            write_buffer: vec![0; 4],
        }
    }

    /// Clear the write buffer, reserve 4 bytes for the header, and return mutable access.
    #[inline]
    pub fn new_write_buffer(&mut self) -> &mut Vec<u8> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(&[0u8; 4]);
        &mut self.write_buffer
    }

    #[inline]
    pub fn write_buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.write_buffer
    }

    #[inline]
    pub fn write_buffer(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Get the payload length (total buffer length minus 4-byte header).
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.write_buffer.len().saturating_sub(4)
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_set() {
        let buffers = BufferSet::new();
        assert!(buffers.read_buffer.is_empty());
        assert_eq!(buffers.write_buffer().len(), 4);
        assert_eq!(buffers.payload_len(), 0);
    }

    #[test]
    fn new_write_buffer_resets_payload() {
        let mut buffers = BufferSet::new();
        buffers.new_write_buffer().extend_from_slice(b"\x16SELECT 1");
        assert_eq!(buffers.write_buffer().len(), 13);
        assert_eq!(buffers.payload_len(), 9);

        buffers.new_write_buffer().extend_from_slice(&[0x19, 1, 0, 0, 0]);
        assert_eq!(buffers.payload_len(), 5);
        assert_eq!(&buffers.write_buffer()[4..], &[0x19, 1, 0, 0, 0]);
    }
}
