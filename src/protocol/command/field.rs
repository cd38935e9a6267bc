use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Fixed-size tail of a column definition packet (12 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, KnownLayout, Immutable)]
pub struct FieldDefinitionTail {
    charset: U16LE,
    column_length: U32LE,
    column_type: u8,
    flags: U16LE,
    decimals: u8,
    reserved: U16LE,
}

impl FieldDefinitionTail {
    pub fn charset(&self) -> u16 {
        self.charset.get()
    }

    pub fn column_length(&self) -> u32 {
        self.column_length.get()
    }

    /// Decode the column type code; an unknown code is [`Error::UnknownColumnType`]
    pub fn column_type(&self) -> Result<ColumnType> {
        ColumnType::from_u8(self.column_type).ok_or(Error::UnknownColumnType(self.column_type))
    }

    pub fn raw_column_type(&self) -> u8 {
        self.column_type
    }

    pub fn flags(&self) -> ColumnFlags {
        ColumnFlags::from_bits_retain(self.flags.get())
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

/// Metadata of one parameter or result column of a prepared statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub catalog: String,
    pub schema: String,
    /// Table alias
    pub table: String,
    /// Physical table name
    pub org_table: String,
    /// Column alias
    pub name: String,
    /// Physical column name
    pub org_name: String,
    pub tail: FieldDefinitionTail,
}

impl FieldDefinition {
    /// Decode a column definition packet
    ///
    /// Any decoding failure is reported as [`Error::MalformedField`] carrying the packet.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Self::parse_inner(payload).map_err(|err| {
            let reason = match err {
                Error::MalformedField { reason, .. } => reason,
                other => other.to_string(),
            };
            Error::MalformedField {
                reason,
                packet: payload.to_vec(),
            }
        })
    }

    fn parse_inner(data: &[u8]) -> Result<Self> {
        // ─── Variable Length String Fields ───────────────────────────
        let (catalog, data) = read_string_lenenc(data)?;
        let (schema, data) = read_string_lenenc(data)?;
        let (table, data) = read_string_lenenc(data)?;
        let (org_table, data) = read_string_lenenc(data)?;
        let (name, data) = read_string_lenenc(data)?;
        let (org_name, data) = read_string_lenenc(data)?;

        // ─── Fixed Tail ──────────────────────────────────────────────
        // length of the fixed fields, always 0x0c
        let (_length, data) = read_int_lenenc(data)?;
        // COM_FIELD_LIST appends default values after the tail
        let (tail, _rest) =
            FieldDefinitionTail::ref_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;

        Ok(Self {
            catalog: utf8(catalog)?,
            schema: utf8(schema)?,
            table: utf8(table)?,
            org_table: utf8(org_table)?,
            name: utf8(name)?,
            org_name: utf8(org_name)?,
            tail: *tail,
        })
    }

    pub fn column_type(&self) -> Result<ColumnType> {
        self.tail.column_type()
    }

    pub fn flags(&self) -> ColumnFlags {
        self.tail.flags()
    }

    pub fn charset(&self) -> u16 {
        self.tail.charset()
    }

    pub fn column_length(&self) -> u32 {
        self.tail.column_length()
    }

    pub fn decimals(&self) -> u8 {
        self.tail.decimals()
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    simdutf8::basic::from_utf8(bytes)
        .map(ToString::to_string)
        .map_err(|err| Error::MalformedField {
            reason: format!("identifier is not valid UTF-8: {err}"),
            packet: Vec::new(),
        })
}
