use bitflags::bitflags;

/// Command bytes of the prepared statement subprotocol
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandByte {
    StmtPrepare = 0x16,
    StmtClose = 0x19,
    StmtReset = 0x1a,
}

/// Leading byte of an OK packet (and of the COM_STMT_PREPARE header)
pub const OK_HEADER: u8 = 0x00;
/// Leading byte of an EOF packet
pub const EOF_HEADER: u8 = 0xFE;
/// Leading byte of an ERR packet
pub const ERR_HEADER: u8 = 0xFF;

/// Largest payload carried by a single packet; longer payloads continue in the next one
pub const MAX_PACKET_CHUNK: usize = 0xFF_FFFF;

bitflags! {
    /// Server status flags carried by OK and EOF packets
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ServerStatusFlags: u16 {
        const SERVER_STATUS_IN_TRANS = 0x0001;
        const SERVER_STATUS_AUTOCOMMIT = 0x0002;
        const SERVER_MORE_RESULTS_EXISTS = 0x0008;
        const SERVER_STATUS_NO_GOOD_INDEX_USED = 0x0010;
        const SERVER_STATUS_NO_INDEX_USED = 0x0020;
        const SERVER_STATUS_CURSOR_EXISTS = 0x0040;
        const SERVER_STATUS_LAST_ROW_SENT = 0x0080;
        const SERVER_STATUS_DB_DROPPED = 0x0100;
        const SERVER_STATUS_NO_BACKSLASH_ESCAPES = 0x0200;
        const SERVER_STATUS_METADATA_CHANGED = 0x0400;
        const SERVER_QUERY_WAS_SLOW = 0x0800;
        const SERVER_PS_OUT_PARAMS = 0x1000;
        const SERVER_STATUS_IN_TRANS_READONLY = 0x2000;
        const SERVER_SESSION_STATE_CHANGED = 0x4000;
    }
}

bitflags! {
    /// Column definition flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColumnFlags: u16 {
        const NOT_NULL_FLAG = 0x0001;
        const PRI_KEY_FLAG = 0x0002;
        const UNIQUE_KEY_FLAG = 0x0004;
        const MULTIPLE_KEY_FLAG = 0x0008;
        const BLOB_FLAG = 0x0010;
        const UNSIGNED_FLAG = 0x0020;
        const ZEROFILL_FLAG = 0x0040;
        const BINARY_FLAG = 0x0080;
        const ENUM_FLAG = 0x0100;
        const AUTO_INCREMENT_FLAG = 0x0200;
        const TIMESTAMP_FLAG = 0x0400;
        const SET_FLAG = 0x0800;
        const NO_DEFAULT_VALUE_FLAG = 0x1000;
        const ON_UPDATE_NOW_FLAG = 0x2000;
        const PART_KEY_FLAG = 0x4000;
        const NUM_FLAG = 0x8000;
    }
}

/// MySQL column types
#[allow(non_camel_case_types)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    MYSQL_TYPE_DECIMAL = 0x00,
    MYSQL_TYPE_TINY = 0x01,
    MYSQL_TYPE_SHORT = 0x02,
    MYSQL_TYPE_LONG = 0x03,
    MYSQL_TYPE_FLOAT = 0x04,
    MYSQL_TYPE_DOUBLE = 0x05,
    MYSQL_TYPE_NULL = 0x06,
    MYSQL_TYPE_TIMESTAMP = 0x07,
    MYSQL_TYPE_LONGLONG = 0x08,
    MYSQL_TYPE_INT24 = 0x09,
    MYSQL_TYPE_DATE = 0x0a,
    MYSQL_TYPE_TIME = 0x0b,
    MYSQL_TYPE_DATETIME = 0x0c,
    MYSQL_TYPE_YEAR = 0x0d,
    MYSQL_TYPE_NEWDATE = 0x0e,
    MYSQL_TYPE_VARCHAR = 0x0f,
    MYSQL_TYPE_BIT = 0x10,
    MYSQL_TYPE_TIMESTAMP2 = 0x11,
    MYSQL_TYPE_DATETIME2 = 0x12,
    MYSQL_TYPE_TIME2 = 0x13,
    MYSQL_TYPE_TYPED_ARRAY = 0x14,
    MYSQL_TYPE_JSON = 0xf5,
    MYSQL_TYPE_NEWDECIMAL = 0xf6,
    MYSQL_TYPE_ENUM = 0xf7,
    MYSQL_TYPE_SET = 0xf8,
    MYSQL_TYPE_TINY_BLOB = 0xf9,
    MYSQL_TYPE_MEDIUM_BLOB = 0xfa,
    MYSQL_TYPE_LONG_BLOB = 0xfb,
    MYSQL_TYPE_BLOB = 0xfc,
    MYSQL_TYPE_VAR_STRING = 0xfd,
    MYSQL_TYPE_STRING = 0xfe,
    MYSQL_TYPE_GEOMETRY = 0xff,
}

impl ColumnType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use ColumnType::*;
        let ty = match value {
            0x00 => MYSQL_TYPE_DECIMAL,
            0x01 => MYSQL_TYPE_TINY,
            0x02 => MYSQL_TYPE_SHORT,
            0x03 => MYSQL_TYPE_LONG,
            0x04 => MYSQL_TYPE_FLOAT,
            0x05 => MYSQL_TYPE_DOUBLE,
            0x06 => MYSQL_TYPE_NULL,
            0x07 => MYSQL_TYPE_TIMESTAMP,
            0x08 => MYSQL_TYPE_LONGLONG,
            0x09 => MYSQL_TYPE_INT24,
            0x0a => MYSQL_TYPE_DATE,
            0x0b => MYSQL_TYPE_TIME,
            0x0c => MYSQL_TYPE_DATETIME,
            0x0d => MYSQL_TYPE_YEAR,
            0x0e => MYSQL_TYPE_NEWDATE,
            0x0f => MYSQL_TYPE_VARCHAR,
            0x10 => MYSQL_TYPE_BIT,
            0x11 => MYSQL_TYPE_TIMESTAMP2,
            0x12 => MYSQL_TYPE_DATETIME2,
            0x13 => MYSQL_TYPE_TIME2,
            0x14 => MYSQL_TYPE_TYPED_ARRAY,
            0xf5 => MYSQL_TYPE_JSON,
            0xf6 => MYSQL_TYPE_NEWDECIMAL,
            0xf7 => MYSQL_TYPE_ENUM,
            0xf8 => MYSQL_TYPE_SET,
            0xf9 => MYSQL_TYPE_TINY_BLOB,
            0xfa => MYSQL_TYPE_MEDIUM_BLOB,
            0xfb => MYSQL_TYPE_LONG_BLOB,
            0xfc => MYSQL_TYPE_BLOB,
            0xfd => MYSQL_TYPE_VAR_STRING,
            0xfe => MYSQL_TYPE_STRING,
            0xff => MYSQL_TYPE_GEOMETRY,
            _ => return None,
        };
        Some(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes() {
        assert_eq!(CommandByte::StmtPrepare as u8, 0x16);
        assert_eq!(CommandByte::StmtClose as u8, 0x19);
        assert_eq!(CommandByte::StmtReset as u8, 0x1a);
    }

    #[test]
    fn column_type_gap_is_unknown() {
        assert_eq!(ColumnType::from_u8(0x14), Some(ColumnType::MYSQL_TYPE_TYPED_ARRAY));
        assert_eq!(ColumnType::from_u8(0x15), None);
        assert_eq!(ColumnType::from_u8(0xf4), None);
        assert_eq!(ColumnType::from_u8(0xfe), Some(ColumnType::MYSQL_TYPE_STRING));
    }

    #[test]
    fn column_flags_keep_unknown_bits() {
        let flags = ColumnFlags::from_bits_retain(0x4203);
        assert!(flags.contains(ColumnFlags::NOT_NULL_FLAG | ColumnFlags::PRI_KEY_FLAG));
        assert!(flags.contains(ColumnFlags::AUTO_INCREMENT_FLAG));
        assert!(flags.contains(ColumnFlags::PART_KEY_FLAG));
        assert_eq!(flags.bits(), 0x4203);
    }
}
