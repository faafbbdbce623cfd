//! SNMPv1/v2c wire format: BER primitives, object identifiers, messages and the request
//! handler that answers GET, GETNEXT and SET against the MIB registry.

use thiserror::Error;

pub mod ber;
pub mod handler;
pub mod message;
pub mod oid;

pub use message::{ErrorStatus, Pdu, PduKind, SnmpMessage, Value, VarBind, Version};
pub use oid::{Oid, OidError};

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unexpected end of data: {needed} more bytes needed")]
    Truncated { needed: usize },
    #[error("Expected tag {expected:#04x}, found {found:#04x}")]
    UnexpectedTag { expected: u8, found: u8 },
    #[error("Unsupported length encoding (first length octet {0:#04x})")]
    InvalidLength(u8),
    #[error("Multi-byte tags are not supported")]
    HighTagNumber,
    #[error("Invalid integer: {0}")]
    InvalidInteger(&'static str),
    #[error("Integer of {0} bytes does not fit in 64 bits")]
    IntegerOverflow(usize),
    #[error("Invalid object identifier: {0}")]
    InvalidOid(String),
    #[error("`{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("Unsupported SNMP version {0}")]
    UnsupportedVersion(i64),
    #[error("Unsupported PDU type {0:#04x}")]
    UnsupportedPdu(u8),
    #[error("{0} trailing bytes after the message")]
    TrailingBytes(usize),
}
