//! The subset of ASN.1 BER (X.690) that SNMPv1/v2c messages use.
//!
//! Encoding writes definite, minimal lengths. Decoding accepts short and long length forms
//! (up to four length octets) and rejects the indefinite form and multi-byte tags.

use super::oid::Oid;
use super::DecodeError;
use bytes::{BufMut, BytesMut};

pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;

    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIME_TICKS: u8 = 0x43;
    pub const COUNTER64: u8 = 0x46;

    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;

    pub const GET_REQUEST: u8 = 0xA0;
    pub const GET_NEXT_REQUEST: u8 = 0xA1;
    pub const RESPONSE: u8 = 0xA2;
    pub const SET_REQUEST: u8 = 0xA3;
}

/// Longest accepted long-form length (in length octets).
const MAX_LENGTH_OCTETS: usize = 4;

pub fn put_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    buf.put_u8(0x80 | (bytes.len() - skip) as u8);
    buf.put_slice(&bytes[skip..]);
}

pub fn put_tlv(buf: &mut BytesMut, tag: u8, content: &[u8]) {
    buf.put_u8(tag);
    put_length(buf, content.len());
    buf.put_slice(content);
}

/// Minimal two's complement encoding of a signed integer.
pub fn integer_content(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Minimal encoding of an unsigned integer, with a leading zero octet when the high bit is set.
pub fn unsigned_content(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes[..bytes.len() - 1]
        .iter()
        .take_while(|b| **b == 0)
        .count();
    let mut content = Vec::with_capacity(bytes.len() - skip + 1);
    if bytes[skip] & 0x80 != 0 {
        content.push(0x00);
    }
    content.extend_from_slice(&bytes[skip..]);
    content
}

pub fn put_integer(buf: &mut BytesMut, value: i64) {
    put_tlv(buf, tag::INTEGER, &integer_content(value));
}

pub fn oid_content(oid: &Oid) -> Vec<u8> {
    let arcs = oid.arcs();
    let mut content = Vec::with_capacity(arcs.len() + 4);
    put_subidentifier(&mut content, u64::from(arcs[0]) * 40 + u64::from(arcs[1]));
    for arc in &arcs[2..] {
        put_subidentifier(&mut content, u64::from(*arc));
    }
    content
}

fn put_subidentifier(content: &mut Vec<u8>, mut value: u64) {
    let mut groups = [0_u8; 10];
    let mut len = 0;
    loop {
        groups[len] = (value & 0x7F) as u8;
        len += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i == 0 { 0x00 } else { 0x80 };
        content.push(groups[i] | continuation);
    }
}

pub fn put_oid(buf: &mut BytesMut, oid: &Oid) {
    put_tlv(buf, tag::OBJECT_IDENTIFIER, &oid_content(oid));
}

pub fn decode_integer(content: &[u8]) -> Result<i64, DecodeError> {
    match content.len() {
        0 => Err(DecodeError::InvalidInteger("empty integer")),
        len if len > 8 => Err(DecodeError::IntegerOverflow(len)),
        _ => {
            let negative = content[0] & 0x80 != 0;
            let init: i64 = if negative { -1 } else { 0 };
            Ok(content
                .iter()
                .fold(init, |acc, byte| (acc << 8) | i64::from(*byte)))
        }
    }
}

pub fn decode_unsigned(content: &[u8]) -> Result<u64, DecodeError> {
    let digits = match content {
        [] => return Err(DecodeError::InvalidInteger("empty integer")),
        [0x00, rest @ ..] if !rest.is_empty() => rest,
        _ if content[0] & 0x80 != 0 => {
            return Err(DecodeError::InvalidInteger("negative unsigned integer"))
        }
        _ => content,
    };
    if digits.len() > 8 {
        return Err(DecodeError::IntegerOverflow(content.len()));
    }
    Ok(digits
        .iter()
        .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte)))
}

pub fn decode_oid(content: &[u8]) -> Result<Oid, DecodeError> {
    if content.is_empty() {
        return Err(DecodeError::InvalidOid("empty object identifier".to_string()));
    }

    let mut subidentifiers = Vec::with_capacity(content.len());
    let mut value: u64 = 0;
    let mut pending = false;
    for byte in content {
        if !pending && *byte == 0x80 {
            return Err(DecodeError::InvalidOid("non-minimal subidentifier".to_string()));
        }
        value = (value << 7) | u64::from(byte & 0x7F);
        if value > u64::from(u32::MAX) + 80 {
            return Err(DecodeError::InvalidOid("subidentifier exceeds 32 bits".to_string()));
        }
        pending = byte & 0x80 != 0;
        if !pending {
            subidentifiers.push(value);
            value = 0;
        }
    }
    if pending {
        return Err(DecodeError::InvalidOid("truncated subidentifier".to_string()));
    }

    let first = subidentifiers[0];
    let (arc0, arc1) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };

    let mut arcs = Vec::with_capacity(subidentifiers.len() + 1);
    arcs.push(arc0 as u32);
    for arc in std::iter::once(arc1).chain(subidentifiers[1..].iter().copied()) {
        let arc = u32::try_from(arc)
            .map_err(|_| DecodeError::InvalidOid("arc exceeds 32 bits".to_string()))?;
        arcs.push(arc);
    }

    Oid::new(arcs).map_err(|e| DecodeError::InvalidOid(e.to_string()))
}

/// Cursor over a BER-encoded buffer that hands out borrowed TLV contents.
#[derive(Debug, Clone, Copy)]
pub struct BerReader<'a> {
    data: &'a [u8],
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Reads the next TLV, returning its tag and content.
    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), DecodeError> {
        let (&tag, rest) = self
            .data
            .split_first()
            .ok_or(DecodeError::Truncated { needed: 1 })?;
        if tag & 0x1F == 0x1F {
            return Err(DecodeError::HighTagNumber);
        }

        let (&first, rest) = rest
            .split_first()
            .ok_or(DecodeError::Truncated { needed: 1 })?;
        let (len, rest) = match first {
            0x00..=0x7F => (usize::from(first), rest),
            0x80 => return Err(DecodeError::InvalidLength(first)),
            _ => {
                let octets = usize::from(first & 0x7F);
                if octets > MAX_LENGTH_OCTETS {
                    return Err(DecodeError::InvalidLength(first));
                }
                if rest.len() < octets {
                    return Err(DecodeError::Truncated {
                        needed: octets - rest.len(),
                    });
                }
                let len = rest[..octets]
                    .iter()
                    .fold(0_usize, |acc, byte| (acc << 8) | usize::from(*byte));
                (len, &rest[octets..])
            }
        };

        if rest.len() < len {
            return Err(DecodeError::Truncated {
                needed: len - rest.len(),
            });
        }
        let (content, rest) = rest.split_at(len);
        self.data = rest;
        Ok((tag, content))
    }

    /// Reads the next TLV and checks its tag.
    pub fn expect(&mut self, expected: u8) -> Result<&'a [u8], DecodeError> {
        let (found, content) = self.read_tlv()?;
        if found != expected {
            return Err(DecodeError::UnexpectedTag { expected, found });
        }
        Ok(content)
    }

    pub fn read_sequence(&mut self) -> Result<BerReader<'a>, DecodeError> {
        self.expect(tag::SEQUENCE).map(BerReader::new)
    }

    pub fn read_integer(&mut self) -> Result<i64, DecodeError> {
        self.expect(tag::INTEGER).and_then(decode_integer)
    }

    pub fn read_octets(&mut self) -> Result<&'a [u8], DecodeError> {
        self.expect(tag::OCTET_STRING)
    }

    pub fn read_oid(&mut self) -> Result<Oid, DecodeError> {
        self.expect(tag::OBJECT_IDENTIFIER).and_then(decode_oid)
    }
}
