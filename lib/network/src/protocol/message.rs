use super::ber::{self, tag, BerReader};
use super::oid::Oid;
use super::DecodeError;
use bytes::{Bytes, BytesMut};
use core::fmt;

/// PDU types
///
/// | Tag  |       Name        |                 Description                  |
/// | -    | ----------------- | -------------------------------------------- |
/// | 0xA0 | GetRequest        | Read the value bound to each OID             |
/// | 0xA1 | GetNextRequest    | Read the value of each OID's successor       |
/// | 0xA2 | Response          | Agent reply to any request                   |
/// | 0xA3 | SetRequest        | Write values (refused, the MIB is read-only) |
///
/// Traps, informs, GETBULK and reports are not supported and fail to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
}

impl PduKind {
    pub fn from_tag(value: u8) -> Result<Self, DecodeError> {
        match value {
            tag::GET_REQUEST => Ok(PduKind::GetRequest),
            tag::GET_NEXT_REQUEST => Ok(PduKind::GetNextRequest),
            tag::RESPONSE => Ok(PduKind::Response),
            tag::SET_REQUEST => Ok(PduKind::SetRequest),
            other => Err(DecodeError::UnsupportedPdu(other)),
        }
    }

    pub fn to_tag(self) -> u8 {
        match self {
            PduKind::GetRequest => tag::GET_REQUEST,
            PduKind::GetNextRequest => tag::GET_NEXT_REQUEST,
            PduKind::Response => tag::RESPONSE,
            PduKind::SetRequest => tag::SET_REQUEST,
        }
    }
}

impl fmt::Display for PduKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PduKind::GetRequest => write!(f, "GetRequest"),
            PduKind::GetNextRequest => write!(f, "GetNextRequest"),
            PduKind::Response => write!(f, "Response"),
            PduKind::SetRequest => write!(f, "SetRequest"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2c,
}

impl Version {
    pub fn from_wire(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(Version::V1),
            1 => Ok(Version::V2c),
            other => Err(DecodeError::UnsupportedVersion(other)),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Version::V1 => write!(f, "v1"),
            Version::V2c => write!(f, "v2c"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    NotWritable,
    Other(i64),
}

impl ErrorStatus {
    pub fn from_wire(value: i64) -> Self {
        match value {
            0 => ErrorStatus::NoError,
            1 => ErrorStatus::TooBig,
            2 => ErrorStatus::NoSuchName,
            3 => ErrorStatus::BadValue,
            4 => ErrorStatus::ReadOnly,
            5 => ErrorStatus::GenErr,
            6 => ErrorStatus::NoAccess,
            17 => ErrorStatus::NotWritable,
            other => ErrorStatus::Other(other),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            ErrorStatus::NoError => 0,
            ErrorStatus::TooBig => 1,
            ErrorStatus::NoSuchName => 2,
            ErrorStatus::BadValue => 3,
            ErrorStatus::ReadOnly => 4,
            ErrorStatus::GenErr => 5,
            ErrorStatus::NoAccess => 6,
            ErrorStatus::NotWritable => 17,
            ErrorStatus::Other(value) => value,
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorStatus::NoError => write!(f, "noError"),
            ErrorStatus::TooBig => write!(f, "tooBig"),
            ErrorStatus::NoSuchName => write!(f, "noSuchName"),
            ErrorStatus::BadValue => write!(f, "badValue"),
            ErrorStatus::ReadOnly => write!(f, "readOnly"),
            ErrorStatus::GenErr => write!(f, "genErr"),
            ErrorStatus::NoAccess => write!(f, "noAccess"),
            ErrorStatus::NotWritable => write!(f, "notWritable"),
            ErrorStatus::Other(value) => write!(f, "error({})", value),
        }
    }
}

/// A value bound to an OID, including the SNMPv2c exception markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Bytes),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    /// Any other application or context type, kept verbatim.
    Other { tag: u8, data: Bytes },
}

impl Value {
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_octets(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(value) => Some(value),
            _ => None,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Value::Integer(value) => ber::put_integer(buf, *value),
            Value::OctetString(value) => ber::put_tlv(buf, tag::OCTET_STRING, value),
            Value::Null => ber::put_tlv(buf, tag::NULL, &[]),
            Value::ObjectIdentifier(oid) => ber::put_oid(buf, oid),
            Value::IpAddress(octets) => ber::put_tlv(buf, tag::IP_ADDRESS, octets),
            Value::Counter32(value) => {
                ber::put_tlv(buf, tag::COUNTER32, &ber::unsigned_content(u64::from(*value)))
            }
            Value::Gauge32(value) => {
                ber::put_tlv(buf, tag::GAUGE32, &ber::unsigned_content(u64::from(*value)))
            }
            Value::TimeTicks(value) => {
                ber::put_tlv(buf, tag::TIME_TICKS, &ber::unsigned_content(u64::from(*value)))
            }
            Value::Counter64(value) => {
                ber::put_tlv(buf, tag::COUNTER64, &ber::unsigned_content(*value))
            }
            Value::NoSuchObject => ber::put_tlv(buf, tag::NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => ber::put_tlv(buf, tag::NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => ber::put_tlv(buf, tag::END_OF_MIB_VIEW, &[]),
            Value::Other { tag, data } => ber::put_tlv(buf, *tag, data),
        }
    }

    fn decode(value_tag: u8, content: &[u8]) -> Result<Self, DecodeError> {
        let unsigned32 = |field: &'static str| -> Result<u32, DecodeError> {
            let value = ber::decode_unsigned(content)?;
            u32::try_from(value).map_err(|_| DecodeError::OutOfRange {
                field,
                value: value as i64,
            })
        };

        Ok(match value_tag {
            tag::INTEGER => Value::Integer(ber::decode_integer(content)?),
            tag::OCTET_STRING => Value::OctetString(Bytes::copy_from_slice(content)),
            tag::NULL => Value::Null,
            tag::OBJECT_IDENTIFIER => Value::ObjectIdentifier(ber::decode_oid(content)?),
            tag::IP_ADDRESS => {
                let octets = <[u8; 4]>::try_from(content).map_err(|_| DecodeError::OutOfRange {
                    field: "IpAddress length",
                    value: content.len() as i64,
                })?;
                Value::IpAddress(octets)
            }
            tag::COUNTER32 => Value::Counter32(unsigned32("Counter32")?),
            tag::GAUGE32 => Value::Gauge32(unsigned32("Gauge32")?),
            tag::TIME_TICKS => Value::TimeTicks(unsigned32("TimeTicks")?),
            tag::COUNTER64 => Value::Counter64(ber::decode_unsigned(content)?),
            tag::NO_SUCH_OBJECT => Value::NoSuchObject,
            tag::NO_SUCH_INSTANCE => Value::NoSuchInstance,
            tag::END_OF_MIB_VIEW => Value::EndOfMibView,
            other => Value::Other {
                tag: other,
                data: Bytes::copy_from_slice(content),
            },
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "INTEGER: {}", value),
            Value::OctetString(value) => {
                write!(f, "STRING: \"{}\"", String::from_utf8_lossy(value))
            }
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "OID: {}", oid),
            Value::IpAddress([a, b, c, d]) => write!(f, "IpAddress: {}.{}.{}.{}", a, b, c, d),
            Value::Counter32(value) => write!(f, "Counter32: {}", value),
            Value::Gauge32(value) => write!(f, "Gauge32: {}", value),
            Value::TimeTicks(value) => write!(f, "Timeticks: ({})", value),
            Value::Counter64(value) => write!(f, "Counter64: {}", value),
            Value::NoSuchObject => write!(f, "No Such Object available on this agent at this OID"),
            Value::NoSuchInstance => {
                write!(f, "No Such Instance currently exists at this OID")
            }
            Value::EndOfMibView => write!(f, "No more variables left in this MIB View"),
            Value::Other { tag, data } => write!(f, "[{:#04x}]: {:02x?}", tag, data.as_ref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

impl VarBind {
    pub fn new(oid: Oid, value: Value) -> Self {
        VarBind { oid, value }
    }

    /// The request form of a binding: the OID with a NULL placeholder.
    pub fn null(oid: Oid) -> Self {
        VarBind::new(oid, Value::Null)
    }
}

impl fmt::Display for VarBind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduKind,
    pub request_id: i32,
    pub error_status: ErrorStatus,
    /// 1-based position of the offending binding, 0 when `error_status` is `noError`.
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    pub fn request(kind: PduKind, request_id: i32, oids: &[Oid]) -> Self {
        Pdu {
            kind,
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    pub fn response(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Pdu {
            kind: PduKind::Response,
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            varbinds,
        }
    }

    pub fn error(
        request_id: i32,
        error_status: ErrorStatus,
        error_index: i64,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Pdu {
            kind: PduKind::Response,
            request_id,
            error_status,
            error_index,
            varbinds,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        let mut varbinds = BytesMut::new();
        for varbind in &self.varbinds {
            let mut binding = BytesMut::new();
            ber::put_oid(&mut binding, &varbind.oid);
            varbind.value.encode(&mut binding);
            ber::put_tlv(&mut varbinds, tag::SEQUENCE, &binding);
        }

        let mut body = BytesMut::new();
        ber::put_integer(&mut body, i64::from(self.request_id));
        ber::put_integer(&mut body, self.error_status.to_wire());
        ber::put_integer(&mut body, self.error_index);
        ber::put_tlv(&mut body, tag::SEQUENCE, &varbinds);

        ber::put_tlv(buf, self.kind.to_tag(), &body);
    }

    fn decode(reader: &mut BerReader<'_>) -> Result<Self, DecodeError> {
        let (pdu_tag, content) = reader.read_tlv()?;
        let kind = PduKind::from_tag(pdu_tag)?;
        let mut body = BerReader::new(content);

        let request_id = body.read_integer()?;
        let request_id = i32::try_from(request_id).map_err(|_| DecodeError::OutOfRange {
            field: "request-id",
            value: request_id,
        })?;
        let error_status = ErrorStatus::from_wire(body.read_integer()?);
        let error_index = body.read_integer()?;

        let mut list = body.read_sequence()?;
        ensure_consumed(&body)?;

        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut binding = list.read_sequence()?;
            let oid = binding.read_oid()?;
            let (value_tag, value) = binding.read_tlv()?;
            ensure_consumed(&binding)?;
            varbinds.push(VarBind::new(oid, Value::decode(value_tag, value)?));
        }

        Ok(Pdu {
            kind,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

/// A complete community-based SNMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpMessage {
    pub version: Version,
    pub community: Bytes,
    pub pdu: Pdu,
}

impl fmt::Display for SnmpMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {{ request_id: {}, error: {}@{}, varbinds: {} }}",
            self.version,
            self.pdu.kind,
            self.pdu.request_id,
            self.pdu.error_status,
            self.pdu.error_index,
            self.pdu.varbinds.len()
        )
    }
}

impl SnmpMessage {
    pub fn new(version: Version, community: Bytes, pdu: Pdu) -> Self {
        SnmpMessage {
            version,
            community,
            pdu,
        }
    }

    pub fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        ber::put_integer(&mut body, self.version.to_wire());
        ber::put_tlv(&mut body, tag::OCTET_STRING, &self.community);
        self.pdu.encode(&mut body);

        let mut buf = BytesMut::with_capacity(body.len() + 4);
        ber::put_tlv(&mut buf, tag::SEQUENCE, &body);
        buf
    }

    /// Decodes exactly one message; bytes after it are an error.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = BerReader::new(data);
        let mut message = reader.read_sequence()?;
        ensure_consumed(&reader)?;

        let version = Version::from_wire(message.read_integer()?)?;
        let community = Bytes::copy_from_slice(message.read_octets()?);
        let pdu = Pdu::decode(&mut message)?;
        ensure_consumed(&message)?;

        Ok(SnmpMessage {
            version,
            community,
            pdu,
        })
    }
}

fn ensure_consumed(reader: &BerReader<'_>) -> Result<(), DecodeError> {
    match reader.remaining() {
        0 => Ok(()),
        extra => Err(DecodeError::TrailingBytes(extra)),
    }
}

#[cfg(test)]
mod message_tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    /// `snmpget -v2c -c public <agent> 1.3.6.1.2.1.1.1.0` as captured on the wire.
    const SYS_DESCR_GET: [u8; 43] = [
        0x30, 0x29, // message
        0x02, 0x01, 0x01, // version: v2c
        0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', // community
        0xA0, 0x1C, // GetRequest
        0x02, 0x04, 0x12, 0x34, 0x56, 0x78, // request-id
        0x02, 0x01, 0x00, // error-status
        0x02, 0x01, 0x00, // error-index
        0x30, 0x0E, // varbind list
        0x30, 0x0C, // varbind
        0x06, 0x08, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, // 1.3.6.1.2.1.1.1.0
        0x05, 0x00, // NULL
    ];

    #[test]
    fn decodes_captured_get_request() {
        let message = SnmpMessage::decode(&SYS_DESCR_GET).unwrap();

        assert_eq!(message.version, Version::V2c);
        assert_eq!(message.community.as_ref(), b"public");
        assert_eq!(message.pdu.kind, PduKind::GetRequest);
        assert_eq!(message.pdu.request_id, 0x1234_5678);
        assert_eq!(message.pdu.error_status, ErrorStatus::NoError);
        assert_eq!(
            message.pdu.varbinds,
            vec![VarBind::null(oid("1.3.6.1.2.1.1.1.0"))]
        );
    }

    #[test]
    fn encodes_byte_for_byte() {
        let message = SnmpMessage::new(
            Version::V2c,
            Bytes::from_static(b"public"),
            Pdu::request(PduKind::GetRequest, 0x1234_5678, &[oid("1.3.6.1.2.1.1.1.0")]),
        );
        assert_eq!(message.encode().to_vec(), SYS_DESCR_GET.to_vec());
    }

    #[test]
    fn response_with_every_value_type_survives_the_wire() {
        let base = oid("1.3.6.1.4.1.99999.1");
        let varbinds = vec![
            VarBind::new(base.child(1).child(0), Value::Integer(45)),
            VarBind::new(base.child(2).child(0), Value::Integer(-2049)),
            VarBind::new(
                base.child(7).child(0),
                Value::OctetString(Bytes::from_static("Ubuntu 22.04 (linux)".as_bytes())),
            ),
            VarBind::new(base.child(8).child(0), Value::ObjectIdentifier(base.clone())),
            VarBind::new(base.child(9).child(0), Value::IpAddress([127, 0, 0, 1])),
            VarBind::new(base.child(10).child(0), Value::Counter32(u32::MAX)),
            VarBind::new(base.child(11).child(0), Value::Gauge32(7)),
            VarBind::new(base.child(12).child(0), Value::TimeTicks(360_000)),
            VarBind::new(base.child(13).child(0), Value::Counter64(u64::MAX)),
            VarBind::new(base.child(14).child(0), Value::NoSuchObject),
            VarBind::new(base.child(15).child(0), Value::NoSuchInstance),
            VarBind::new(base.child(16).child(0), Value::EndOfMibView),
        ];
        let message = SnmpMessage::new(
            Version::V1,
            Bytes::from_static(b"public"),
            Pdu::error(-5, ErrorStatus::NoSuchName, 3, varbinds),
        );

        assert_eq!(SnmpMessage::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn long_messages_use_long_form_lengths() {
        let text = "x".repeat(255);
        let message = SnmpMessage::new(
            Version::V2c,
            Bytes::from_static(b"public"),
            Pdu::response(
                1,
                vec![VarBind::new(
                    oid("1.3.6.1.4.1.99999.1.7.0"),
                    Value::OctetString(Bytes::from(text)),
                )],
            ),
        );

        let encoded = message.encode();
        assert_eq!(&encoded[..2], &[0x30, 0x82]);
        assert_eq!(SnmpMessage::decode(&encoded).unwrap(), message);
    }

    #[test]
    fn rejects_unsupported_versions_and_pdus() {
        let mut v3 = SYS_DESCR_GET;
        v3[4] = 0x03;
        assert_eq!(
            SnmpMessage::decode(&v3),
            Err(DecodeError::UnsupportedVersion(3))
        );

        let mut bulk = SYS_DESCR_GET;
        bulk[13] = 0xA5;
        assert_eq!(
            SnmpMessage::decode(&bulk),
            Err(DecodeError::UnsupportedPdu(0xA5))
        );
    }

    #[test]
    fn rejects_truncated_and_padded_datagrams() {
        assert!(SnmpMessage::decode(&SYS_DESCR_GET[..20]).is_err());
        assert!(SnmpMessage::decode(&[]).is_err());
        assert!(SnmpMessage::decode(b"GET /metrics HTTP/1.1\r\n").is_err());

        let mut padded = SYS_DESCR_GET.to_vec();
        padded.push(0x00);
        assert_eq!(
            SnmpMessage::decode(&padded),
            Err(DecodeError::TrailingBytes(1))
        );
    }

    #[test]
    fn value_display_matches_net_snmp_style() {
        assert_eq!(Value::Integer(45).to_string(), "INTEGER: 45");
        assert_eq!(
            Value::OctetString(Bytes::from_static(b"Linux")).to_string(),
            "STRING: \"Linux\""
        );
        assert!(Value::EndOfMibView.is_exception());
        assert!(!Value::Null.is_exception());
    }
}
