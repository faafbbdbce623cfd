use super::message::{ErrorStatus, Pdu, PduKind, SnmpMessage, Value, VarBind, Version};
use super::MAX_DATAGRAM_SIZE;
use crate::auth::Community;
use crate::mib::{MibRegistry, MibView};
use bytes::BytesMut;
use tracing::{debug, trace, warn};

/// Answers one request datagram.
///
/// Returns `None` when nothing must be sent back: malformed or unsupported datagrams, a wrong
/// community, or a PDU that is not a request.
pub fn respond(datagram: &[u8], mib: &MibRegistry, community: &Community) -> Option<BytesMut> {
    let request = match SnmpMessage::decode(datagram) {
        Ok(request) => request,
        Err(e) => {
            debug!("Dropping datagram of {} bytes: {}", datagram.len(), e);
            return None;
        }
    };
    trace!("Received {}", request);

    let response = handle_message(request, mib, community)?;
    let encoded = response.encode();
    if encoded.len() <= MAX_DATAGRAM_SIZE {
        return Some(encoded);
    }

    warn!(
        "Response of {} bytes does not fit in a datagram, answering tooBig",
        encoded.len()
    );
    let too_big = SnmpMessage::new(
        response.version,
        response.community,
        Pdu::error(response.pdu.request_id, ErrorStatus::TooBig, 0, Vec::new()),
    );
    Some(too_big.encode())
}

/// Builds the response to an already decoded message.
pub fn handle_message(
    request: SnmpMessage,
    mib: &MibRegistry,
    community: &Community,
) -> Option<SnmpMessage> {
    if !community.permits(&request.community) {
        warn!(
            "Rejected {} request with unknown community",
            request.pdu.kind
        );
        return None;
    }

    let view = mib.view();
    let version = request.version;
    let pdu = request.pdu;
    let response = match pdu.kind {
        PduKind::GetRequest => get(&view, mib, version, pdu),
        PduKind::GetNextRequest => get_next(&view, version, pdu),
        PduKind::SetRequest => reject_set(version, pdu),
        PduKind::Response => {
            debug!("Ignoring unsolicited Response PDU");
            return None;
        }
    };

    Some(SnmpMessage::new(version, request.community, response))
}

fn get(view: &MibView<'_>, mib: &MibRegistry, version: Version, request: Pdu) -> Pdu {
    if version == Version::V1 {
        let missing = request
            .varbinds
            .iter()
            .position(|varbind| view.get(&varbind.oid).is_none());
        if let Some(index) = missing {
            return no_such_name(request, index);
        }
    }

    let varbinds = request
        .varbinds
        .iter()
        .map(|varbind| {
            let value = view.get(&varbind.oid).unwrap_or_else(|| {
                if mib.is_object(&varbind.oid) {
                    Value::NoSuchInstance
                } else {
                    Value::NoSuchObject
                }
            });
            VarBind::new(varbind.oid.clone(), value)
        })
        .collect();
    Pdu::response(request.request_id, varbinds)
}

fn get_next(view: &MibView<'_>, version: Version, request: Pdu) -> Pdu {
    if version == Version::V1 {
        let exhausted = request
            .varbinds
            .iter()
            .position(|varbind| view.get_next(&varbind.oid).is_none());
        if let Some(index) = exhausted {
            return no_such_name(request, index);
        }
    }

    let varbinds = request
        .varbinds
        .iter()
        .map(|varbind| match view.get_next(&varbind.oid) {
            Some((oid, value)) => VarBind::new(oid, value),
            None => VarBind::new(varbind.oid.clone(), Value::EndOfMibView),
        })
        .collect();
    Pdu::response(request.request_id, varbinds)
}

/// v1 fails the whole request, echoing the bindings; `index` is 0-based.
fn no_such_name(request: Pdu, index: usize) -> Pdu {
    Pdu::error(
        request.request_id,
        ErrorStatus::NoSuchName,
        index as i64 + 1,
        request.varbinds,
    )
}

/// Every scalar is read-only.
fn reject_set(version: Version, request: Pdu) -> Pdu {
    let status = match version {
        Version::V1 => ErrorStatus::NoSuchName,
        Version::V2c => ErrorStatus::NotWritable,
    };
    let index = if request.varbinds.is_empty() { 0 } else { 1 };
    Pdu::error(request.request_id, status, index, request.varbinds)
}

#[cfg(test)]
mod handler_tests {
    use super::*;
    use crate::protocol::Oid;
    use bytes::Bytes;
    use metrics::Snapshot;
    use pretty_assertions_sorted::assert_eq;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn mib() -> MibRegistry {
        let mib = MibRegistry::default();
        mib.update(
            &Snapshot::builder()
                .cycle(1)
                .cpu_load_percent(45.3)
                .memory_used_mb(2048.7)
                .os_description("Ubuntu 22.04 (linux)")
                .build(),
        );
        mib
    }

    fn request(version: Version, community: &'static str, kind: PduKind, oids: &[Oid]) -> SnmpMessage {
        SnmpMessage::new(
            version,
            Bytes::from_static(community.as_bytes()),
            Pdu::request(kind, 42, oids),
        )
    }

    fn exchange(request: SnmpMessage, mib: &MibRegistry) -> Option<SnmpMessage> {
        respond(&request.encode(), mib, &Community::new("public"))
            .map(|bytes| SnmpMessage::decode(&bytes).expect("response should decode"))
    }

    #[test]
    fn get_returns_current_values() {
        let mib = mib();
        let response = exchange(
            request(
                Version::V2c,
                "public",
                PduKind::GetRequest,
                &[oid("1.3.6.1.4.1.99999.1.1.0"), oid("1.3.6.1.4.1.99999.1.7.0")],
            ),
            &mib,
        )
        .unwrap();

        assert_eq!(response.version, Version::V2c);
        assert_eq!(response.pdu.kind, PduKind::Response);
        assert_eq!(response.pdu.request_id, 42);
        assert_eq!(response.pdu.error_status, ErrorStatus::NoError);
        assert_eq!(
            response.pdu.varbinds,
            vec![
                VarBind::new(oid("1.3.6.1.4.1.99999.1.1.0"), Value::Integer(45)),
                VarBind::new(
                    oid("1.3.6.1.4.1.99999.1.7.0"),
                    Value::OctetString(Bytes::from_static(b"Ubuntu 22.04 (linux)"))
                ),
            ]
        );
    }

    #[test]
    fn repeated_gets_are_identical() {
        let mib = mib();
        let get = || {
            exchange(
                request(Version::V2c, "public", PduKind::GetRequest, &mib.oids()),
                &mib,
            )
            .unwrap()
        };
        assert_eq!(get(), get());
    }

    #[test]
    fn v2c_get_marks_unknown_oids_per_binding() {
        let mib = mib();
        let response = exchange(
            request(
                Version::V2c,
                "public",
                PduKind::GetRequest,
                &[
                    oid("1.3.6.1.4.1.99999.1.99.0"),
                    oid("1.3.6.1.4.1.99999.1.2.0"),
                    oid("1.3.6.1.4.1.99999.1.2.5"),
                ],
            ),
            &mib,
        )
        .unwrap();

        assert_eq!(response.pdu.error_status, ErrorStatus::NoError);
        let values: Vec<_> = response.pdu.varbinds.into_iter().map(|vb| vb.value).collect();
        assert_eq!(
            values,
            vec![Value::NoSuchObject, Value::Integer(2049), Value::NoSuchInstance]
        );
    }

    #[test]
    fn v1_get_fails_whole_request_on_unknown_oid() {
        let mib = mib();
        let oids = [oid("1.3.6.1.4.1.99999.1.1.0"), oid("1.3.6.1.4.1.99999.1.99.0")];
        let response = exchange(
            request(Version::V1, "public", PduKind::GetRequest, &oids),
            &mib,
        )
        .unwrap();

        assert_eq!(response.version, Version::V1);
        assert_eq!(response.pdu.error_status, ErrorStatus::NoSuchName);
        assert_eq!(response.pdu.error_index, 2);
        // bindings are echoed unchanged
        assert_eq!(
            response.pdu.varbinds,
            oids.iter().cloned().map(VarBind::null).collect::<Vec<_>>()
        );
    }

    #[test]
    fn get_next_walks_then_ends_the_view() {
        let mib = mib();
        let last = oid("1.3.6.1.4.1.99999.1.7.0");
        let response = exchange(
            request(
                Version::V2c,
                "public",
                PduKind::GetNextRequest,
                &[oid("1.3.6.1.4.1.99999.1"), last.clone()],
            ),
            &mib,
        )
        .unwrap();

        assert_eq!(
            response.pdu.varbinds,
            vec![
                VarBind::new(oid("1.3.6.1.4.1.99999.1.1.0"), Value::Integer(45)),
                VarBind::new(last.clone(), Value::EndOfMibView),
            ]
        );

        let v1 = exchange(
            request(Version::V1, "public", PduKind::GetNextRequest, &[last]),
            &mib,
        )
        .unwrap();
        assert_eq!(v1.pdu.error_status, ErrorStatus::NoSuchName);
        assert_eq!(v1.pdu.error_index, 1);
    }

    #[test]
    fn set_is_refused_and_changes_nothing() {
        let mib = mib();
        let target = oid("1.3.6.1.4.1.99999.1.1.0");
        let mut set = request(Version::V2c, "public", PduKind::SetRequest, &[]);
        set.pdu.varbinds = vec![VarBind::new(target.clone(), Value::Integer(0))];

        let response = exchange(set, &mib).unwrap();
        assert_eq!(response.pdu.error_status, ErrorStatus::NotWritable);
        assert_eq!(response.pdu.error_index, 1);
        assert_eq!(mib.get(&target), Some(Value::Integer(45)));

        let v1 = exchange(
            request(Version::V1, "public", PduKind::SetRequest, &[target]),
            &mib,
        )
        .unwrap();
        assert_eq!(v1.pdu.error_status, ErrorStatus::NoSuchName);
    }

    #[test]
    fn wrong_community_gets_no_response() {
        let mib = mib();
        assert_eq!(
            exchange(
                request(Version::V2c, "private", PduKind::GetRequest, &mib.oids()),
                &mib
            ),
            None
        );
    }

    #[test]
    fn malformed_and_non_request_datagrams_are_dropped() {
        let mib = mib();
        let community = Community::new("public");

        assert!(respond(b"", &mib, &community).is_none());
        assert!(respond(&[0x30, 0x03, 0x02, 0x01], &mib, &community).is_none());
        assert!(respond(b"GET /metrics HTTP/1.1\r\n\r\n", &mib, &community).is_none());

        let unsolicited = SnmpMessage::new(
            Version::V2c,
            Bytes::from_static(b"public"),
            Pdu::response(7, Vec::new()),
        );
        assert!(respond(&unsolicited.encode(), &mib, &community).is_none());
    }
}
