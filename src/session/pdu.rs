//! Wrapping a job's PDU in the `SEQUENCE[version, community, pdu]` envelope,
//! stamping it with a fresh request-id, and validating/parsing what comes
//! back.

use crate::ber::tag;
use crate::job::{AgentError, Binding, ErrorStatus};
use crate::oid::Oid;
use crate::value::Value;

/// Build the full outer message for a PDU a job produced: `version`,
/// `community`, then the PDU with its request-id slot overwritten.
pub fn wrap(version: i32, community: &str, request_id: i32, mut pdu: Value) -> Value {
    set_request_id(&mut pdu, request_id);
    let mut envelope = Value::sequence();
    envelope.add_child(Value::integer(version));
    envelope.add_child(Value::string(community.as_bytes().to_vec()));
    envelope.add_child(pdu);
    envelope
}

/// Rewrite the request-id on an already-built PDU (its first child), used to
/// retransmit a timed-out request under a fresh id without rebuilding it.
pub fn set_request_id(pdu: &mut Value, request_id: i32) {
    let mut new_pdu = Value::pdu(pdu.tag());
    new_pdu.add_child(Value::integer(request_id));
    for child in pdu.children().iter().skip(1) {
        new_pdu.add_child(child.clone());
    }
    *pdu = new_pdu;
}

/// The outcome of validating one received top-level message against the
/// request-id we are currently waiting for.
pub enum ParsedResponse {
    /// Matched our outstanding request-id; bindings and/or agent error.
    Matched {
        bindings: Vec<Binding>,
        error: Option<AgentError>,
    },
    /// Well-formed but answers a different request-id (stale retry, or a
    /// reply meant for someone else on a shared socket). Ignore silently.
    Mismatched { response_id: i32 },
    /// Failed a structural check; the caller logs and drops it.
    Malformed(&'static str),
}

/// Validate and interpret one decoded top-level `Value` as a GET-RESPONSE,
/// per the structural rules: 3-child envelope, GET-RESPONSE PDU, 4-child
/// PDU, integer request-id/error-status/error-index, SEQUENCE of bindings.
pub fn parse_message(message: &Value, expected_request_id: i32) -> ParsedResponse {
    if message.children().len() != 3 {
        return ParsedResponse::Malformed("expected a 3-child top-level SEQUENCE");
    }
    let pdu = &message.children()[2];
    if pdu.tag() != tag::GET_RESPONSE {
        return ParsedResponse::Malformed("expected a GET-RESPONSE PDU");
    }
    let fields = pdu.children();
    if fields.len() != 4 {
        return ParsedResponse::Malformed("expected a 4-child GET-RESPONSE");
    }
    let (request_id_v, error_status_v, error_index_v, bindings_v) =
        (&fields[0], &fields[1], &fields[2], &fields[3]);
    if request_id_v.tag() != tag::INTEGER
        || error_status_v.tag() != tag::INTEGER
        || error_index_v.tag() != tag::INTEGER
    {
        return ParsedResponse::Malformed("request-id/error-status/error-index must be INTEGER");
    }

    let response_id = request_id_v.as_i64().unwrap_or_default() as i32;
    if response_id != expected_request_id {
        return ParsedResponse::Mismatched {
            response_id,
        };
    }

    let error_status = error_status_v.as_i64().unwrap_or_default();
    let error_index = error_index_v.as_i64().unwrap_or_default();
    if error_status != 0 || error_index != 0 {
        return ParsedResponse::Matched {
            bindings: Vec::new(),
            error: Some(AgentError {
                status: ErrorStatus::from_code(error_status),
                index: error_index,
            }),
        };
    }

    if bindings_v.tag() != tag::SEQUENCE {
        return ParsedResponse::Malformed("variable-bindings must be a SEQUENCE");
    }

    let mut bindings = Vec::with_capacity(bindings_v.children().len());
    for pair in bindings_v.children() {
        if pair.tag() != tag::SEQUENCE || pair.children().len() != 2 {
            return ParsedResponse::Malformed("each binding must be a 2-child SEQUENCE");
        }
        let object = &pair.children()[0];
        if object.tag() != tag::OBJECT {
            return ParsedResponse::Malformed("binding's first child must be OBJECT");
        }
        let Some(oid) = object.as_text().and_then(|t| t.parse::<Oid>().ok()) else {
            return ParsedResponse::Malformed("binding's OID failed to parse");
        };
        let value = pair.children()[1].clone().with_address(oid.clone());
        bindings.push(Binding { oid, value });
    }

    ParsedResponse::Matched {
        bindings,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_response(request_id: i32, error_status: i32, error_index: i32, bindings: Value) -> Value {
        let mut pdu = Value::pdu(tag::GET_RESPONSE);
        pdu.add_child(Value::integer(request_id));
        pdu.add_child(Value::integer(error_status));
        pdu.add_child(Value::integer(error_index));
        pdu.add_child(bindings);
        let mut envelope = Value::sequence();
        envelope.add_child(Value::integer(1));
        envelope.add_child(Value::string(b"public".to_vec()));
        envelope.add_child(pdu);
        envelope
    }

    #[test]
    fn wraps_and_stamps_request_id() {
        let mut pdu = Value::pdu(tag::GET_REQUEST);
        pdu.add_child(Value::integer(0));
        pdu.add_child(Value::integer(0));
        pdu.add_child(Value::integer(0));
        let wrapped = wrap(1, "public", 0x42, pdu);
        assert_eq!(wrapped.children()[2].children()[0].as_i64(), Some(0x42));
    }

    #[test]
    fn matches_and_extracts_bindings() {
        let oid: Oid = ".1.3.6.1.2.1.1.5.0".parse().unwrap();
        let mut pair = Value::sequence();
        pair.add_child(Value::oid(&oid.to_text()).unwrap());
        pair.add_child(Value::string(b"host-A".to_vec()));
        let mut bindings = Value::sequence();
        bindings.add_child(pair);
        let response = get_response(7, 0, 0, bindings);

        match parse_message(&response, 7) {
            ParsedResponse::Matched { bindings, error } => {
                assert!(error.is_none());
                assert_eq!(bindings.len(), 1);
                assert_eq!(bindings[0].oid, oid);
                assert_eq!(bindings[0].value.as_text().as_deref(), Some("host-A"));
            }
            _ => panic!("expected Matched"),
        }
    }

    #[test]
    fn mismatched_request_id_is_ignored() {
        let response = get_response(9, 0, 0, Value::sequence());
        match parse_message(&response, 7) {
            ParsedResponse::Mismatched { response_id } => assert_eq!(response_id, 9),
            _ => panic!("expected Mismatched"),
        }
    }

    #[test]
    fn agent_error_is_surfaced() {
        let response = get_response(7, 2, 1, Value::sequence());
        match parse_message(&response, 7) {
            ParsedResponse::Matched { bindings, error } => {
                assert!(bindings.is_empty());
                let err = error.unwrap();
                assert_eq!(err.status, ErrorStatus::NoSuchName);
                assert_eq!(err.index, 1);
            }
            _ => panic!("expected Matched"),
        }
    }

    #[test]
    fn rejects_wrong_child_count() {
        let mut envelope = Value::sequence();
        envelope.add_child(Value::integer(1));
        match parse_message(&envelope, 7) {
            ParsedResponse::Malformed(_) => {}
            _ => panic!("expected Malformed"),
        }
    }
}
