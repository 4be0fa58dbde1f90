//! Question names in captured DNS payloads.

use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use tracing::trace;

/// Names asked for by A and AAAA questions in a DNS message (UDP payload).
///
/// Payloads that do not decode as DNS are ignored. Names are returned
/// without the trailing root dot.
pub fn question_names(payload: &[u8]) -> Vec<String> {
    let message = match Message::from_vec(payload) {
        Ok(message) => message,
        Err(e) => {
            trace!("Ignoring undecodable DNS payload: {}", e);
            return Vec::new();
        }
    };

    message
        .queries()
        .iter()
        .filter(|query| matches!(query.query_type(), RecordType::A | RecordType::AAAA))
        .map(|query| query.name().to_string().trim_end_matches('.').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Same as [`question_names`] for a DNS-over-TCP segment, which carries a
/// two-byte length prefix.
pub fn question_names_tcp(segment: &[u8]) -> Vec<String> {
    match segment {
        [hi, lo, rest @ ..] => {
            let length = usize::from(u16::from_be_bytes([*hi, *lo]));
            if length == 0 || rest.len() < length {
                return Vec::new();
            }
            question_names(&rest[..length])
        }
        _ => Vec::new(),
    }
}
