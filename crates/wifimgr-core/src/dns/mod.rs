//! Captive-portal DNS response synthesis.
//!
//! A client that joins the fallback access point runs its operating system's
//! captive-portal probe: it resolves some well-known host name and fetches a
//! URL from it.  Answering *every* name query with the device's own address
//! is what makes the OS pop open a browser pointed at the configuration page.
//!
//! Query/response layout (RFC 1035):
//! ```text
//! [ID:2][flags:2][QDCOUNT:2][ANCOUNT:2][NSCOUNT:2][ARCOUNT:2]  -- 12-byte header
//! question: length-prefixed labels, 0 terminator, [QTYPE:2][QCLASS:2]
//! ```
//! The response reuses the query's header and question bytes verbatim and
//! appends a single A record whose name is a compression pointer back to the
//! question (offset 12).  QDCOUNT is preserved as received.
//!
//! This module is pure byte logic; the socket loop lives in the node crate.

use std::net::Ipv4Addr;

/// Well-known DNS port the redirector binds on the AP interface.
pub const DNS_PORT: u16 = 53;

/// Largest datagram the redirector accepts (classic UDP DNS limit).
pub const MAX_DATAGRAM_SIZE: usize = 512;

/// Fixed DNS header length.
pub const HEADER_LEN: usize = 12;

/// Answer TTL in seconds.  Kept short: the redirection is only meaningful
/// while the client is provisioning.
pub const ANSWER_TTL_SECS: u32 = 60;

/// Bytes appended to the echoed query: pointer (2) + type (2) + class (2) +
/// TTL (4) + RDLENGTH (2) + IPv4 address (4).
pub const ANSWER_LEN: usize = 16;

const RR_TYPE_A: u16 = 1;
const RR_CLASS_IN: u16 = 1;

/// Synthesizes the captive-portal response for one DNS query.
///
/// Returns `None` for structurally invalid input – a truncated header, a
/// zero question count, a question name that runs past the end of the
/// datagram, or missing QTYPE/QCLASS bytes.  The caller drops such datagrams
/// silently; a redirector has no application-level client to report to.
///
/// Every structurally valid query is answered with a single A record
/// pointing at `ap_addr`, regardless of the name or query type asked.
///
/// # Examples
///
/// ```rust
/// use std::net::Ipv4Addr;
/// use wifimgr_core::dns::build_redirect_response;
///
/// // ID 0x1234, RD, one question: example.com A IN
/// let mut query = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
/// query.extend_from_slice(b"\x07example\x03com\x00");
/// query.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
///
/// let resp = build_redirect_response(&query, Ipv4Addr::new(192, 168, 4, 1)).unwrap();
/// assert_eq!(&resp[resp.len() - 4..], &[192, 168, 4, 1]);
/// ```
pub fn build_redirect_response(query: &[u8], ap_addr: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < HEADER_LEN {
        return None;
    }

    let qdcount = u16::from_be_bytes([query[4], query[5]]);
    if qdcount == 0 {
        return None;
    }

    // Walk the first question's length-prefixed labels to the 0 terminator.
    let mut pos = HEADER_LEN;
    while pos < query.len() && query[pos] != 0 {
        pos += 1 + query[pos] as usize;
    }
    if pos >= query.len() {
        // Label chain ran off the end without a terminator.
        return None;
    }
    pos += 1; // past the terminator; pos now points at QTYPE

    // QTYPE + QCLASS must be inside the datagram.
    if query.len() < pos + 4 {
        return None;
    }

    let mut resp = Vec::with_capacity(query.len() + ANSWER_LEN);
    resp.extend_from_slice(query);

    resp[2] = 0x81; // QR=1, OPCODE=0, AA=0, TC=0, RD=1
    resp[3] = 0x80; // RA=1, Z=0, RCODE=0

    // QDCOUNT stays as received; one answer, nothing authoritative/additional.
    resp[6] = 0x00;
    resp[7] = 0x01;
    resp[8] = 0x00;
    resp[9] = 0x00;
    resp[10] = 0x00;
    resp[11] = 0x00;

    // Answer: compressed-name pointer to the question name at offset 12.
    resp.extend_from_slice(&[0xC0, HEADER_LEN as u8]);
    resp.extend_from_slice(&RR_TYPE_A.to_be_bytes());
    resp.extend_from_slice(&RR_CLASS_IN.to_be_bytes());
    resp.extend_from_slice(&ANSWER_TTL_SECS.to_be_bytes());
    resp.extend_from_slice(&4u16.to_be_bytes()); // RDLENGTH: one IPv4 address
    resp.extend_from_slice(&ap_addr.octets());

    Some(resp)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const AP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

    /// Builds a standard single-question query for `labels`, e.g.
    /// `&["example", "com"]`.
    fn query_for(labels: &[&str]) -> Vec<u8> {
        let mut q = vec![
            0xAB, 0xCD, // ID
            0x01, 0x00, // flags: RD
            0x00, 0x01, // QDCOUNT = 1
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        for label in labels {
            q.push(label.len() as u8);
            q.extend_from_slice(label.as_bytes());
        }
        q.push(0x00);
        q.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // QTYPE=A, QCLASS=IN
        q
    }

    // ── Valid queries ─────────────────────────────────────────────────────────

    #[test]
    fn test_response_answer_carries_ap_address() {
        let query = query_for(&["example", "com"]);

        let resp = build_redirect_response(&query, AP).expect("valid query");

        assert_eq!(&resp[resp.len() - 4..], &[192, 168, 4, 1]);
    }

    #[test]
    fn test_response_reuses_query_id_and_question_bytes() {
        let query = query_for(&["example", "com"]);

        let resp = build_redirect_response(&query, AP).unwrap();

        assert_eq!(resp.len(), query.len() + ANSWER_LEN);
        assert_eq!(&resp[0..2], &query[0..2], "transaction ID must be echoed");
        assert_eq!(
            &resp[HEADER_LEN..query.len()],
            &query[HEADER_LEN..],
            "question section must be byte-identical"
        );
    }

    #[test]
    fn test_response_flag_bytes_mark_recursion_available_no_error() {
        let resp = build_redirect_response(&query_for(&["a"]), AP).unwrap();
        assert_eq!(resp[2], 0x81, "QR=1, OPCODE=0, RD=1");
        assert_eq!(resp[3], 0x80, "RA=1, RCODE=0");
    }

    #[test]
    fn test_response_counts_one_answer_nothing_else() {
        let resp = build_redirect_response(&query_for(&["test", "local"]), AP).unwrap();
        assert_eq!(&resp[4..6], &[0x00, 0x01], "QDCOUNT preserved");
        assert_eq!(&resp[6..8], &[0x00, 0x01], "ANCOUNT = 1");
        assert_eq!(&resp[8..12], &[0x00, 0x00, 0x00, 0x00], "NS/AR = 0");
    }

    #[test]
    fn test_answer_record_layout_is_byte_exact() {
        let query = query_for(&["example", "com"]);
        let resp = build_redirect_response(&query, AP).unwrap();

        let answer = &resp[query.len()..];
        assert_eq!(
            answer,
            &[
                0xC0, 0x0C, // name pointer to offset 12
                0x00, 0x01, // TYPE A
                0x00, 0x01, // CLASS IN
                0x00, 0x00, 0x00, 0x3C, // TTL 60s
                0x00, 0x04, // RDLENGTH
                192, 168, 4, 1, // RDATA
            ]
        );
    }

    #[test]
    fn test_any_name_resolves_to_ap_address() {
        for labels in [
            vec!["connectivitycheck", "gstatic", "com"],
            vec!["captive", "apple", "com"],
            vec!["a"],
        ] {
            let refs: Vec<&str> = labels.iter().map(|s| *s).collect();
            let resp = build_redirect_response(&query_for(&refs), AP).unwrap();
            assert_eq!(&resp[resp.len() - 4..], &[192, 168, 4, 1]);
        }
    }

    #[test]
    fn test_non_a_query_type_is_still_answered_with_a_record() {
        let mut query = query_for(&["example", "com"]);
        let qtype_off = query.len() - 4;
        query[qtype_off + 1] = 28; // AAAA

        let resp = build_redirect_response(&query, AP).unwrap();
        let answer = &resp[query.len()..];
        assert_eq!(&answer[2..4], &[0x00, 0x01], "answer type is always A");
    }

    // ── Malformed queries ─────────────────────────────────────────────────────

    #[test]
    fn test_short_header_is_dropped() {
        assert_eq!(build_redirect_response(&[0x12, 0x34], AP), None);
        assert_eq!(build_redirect_response(&[0u8; HEADER_LEN - 1], AP), None);
    }

    #[test]
    fn test_zero_question_count_is_dropped() {
        let mut query = query_for(&["example", "com"]);
        query[4] = 0;
        query[5] = 0;
        assert_eq!(build_redirect_response(&query, AP), None);
    }

    #[test]
    fn test_unterminated_name_is_dropped() {
        let mut query = query_for(&["example", "com"]);
        // Chop off everything from the terminator onwards.
        query.truncate(HEADER_LEN + 1 + "example".len() + 1 + "com".len());
        assert_eq!(build_redirect_response(&query, AP), None);
    }

    #[test]
    fn test_label_length_running_past_buffer_is_dropped() {
        let mut query = query_for(&["x"]);
        query[HEADER_LEN] = 0x3F; // claims a 63-byte label that is not there
        assert_eq!(build_redirect_response(&query, AP), None);
    }

    #[test]
    fn test_missing_qtype_qclass_is_dropped() {
        let mut query = query_for(&["example", "com"]);
        query.truncate(query.len() - 2); // keep QTYPE, drop QCLASS
        assert_eq!(build_redirect_response(&query, AP), None);
    }

    #[test]
    fn test_header_only_datagram_with_question_count_is_dropped() {
        // QDCOUNT says 1 but no question section follows.
        let query = vec![0, 0, 0, 0, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        assert_eq!(build_redirect_response(&query, AP), None);
    }
}
