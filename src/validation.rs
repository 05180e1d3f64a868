//! Input validation helpers

use std::net::Ipv4Addr;

/// Parse a dotted-quad IPv4 literal.
///
/// Accepts exactly four groups of one to three decimal digits, each at most
/// 255, with a first octet of at least 1. Leading zeros are permitted, so
/// `"010.1.1.1"` parses as `10.1.1.1`.
pub fn parse_ipv4_literal(text: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut groups = text.split('.');

    for octet in octets.iter_mut() {
        let group = groups.next()?;
        if group.is_empty() || group.len() > 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = group.parse::<u16>().ok().and_then(|v| u8::try_from(v).ok())?;
    }

    if groups.next().is_some() || octets[0] < 1 {
        return None;
    }

    Some(Ipv4Addr::from(octets))
}

/// Whether `text` is a dotted-quad IPv4 literal accepted by [`parse_ipv4_literal`]
pub fn is_ipv4_literal(text: &str) -> bool {
    parse_ipv4_literal(text).is_some()
}
