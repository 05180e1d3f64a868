use bitstream_io::{BigEndian, BitWrite, BitWriter};
use std::net::Ipv4Addr;
use tracing::trace;

use super::{
    ParseError, Query,
    common::{PacketComponent, write_name},
    constants::{ANSWER_TTL, CLASS_IN, FLAGS_ANSWER, FLAGS_NOT_FOUND, QUESTION_NAME_POINTER},
    enums::QueryType,
    header::DnsHeader,
};
use crate::target::ResolvedTarget;

/// Build the single-answer response packet for `query`.
///
/// The question is echoed back and followed by one answer whose owner name
/// is a pointer to the question name. Addresses (and the not-found sentinel
/// `0.0.0.0`) are sent as an A record; domain names as a PTR record.
pub fn encode_response(query: &Query, target: &ResolvedTarget) -> Result<Vec<u8>, ParseError> {
    let (rtype, rdata) = match target {
        ResolvedTarget::Address(addr) => (QueryType::A, addr.octets().to_vec()),
        ResolvedTarget::NotFound => (QueryType::A, Ipv4Addr::UNSPECIFIED.octets().to_vec()),
        ResolvedTarget::Name(name) => (QueryType::PTR, encode_name(name)?),
    };

    let header = DnsHeader {
        id: query.header.id,
        flags: if target.is_not_found() {
            FLAGS_NOT_FOUND
        } else {
            FLAGS_ANSWER
        },
        qdcount: query.header.qdcount,
        ancount: 1,
        nscount: query.header.nscount,
        arcount: query.header.arcount,
    };

    let mut buf = Vec::with_capacity(64);
    let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

    header.write(&mut writer)?;
    query.write(&mut writer)?;

    writer.write_var::<u16>(16, QUESTION_NAME_POINTER)?;
    writer.write_var::<u16>(16, rtype.into())?;
    writer.write_var::<u16>(16, CLASS_IN)?;
    writer.write_var::<u32>(32, ANSWER_TTL)?;
    writer.write_var::<u16>(16, rdata.len() as u16)?;
    writer.write_bytes(&rdata)?;

    trace!("Encoded {} byte response for {}: {:02x?}", buf.len(), target, buf);
    Ok(buf)
}

/// Uncompressed wire form of a dotted name
fn encode_name(name: &str) -> Result<Vec<u8>, ParseError> {
    let mut rdata = Vec::with_capacity(name.len() + 2);
    let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut rdata);
    write_name(
        &mut writer,
        name.split('.').filter(|s| !s.is_empty()).map(str::as_bytes),
    )?;
    Ok(rdata)
}
