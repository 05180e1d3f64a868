//! Requests to and responses from upstream servers.
//!
//! Unlike incoming queries, upstream answers use name compression freely,
//! so records are read with an offset-tracking reader that can follow
//! pointers back into the packet.

use std::net::Ipv4Addr;

use super::{
    ParseError, Query, name_to_labels,
    constants::{CLASS_IN, FLAGS_RECURSIVE_QUERY, HEADER_LEN},
    enums::QueryType,
    header::DnsHeader,
};

/// Upper bound on pointer hops within a single name
const MAX_POINTER_HOPS: usize = 64;
const MAX_NAME_LEN: usize = 255;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    Ptr(String),
    Other(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerRecord {
    pub name: String,
    pub rtype: QueryType,
    pub rclass: u16,
    pub ttl: u32,
    pub data: RecordData,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMessage {
    pub header: DnsHeader,
    pub answers: Vec<AnswerRecord>,
}

/// Build a recursion-desired request for `name`.
pub fn build_request(id: u16, name: &str, qtype: QueryType) -> Result<Vec<u8>, ParseError> {
    let query = Query {
        header: DnsHeader {
            id,
            flags: FLAGS_RECURSIVE_QUERY,
            qdcount: 1,
            ..Default::default()
        },
        labels: name_to_labels(name),
        qtype,
        qclass: CLASS_IN,
    };
    query.to_bytes()
}

impl ResponseMessage {
    /// Parse the header, skip the question section, and read every answer
    /// record. Authority and additional sections are not read.
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < HEADER_LEN {
            return Err(ParseError::TruncatedHeader(buf.len()));
        }
        let mut reader = MessageReader::new(buf);
        let header = DnsHeader {
            id: reader.u16()?,
            flags: reader.u16()?,
            qdcount: reader.u16()?,
            ancount: reader.u16()?,
            nscount: reader.u16()?,
            arcount: reader.u16()?,
        };

        for _ in 0..header.qdcount {
            reader.name()?;
            reader.u16()?;
            reader.u16()?;
        }

        let mut answers = Vec::with_capacity(header.ancount as usize);
        for _ in 0..header.ancount {
            answers.push(reader.answer()?);
        }

        Ok(ResponseMessage { header, answers })
    }

    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        self.answers
            .iter()
            .filter_map(|a| match a.data {
                RecordData::A(addr) => Some(addr),
                _ => None,
            })
            .collect()
    }

    pub fn ptr_names(&self) -> Vec<String> {
        self.answers
            .iter()
            .filter_map(|a| match &a.data {
                RecordData::Ptr(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

struct MessageReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self.pos.checked_add(n).ok_or(ParseError::LabelOverrun)?;
        let bytes = self.buf.get(self.pos..end).ok_or(ParseError::LabelOverrun)?;
        self.pos = end;
        Ok(bytes)
    }

    fn u16(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a possibly compressed name starting at the current position.
    fn name(&mut self) -> Result<String, ParseError> {
        let (name, end) = read_name_at(self.buf, self.pos)?;
        self.pos = end;
        Ok(name)
    }

    fn answer(&mut self) -> Result<AnswerRecord, ParseError> {
        let name = self.name()?;
        let rtype = QueryType::from(self.u16()?);
        let rclass = self.u16()?;
        let ttl = self.u32()?;
        let rdlength = self.u16()? as usize;
        let rdata_start = self.pos;
        let rdata = self.take(rdlength)?;

        let data = match rtype {
            QueryType::A if rdlength == 4 => {
                RecordData::A(Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]))
            }
            QueryType::PTR => {
                let (target, end) = read_name_at(self.buf, rdata_start)?;
                if end > rdata_start + rdlength {
                    return Err(ParseError::LabelOverrun);
                }
                RecordData::Ptr(target)
            }
            _ => RecordData::Other(rdata.to_vec()),
        };

        Ok(AnswerRecord {
            name,
            rtype,
            rclass,
            ttl,
            data,
        })
    }
}

/// Read the name at `start`, returning it with the offset just past its
/// in-place encoding (after the first pointer, if any).
fn read_name_at(buf: &[u8], start: usize) -> Result<(String, usize), ParseError> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = start;
    let mut end = None;
    let mut hops = 0;
    let mut total = 0;

    loop {
        let len = *buf.get(pos).ok_or(ParseError::MissingTerminator)?;
        match len & 0xc0 {
            0x00 => {
                if len == 0 {
                    end.get_or_insert(pos + 1);
                    break;
                }
                let label = buf
                    .get(pos + 1..pos + 1 + len as usize)
                    .ok_or(ParseError::LabelOverrun)?;
                total += len as usize + 1;
                if total > MAX_NAME_LEN {
                    return Err(ParseError::LabelTooLong(total));
                }
                labels.push(String::from_utf8_lossy(label).into_owned());
                pos += 1 + len as usize;
            }
            0xc0 => {
                let low = *buf.get(pos + 1).ok_or(ParseError::InvalidPointer(pos))?;
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(ParseError::InvalidPointer(pos));
                }
                end.get_or_insert(pos + 2);
                pos = (((len & 0x3f) as usize) << 8) | low as usize;
            }
            _ => return Err(ParseError::InvalidPointer(pos)),
        }
    }

    Ok((labels.join("."), end.unwrap_or(pos + 1)))
}
