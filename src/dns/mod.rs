pub mod common;
pub mod constants;
pub mod enums;
pub mod header;
pub mod message;
pub mod response;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};
use common::PacketComponent;
use enums::QueryType;
use header::DnsHeader;
use thiserror::Error;
use tracing::trace;

pub use response::encode_response;

/// Structural failures while decoding a packet. All of them mean the
/// datagram is malformed and should be dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Truncated DNS header: {0} bytes")]
    TruncatedHeader(usize),

    #[error("Label length exceeds remaining buffer")]
    LabelOverrun,

    #[error("Name is missing its terminating zero-length label")]
    MissingTerminator,

    #[error("Question is missing its type or class")]
    TruncatedQuestion,

    #[error("Invalid compression pointer at offset {0}")]
    InvalidPointer(usize),

    #[error("Label too long: {0} bytes")]
    LabelTooLong(usize),

    #[error("Invalid bit stream: {0}")]
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

/// One decoded DNS question together with the header it arrived in.
///
/// Labels are raw bytes so the question can be echoed exactly as received.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub header: DnsHeader,
    pub labels: Vec<Vec<u8>>,
    pub qtype: QueryType,
    pub qclass: u16,
}

impl Query {
    /// Decode the header and the first question of a request packet.
    ///
    /// Anything after the question (further questions, EDNS0 records) is
    /// ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Decoding DNS query, size: {} bytes", buf.len());
        if buf.len() < constants::HEADER_LEN {
            return Err(ParseError::TruncatedHeader(buf.len()));
        }

        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut query = Query::default();
        query.header.read(&mut reader)?;
        query.read(&mut reader)?;
        Ok(query)
    }

    /// Serialize as a request packet: header, name, type and class.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::with_capacity(constants::HEADER_LEN + self.name_len() + 4);
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);
        self.header.write(&mut writer)?;
        self.write(&mut writer)?;
        Ok(buf)
    }

    /// Dot-joined name; an empty label sequence yields the empty string.
    /// Bytes that are not UTF-8 show up as U+FFFD.
    pub fn domain(&self) -> String {
        join_lossy(self.labels.iter())
    }

    /// IPv4 address named by an `in-addr.arpa` question, in forward order.
    pub fn reverse_address(&self) -> Option<String> {
        if self.labels.len() < 4 {
            return None;
        }
        Some(join_lossy(self.labels[..4].iter().rev()))
    }

    fn name_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }
}

/// Split a dotted name into wire labels, ignoring empty ones.
pub fn name_to_labels(name: &str) -> Vec<Vec<u8>> {
    name.split('.')
        .filter(|l| !l.is_empty())
        .map(|l| l.as_bytes().to_vec())
        .collect()
}

fn join_lossy<'a>(labels: impl Iterator<Item = &'a Vec<u8>>) -> String {
    labels
        .map(|l| String::from_utf8_lossy(l))
        .collect::<Vec<_>>()
        .join(".")
}

impl PacketComponent for Query {
    fn write<E: bitstream_io::Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.qtype.into())?;
        writer.write_var::<u16>(16, self.qclass)?;
        Ok(())
    }

    fn read<E: bitstream_io::Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
    ) -> Result<(), ParseError> {
        self.labels = self.read_labels(reader)?;
        self.qtype = reader
            .read_var::<u16>(16)
            .map_err(|_| ParseError::TruncatedQuestion)?
            .into();
        self.qclass = reader
            .read_var::<u16>(16)
            .map_err(|_| ParseError::TruncatedQuestion)?;
        Ok(())
    }
}
