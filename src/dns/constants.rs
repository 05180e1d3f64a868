/// Length of the fixed message header
pub const HEADER_LEN: usize = 12;

/// Flags for a successful answer: QR, RD, RA set, rcode NOERROR
pub const FLAGS_ANSWER: u16 = 0x8180;

/// Flags for a failed lookup: QR, RD, RA set, rcode NXDOMAIN
pub const FLAGS_NOT_FOUND: u16 = 0x8183;

/// Flags for an outgoing recursive request: RD set
pub const FLAGS_RECURSIVE_QUERY: u16 = 0x0100;

/// Compression pointer to the question name at offset 12
pub const QUESTION_NAME_POINTER: u16 = 0xc00c;

/// TTL placed on every synthesized answer, in seconds
pub const ANSWER_TTL: u32 = 32;

pub const CLASS_IN: u16 = 1;

/// DNS Response Code constants from RFC 1035
pub struct DNSRcode;

impl DNSRcode {
    pub const NOERROR: u8 = 0; // No error
    pub const NXDOMAIN: u8 = 3; // Name error
}
