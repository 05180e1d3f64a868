/// Record types the responder distinguishes. Everything else is carried
/// through as `Other` so the raw value survives a round trip.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum QueryType {
    #[default]
    A,
    PTR,
    Other(u16),
}

impl From<u16> for QueryType {
    fn from(value: u16) -> Self {
        match value {
            1 => QueryType::A,
            12 => QueryType::PTR,
            x => QueryType::Other(x),
        }
    }
}

impl From<QueryType> for u16 {
    fn from(value: QueryType) -> Self {
        match value {
            QueryType::A => 1,
            QueryType::PTR => 12,
            QueryType::Other(x) => x,
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryType::A => write!(f, "A"),
            QueryType::PTR => write!(f, "PTR"),
            QueryType::Other(x) => write!(f, "TYPE{}", x),
        }
    }
}
