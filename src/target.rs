use std::fmt;
use std::net::Ipv4Addr;

use crate::validation::parse_ipv4_literal;

/// Outcome of resolving one query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ResolvedTarget {
    Address(Ipv4Addr),
    /// A domain name, the answer to a reverse lookup
    Name(String),
    /// Encoded on the wire as `0.0.0.0` with the not-found flags
    #[default]
    NotFound,
}

impl ResolvedTarget {
    /// Interpret a stored or resolved value. Text that is not a valid IPv4
    /// literal is taken to be a domain name; `0.0.0.0` is the sentinel.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim().trim_end_matches('.');
        if text.is_empty() || text == "0.0.0.0" {
            return ResolvedTarget::NotFound;
        }
        match parse_ipv4_literal(text) {
            Some(addr) => ResolvedTarget::Address(addr),
            None => ResolvedTarget::Name(text.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolvedTarget::NotFound)
    }
}

impl From<Ipv4Addr> for ResolvedTarget {
    fn from(addr: Ipv4Addr) -> Self {
        ResolvedTarget::Address(addr)
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedTarget::Address(addr) => write!(f, "{}", addr),
            ResolvedTarget::Name(name) => write!(f, "{}", name),
            ResolvedTarget::NotFound => write!(f, "{}", Ipv4Addr::UNSPECIFIED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text() {
        assert_eq!(
            ResolvedTarget::from_text("1.2.5.33"),
            ResolvedTarget::Address(Ipv4Addr::new(1, 2, 5, 33))
        );
        assert_eq!(
            ResolvedTarget::from_text("host.example.com."),
            ResolvedTarget::Name("host.example.com".to_string())
        );
        assert_eq!(ResolvedTarget::from_text(""), ResolvedTarget::NotFound);
        assert_eq!(ResolvedTarget::from_text("0.0.0.0"), ResolvedTarget::NotFound);
    }

    #[test]
    fn test_invalid_literal_becomes_name() {
        assert_eq!(
            ResolvedTarget::from_text("256.1.1.1"),
            ResolvedTarget::Name("256.1.1.1".to_string())
        );
    }

    #[test]
    fn test_not_found_displays_sentinel() {
        assert_eq!(ResolvedTarget::NotFound.to_string(), "0.0.0.0");
        assert!(ResolvedTarget::NotFound.is_not_found());
    }
}
