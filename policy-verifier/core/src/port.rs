use std::{fmt, str::FromStr};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

/// A concrete (protocol, port) pair, as probed and as keyed in connectivity matrices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortProtocol {
    pub protocol: Protocol,
    pub port: u16,
}

/// References a workload's port by name or number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PortRef {
    Number(u16),
    Name(String),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid protocol: {0:?}")]
pub struct InvalidProtocol(String);

#[derive(Debug, thiserror::Error)]
#[error("invalid port: {0:?}")]
pub struct InvalidPort(String);

// === impl Protocol ===

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Sctp => "SCTP",
        }
    }
}

impl FromStr for Protocol {
    type Err = InvalidProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("tcp") {
            Ok(Self::Tcp)
        } else if s.eq_ignore_ascii_case("udp") {
            Ok(Self::Udp)
        } else if s.eq_ignore_ascii_case("sctp") {
            Ok(Self::Sctp)
        } else {
            Err(InvalidProtocol(s.to_string()))
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl PortProtocol ===

impl PortProtocol {
    pub fn new(protocol: Protocol, port: u16) -> Self {
        Self { protocol, port }
    }

    pub fn tcp(port: u16) -> Self {
        Self::new(Protocol::Tcp, port)
    }

    pub fn udp(port: u16) -> Self {
        Self::new(Protocol::Udp, port)
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.port)
    }
}

// === impl PortRef ===

impl FromStr for PortRef {
    type Err = InvalidPort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InvalidPort(s.to_string()));
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            return match s.parse::<u16>() {
                Ok(0) | Err(_) => Err(InvalidPort(s.to_string())),
                Ok(port) => Ok(Self::Number(port)),
            };
        }

        Ok(Self::Name(s.to_string()))
    }
}

impl From<u16> for PortRef {
    fn from(port: u16) -> Self {
        Self::Number(port)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => fmt::Display::fmt(n, f),
            Self::Name(n) => fmt::Display::fmt(n, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_protocol() {
        assert_eq!("TCP".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("udp".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("Sctp".parse::<Protocol>().unwrap(), Protocol::Sctp);
        assert!("icmp".parse::<Protocol>().is_err());
    }

    #[test]
    fn parse_port_ref() {
        assert_eq!("80".parse::<PortRef>().unwrap(), PortRef::Number(80));
        assert_eq!(
            "serve-80-tcp".parse::<PortRef>().unwrap(),
            PortRef::Name("serve-80-tcp".to_string())
        );
        assert!("0".parse::<PortRef>().is_err(), "0");
        assert!("65536".parse::<PortRef>().is_err(), "65536");
        assert!("".parse::<PortRef>().is_err(), "empty");
    }

    #[test]
    fn port_protocol_order_and_display() {
        let mut ports = vec![
            PortProtocol::udp(53),
            PortProtocol::tcp(81),
            PortProtocol::tcp(80),
        ];
        ports.sort();
        assert_eq!(
            ports.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["TCP/80", "TCP/81", "UDP/53"]
        );
    }
}
