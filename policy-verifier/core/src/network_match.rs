use ipnet::IpNet;
use std::{fmt, net::IpAddr};

/// Matches addresses within a network, less any excepted sub-networks.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NetworkMatch {
    /// A network to match against.
    pub net: IpNet,

    /// Networks to exclude from the match.
    pub except: Vec<IpNet>,
}

// === impl NetworkMatch ===

impl NetworkMatch {
    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.net.contains(addr) && !self.except.iter().any(|net| net.contains(addr))
    }
}

impl fmt::Display for NetworkMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.net.fmt(f)?;
        for net in &self.except {
            write!(f, " except {}", net)?;
        }
        Ok(())
    }
}

impl From<IpAddr> for NetworkMatch {
    fn from(net: IpAddr) -> Self {
        IpNet::from(net).into()
    }
}

impl From<IpNet> for NetworkMatch {
    fn from(net: IpNet) -> Self {
        Self {
            net,
            except: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_respects_exceptions() {
        let m = NetworkMatch {
            net: "10.0.0.0/16".parse().unwrap(),
            except: vec!["10.0.1.0/24".parse().unwrap()],
        };
        assert!(m.contains(&"10.0.0.7".parse().unwrap()));
        assert!(!m.contains(&"10.0.1.7".parse().unwrap()), "excepted");
        assert!(!m.contains(&"10.1.0.7".parse().unwrap()), "outside");
        assert!(!m.contains(&"fd00::1".parse().unwrap()), "other family");
        assert_eq!(m.to_string(), "10.0.0.0/16 except 10.0.1.0/24");
    }

    #[test]
    fn single_address() {
        let addr: IpAddr = "192.0.2.3".parse().unwrap();
        let m = NetworkMatch::from(addr);
        assert!(m.contains(&addr));
        assert!(!m.contains(&"192.0.2.4".parse().unwrap()));
    }
}
