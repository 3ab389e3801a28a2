use crate::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A node identity: the IPv4 address and port a peer listens on.
///
/// The identity doubles as the election key through [`NodeAddr::id`], which
/// packs it into a 48-bit integer. Identities are assumed unique within a
/// ring, so the unsigned order of the encoded ids is a total order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeAddr {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl NodeAddr {
    /// Parses a host string and a port received separately on the wire.
    pub fn from_parts(host: &str, port: u16) -> Result<NodeAddr> {
        let host = host
            .parse::<Ipv4Addr>()
            .map_err(|_| Error::Internal(format!("invalid IPv4 address {:?}", host)))?;
        Ok(NodeAddr { host, port })
    }

    /// Encodes the address as its 48-bit election key: the big-endian IPv4
    /// octets in the high 32 bits, the port in the low 16.
    pub fn id(&self) -> u64 {
        ((u32::from(self.host) as u64) << 16) | self.port as u64
    }

    /// Inverse of [`NodeAddr::id`].
    pub fn from_id(id: u64) -> NodeAddr {
        NodeAddr {
            host: Ipv4Addr::from((id >> 16) as u32),
            port: (id & 0xffff) as u16,
        }
    }

    /// The base URL for a protocol endpoint on this node.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<NodeAddr> {
        let (host, port) = s.split_once(':').ok_or_else(|| {
            Error::Internal(format!("address must have the form ip:port, got {:?}", s))
        })?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::Internal(format!("invalid port {:?}", port)))?;
        NodeAddr::from_parts(host, port)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn id_packs_host_and_port() {
        let addr: NodeAddr = "10.0.0.1:5000".parse().unwrap();
        assert_eq!(addr.id(), (0x0a000001u64 << 16) | 5000);
    }

    #[test]
    fn id_round_trips() {
        for s in ["0.0.0.0:0", "10.0.0.1:5000", "255.255.255.255:65535", "127.0.0.1:1"] {
            let addr: NodeAddr = s.parse().unwrap();
            assert_eq!(NodeAddr::from_id(addr.id()), addr);
        }
    }

    #[test]
    fn id_orders_by_host_then_port() {
        let low: NodeAddr = "10.0.0.1:65535".parse().unwrap();
        let high: NodeAddr = "10.0.0.2:1".parse().unwrap();
        assert!(high.id() > low.id());
    }

    #[test]
    fn parse_rejects_malformed_addresses() {
        for s in ["", "10.0.0.1", "10.0.0.1:99999", "example.com:80", "::1:80", "10.0.0.1:x"] {
            assert!(s.parse::<NodeAddr>().is_err(), "accepted {:?}", s);
        }
    }

    #[test]
    fn display_round_trips() {
        let addr: NodeAddr = "192.168.1.7:8080".parse().unwrap();
        assert_eq!(addr.to_string().parse::<NodeAddr>().unwrap(), addr);
    }

    #[test]
    fn url_targets_the_peer() {
        let addr: NodeAddr = "10.0.0.1:5000".parse().unwrap();
        assert_eq!(addr.url("/ring/join"), "http://10.0.0.1:5000/ring/join");
    }
}
