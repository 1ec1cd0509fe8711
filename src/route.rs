//! Evidence records returned by the rule engines
//!
//! [`PacketRoute`] describes a reachable (address-set, port-set, protocol)
//! combination produced by a successful reachability check. [`IPPort`]
//! pairs an address set with a port set and carries a total order, so
//! whitelist-compliance exception lists can be reported in a stable order.
//! Both compare by set membership, never by internal shape.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::addrset::{AddressSet, SpecialClass};
use crate::error::ParseError;
use crate::portset::PortSet;

/// Transport protocol tag carried on rules and routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Any protocol (`*`)
    Any,
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    /// Canonical name this protocol serializes to
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "*",
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Icmp => "ICMP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = ParseError;

    /// Parse a protocol name, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "*" | "any" => Ok(Self::Any),
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "icmp" => Ok(Self::Icmp),
            _ => Err(ParseError::InvalidProtocol(s.to_string())),
        }
    }
}

/// A reachable (address-set, port-set, protocol) combination
///
/// Returned as supporting evidence alongside a `True` reachability
/// verdict: "this is what the matching rule lets through". Equality is
/// structural over set membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRoute {
    pub protocol: Protocol,
    pub addresses: AddressSet,
    pub ports: PortSet,
}

impl PacketRoute {
    #[must_use]
    pub const fn new(protocol: Protocol, addresses: AddressSet, ports: PortSet) -> Self {
        Self {
            protocol,
            addresses,
            ports,
        }
    }

    /// The "everything is reachable" route: any protocol, every address,
    /// every port. Default-open engines return this for an empty rule set.
    #[must_use]
    pub const fn wildcard() -> Self {
        Self {
            protocol: Protocol::Any,
            addresses: AddressSet::any(),
            ports: PortSet::any(),
        }
    }
}

impl fmt::Display for PacketRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.protocol, self.addresses, self.ports)
    }
}

/// An (address-set, port-set) pair used in whitelist exception reports
///
/// Equality is by set membership. The total order sorts symbolic
/// addresses before concrete ones so exception lists read scope-first,
/// and is deterministic across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IPPort {
    pub address: AddressSet,
    pub ports: PortSet,
}

impl IPPort {
    #[must_use]
    pub const fn new(address: AddressSet, ports: PortSet) -> Self {
        Self { address, ports }
    }

    /// The `{*, *}` exception reported when a default-open engine faces a
    /// narrowing whitelist.
    #[must_use]
    pub const fn wildcard() -> Self {
        Self {
            address: AddressSet::any(),
            ports: PortSet::any(),
        }
    }
}

impl fmt::Display for IPPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.ports)
    }
}

const fn class_rank(class: SpecialClass) -> u8 {
    match class {
        SpecialClass::Any => 0,
        SpecialClass::VirtualNetwork => 1,
        SpecialClass::Internet => 2,
        SpecialClass::LoadBalancerProbe => 3,
    }
}

/// Sort key for an address set: symbolic classes first (by class), then
/// continuous shapes by their start address, then multiples by cardinality.
fn address_key(set: &AddressSet) -> (u8, u64, u64) {
    if let Some(class) = set.class() {
        return (0, u64::from(class_rank(class)), 0);
    }
    match set.continuous_range() {
        Some((begin, _)) => (1, u64::from(u32::from(begin)), set.size()),
        None => (2, 0, set.size()),
    }
}

/// Sort key for a port set: wildcard first, then continuous shapes by
/// their start port, then multiples by cardinality.
fn port_key(set: &PortSet) -> (u8, u32, u32) {
    if set.is_wildcard() {
        return (0, 0, 0);
    }
    match set.continuous_range() {
        Some((begin, _)) => (1, u32::from(begin), set.size()),
        None => (2, 0, set.size()),
    }
}

impl Ord for IPPort {
    fn cmp(&self, other: &Self) -> Ordering {
        address_key(&self.address)
            .cmp(&address_key(&other.address))
            .then_with(|| port_key(&self.ports).cmp(&port_key(&other.ports)))
            // canonical strings are unique per denoted set, so this final
            // tiebreak keeps the order total and consistent with equality
            .then_with(|| self.address.to_string().cmp(&other.address.to_string()))
            .then_with(|| self.ports.to_string().cmp(&other.ports.to_string()))
    }
}

impl PartialOrd for IPPort {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(text: &str) -> AddressSet {
        AddressSet::parse(text).unwrap()
    }

    fn ports(text: &str) -> PortSet {
        PortSet::parse(text).unwrap()
    }

    #[test]
    fn test_protocol_parse_and_display() {
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("UDP".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("*".parse::<Protocol>().unwrap(), Protocol::Any);
        assert_eq!(Protocol::Icmp.to_string(), "ICMP");
        assert!(matches!(
            "gre".parse::<Protocol>(),
            Err(ParseError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn test_route_equality_is_set_equality() {
        let a = PacketRoute::new(Protocol::Tcp, addr("10.0.0.0/30"), ports("80-82"));
        let b = PacketRoute::new(
            Protocol::Tcp,
            addr("10.0.0.0,10.0.0.1,10.0.0.2,10.0.0.3"),
            ports("80,81,82"),
        );
        assert_eq!(a, b);

        let c = PacketRoute::new(Protocol::Udp, addr("10.0.0.0/30"), ports("80-82"));
        assert_ne!(a, c);
    }

    #[test]
    fn test_wildcard_route() {
        let route = PacketRoute::wildcard();
        assert_eq!(route.protocol, Protocol::Any);
        assert!(route.addresses.is_wildcard());
        assert!(route.ports.is_wildcard());
        assert_eq!(route.to_string(), "* *:*");
    }

    #[test]
    fn test_ipport_order_symbolic_first() {
        let mut list = vec![
            IPPort::new(addr("10.0.0.1"), ports("80")),
            IPPort::new(addr("VirtualNetwork"), ports("*")),
            IPPort::new(addr("1.0.0.0/8"), ports("443")),
            IPPort::new(addr("Internet"), ports("22")),
        ];
        list.sort();
        let rendered: Vec<String> = list.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            [
                "VirtualNetwork:*",
                "Internet:22",
                "1.0.0.0/8:443",
                "10.0.0.1:80",
            ]
        );
    }

    #[test]
    fn test_ipport_order_stable_for_multiples() {
        let small = IPPort::new(addr("10.0.0.1,10.0.0.3"), ports("80"));
        let large = IPPort::new(addr("10.0.0.1,10.0.0.3-10.0.0.9"), ports("80"));
        assert!(small < large);
        // order agrees with equality
        assert_eq!(
            small.cmp(&IPPort::new(addr("10.0.0.3,10.0.0.1"), ports("80"))),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn test_ipport_serde() {
        let pair = IPPort::new(addr("10.0.0.0/24"), ports("80,443"));
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "{\"address\":\"10.0.0.0/24\",\"ports\":\"80,443\"}");
        let back: IPPort = serde_json::from_str(&json).unwrap();
        assert_eq!(pair, back);
    }
}
