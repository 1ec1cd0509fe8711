//! IPv4 address-set value type
//!
//! This module defines [`AddressSet`], the immutable set-of-addresses value
//! that firewall rules and whitelists are built from. A set is parsed from
//! one of the textual forms cloud providers use:
//!
//! - Single address: `"10.0.0.4"`
//! - CIDR block: `"10.0.0.0/24"`
//! - Inclusive range: `"10.0.0.1-10.0.0.9"`
//! - Comma-separated mixture of the above
//! - Wildcard: `"*"`
//! - Special keywords: `"VirtualNetwork"`, `"Internet"`, `"LoadBalancerProbe"`
//!
//! A comma list is normalized at construction time: overlapping and adjacent
//! entries are merged, so enumeration and comparison never see redundant
//! ranges.
//!
//! Two sets are equal if and only if they denote the same addresses,
//! regardless of the shape they were parsed from:
//!
//! ```
//! use netposture::AddressSet;
//!
//! let a = AddressSet::parse("192.168.0.0/30").unwrap();
//! let b = AddressSet::parse("192.168.0.0,192.168.0.1,192.168.0.2,192.168.0.3").unwrap();
//! assert_eq!(a, b);
//! ```

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::tristate::TriState;

/// Below this cardinality, set comparison materializes both sides; at or
/// above it, comparison pairs lazy enumerations and aborts on the first
/// mismatch so memory use stays bounded for pathological range lists.
pub const SMALL_SET_THRESHOLD: u64 = 512;

/// Named address classes that stand in for topology this evaluator does not
/// have.
///
/// The classes are pairwise disjoint except that [`SpecialClass::Any`]
/// (the wildcard) contains all of them; every other class contains only
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialClass {
    /// The wildcard `*`: every concrete address and every special class
    Any,

    /// The resource's own virtual-network scope
    VirtualNetwork,

    /// The generic externally-routable scope
    Internet,

    /// The platform load-balancer probe source
    LoadBalancerProbe,
}

impl SpecialClass {
    /// The canonical keyword this class serializes to
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Any => "*",
            Self::VirtualNetwork => "VirtualNetwork",
            Self::Internet => "Internet",
            Self::LoadBalancerProbe => "LoadBalancerProbe",
        }
    }

    /// Parse a keyword, case-insensitively
    #[must_use]
    pub fn from_keyword(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "*" => Some(Self::Any),
            "virtualnetwork" => Some(Self::VirtualNetwork),
            "internet" => Some(Self::Internet),
            "loadbalancerprobe" => Some(Self::LoadBalancerProbe),
            _ => None,
        }
    }
}

impl fmt::Display for SpecialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Internal shape of an address set. The four shapes are mutually
/// exclusive and canonical: a one-element range is always `Single`, a
/// one-range multiple is always `Range`, and `Multiple` is sorted,
/// de-duplicated, and coalesced.
#[derive(Debug, Clone)]
enum Repr {
    Single(u32),
    Range { begin: u32, end: u32 },
    Multiple(Vec<(u32, u32)>),
    Special(SpecialClass),
}

/// An immutable set of IPv4 addresses
///
/// See the [module docs](self) for the textual forms and equality
/// semantics. All operations are pure; the value never changes after
/// construction.
#[derive(Debug, Clone)]
pub struct AddressSet {
    repr: Repr,
}

impl AddressSet {
    /// Parse a textual address expression
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for malformed input: an unparseable
    /// address, CIDR, or range, an inverted range, an empty list segment,
    /// or a special keyword inside a comma list. Malformed input is never
    /// treated as an empty or wildcard set.
    ///
    /// # Examples
    ///
    /// ```
    /// use netposture::AddressSet;
    ///
    /// let set = AddressSet::parse("10.0.0.0/24").unwrap();
    /// assert_eq!(set.size(), 256);
    ///
    /// assert!(AddressSet::parse("10.0.0.999").is_err());
    /// assert!(AddressSet::parse("10.0.0.9-10.0.0.1").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptySegment(text.to_string()));
        }
        if !trimmed.contains(',') {
            return Self::parse_segment(trimmed);
        }

        let mut ranges = Vec::new();
        for seg in trimmed.split(',') {
            let seg = seg.trim();
            if seg.is_empty() {
                return Err(ParseError::EmptySegment(text.to_string()));
            }
            match Self::parse_segment(seg)?.repr {
                Repr::Special(class) => {
                    return Err(ParseError::SpecialInList(class.keyword().to_string()));
                }
                Repr::Single(a) => ranges.push((a, a)),
                Repr::Range { begin, end } => ranges.push((begin, end)),
                Repr::Multiple(mut inner) => ranges.append(&mut inner),
            }
        }
        Ok(Self::from_ranges(ranges))
    }

    fn parse_segment(seg: &str) -> Result<Self, ParseError> {
        if let Some(class) = SpecialClass::from_keyword(seg) {
            return Ok(Self::special(class));
        }
        if seg.contains('/') {
            let net: Ipv4Net = seg
                .parse()
                .map_err(|_| ParseError::InvalidCidr(seg.to_string()))?;
            let net = net.trunc();
            return Ok(Self::from_bounds(
                u32::from(net.network()),
                u32::from(net.broadcast()),
            ));
        }
        if let Some((begin, end)) = seg.split_once('-') {
            let begin: Ipv4Addr = begin
                .trim()
                .parse()
                .map_err(|_| ParseError::InvalidAddressRange(seg.to_string()))?;
            let end: Ipv4Addr = end
                .trim()
                .parse()
                .map_err(|_| ParseError::InvalidAddressRange(seg.to_string()))?;
            return Self::range(begin, end);
        }
        let addr: Ipv4Addr = seg
            .parse()
            .map_err(|_| ParseError::InvalidAddress(seg.to_string()))?;
        Ok(Self::single(addr))
    }

    /// The wildcard set: every concrete address and every special class
    #[must_use]
    pub const fn any() -> Self {
        Self {
            repr: Repr::Special(SpecialClass::Any),
        }
    }

    /// A set holding one special class
    #[must_use]
    pub const fn special(class: SpecialClass) -> Self {
        Self {
            repr: Repr::Special(class),
        }
    }

    /// A set holding exactly one address
    #[must_use]
    pub fn single(addr: Ipv4Addr) -> Self {
        Self {
            repr: Repr::Single(u32::from(addr)),
        }
    }

    /// An inclusive continuous range
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidAddressRange`] if `begin > end`.
    pub fn range(begin: Ipv4Addr, end: Ipv4Addr) -> Result<Self, ParseError> {
        let (b, e) = (u32::from(begin), u32::from(end));
        if b > e {
            return Err(ParseError::InvalidAddressRange(format!("{begin}-{end}")));
        }
        Ok(Self::from_bounds(b, e))
    }

    fn from_bounds(begin: u32, end: u32) -> Self {
        if begin == end {
            Self {
                repr: Repr::Single(begin),
            }
        } else if begin == 0 && end == u32::MAX {
            // the full concrete range is the wildcard
            Self::any()
        } else {
            Self {
                repr: Repr::Range { begin, end },
            }
        }
    }

    /// Build the minimal canonical shape from a list of inclusive ranges:
    /// sort, then merge every overlapping or adjacent pair.
    fn from_ranges(mut ranges: Vec<(u32, u32)>) -> Self {
        ranges.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
        for (begin, end) in ranges {
            match merged.last_mut() {
                Some(last) if begin <= last.1.saturating_add(1) => {
                    if end > last.1 {
                        last.1 = end;
                    }
                }
                _ => merged.push((begin, end)),
            }
        }
        if merged.len() == 1 {
            Self::from_bounds(merged[0].0, merged[0].1)
        } else {
            Self {
                repr: Repr::Multiple(merged),
            }
        }
    }

    /// Exact number of addresses in the set
    ///
    /// The full wildcard is reported exactly as 2^32, which is why the
    /// return type is `u64`. Non-wildcard special classes count as one
    /// member (themselves).
    #[must_use]
    pub fn size(&self) -> u64 {
        match &self.repr {
            Repr::Single(_) => 1,
            Repr::Range { begin, end } => u64::from(end - begin) + 1,
            Repr::Multiple(ranges) => ranges.iter().map(|(b, e)| u64::from(e - b) + 1).sum(),
            Repr::Special(SpecialClass::Any) => 1 << 32,
            Repr::Special(_) => 1,
        }
    }

    /// Exact membership test for one concrete address
    ///
    /// The wildcard contains every address; a non-wildcard special class
    /// contains no concrete address.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let a = u32::from(addr);
        match &self.repr {
            Repr::Single(v) => *v == a,
            Repr::Range { begin, end } => (*begin..=*end).contains(&a),
            Repr::Multiple(ranges) => ranges.iter().any(|(b, e)| (*b..=*e).contains(&a)),
            Repr::Special(SpecialClass::Any) => true,
            Repr::Special(_) => false,
        }
    }

    /// Exact containment test for an inclusive range of concrete addresses
    ///
    /// An inverted query range is never contained. Because `Multiple` is
    /// coalesced, a contiguous query range is contained iff a single
    /// member range covers it.
    #[must_use]
    pub fn contains_range(&self, begin: Ipv4Addr, end: Ipv4Addr) -> bool {
        let (qb, qe) = (u32::from(begin), u32::from(end));
        if qb > qe {
            return false;
        }
        match &self.repr {
            Repr::Single(v) => qb == qe && *v == qb,
            Repr::Range { begin, end } => *begin <= qb && qe <= *end,
            Repr::Multiple(ranges) => ranges.iter().any(|(b, e)| *b <= qb && qe <= *e),
            Repr::Special(SpecialClass::Any) => true,
            Repr::Special(_) => false,
        }
    }

    /// Whether the set contains a special class
    ///
    /// Only the wildcard contains other classes; every class contains
    /// itself; a concrete set never contains a special class.
    #[must_use]
    pub fn contains_class(&self, class: SpecialClass) -> bool {
        match &self.repr {
            Repr::Special(SpecialClass::Any) => true,
            Repr::Special(own) => *own == class,
            _ => false,
        }
    }

    /// Three-valued set containment: does `self` contain every member of
    /// `other`?
    ///
    /// Containment involving a non-wildcard special class on one side and
    /// a concrete set on the other is `Unknown`: resolving a symbolic
    /// scope against concrete addresses requires topology data this
    /// evaluator does not have.
    ///
    /// # Examples
    ///
    /// ```
    /// use netposture::{AddressSet, TriState};
    ///
    /// let outer = AddressSet::parse("10.0.0.0/8").unwrap();
    /// let inner = AddressSet::parse("10.1.2.3").unwrap();
    /// assert_eq!(outer.tri_contains(&inner), TriState::True);
    ///
    /// let vnet = AddressSet::parse("VirtualNetwork").unwrap();
    /// assert_eq!(outer.tri_contains(&vnet), TriState::Unknown);
    /// assert_eq!(AddressSet::any().tri_contains(&vnet), TriState::True);
    /// ```
    #[must_use]
    pub fn tri_contains(&self, other: &Self) -> TriState {
        match (&self.repr, &other.repr) {
            (Repr::Special(SpecialClass::Any), _) => TriState::True,
            // nothing but the wildcard covers the full space, and the full
            // concrete range normalizes to the wildcard at construction
            (_, Repr::Special(SpecialClass::Any)) => TriState::False,
            (Repr::Special(a), Repr::Special(b)) => TriState::from_bool(a == b),
            (Repr::Special(_), _) | (_, Repr::Special(_)) => TriState::Unknown,
            _ => TriState::from_bool(self.contains_concrete_set(other)),
        }
    }

    /// Exact containment between two concrete sets. `other`'s coalesced
    /// ranges are checked individually, so this never enumerates.
    fn contains_concrete_set(&self, other: &Self) -> bool {
        if other.size() > self.size() {
            return false;
        }
        if let Some((begin, end)) = other.continuous_range() {
            return self.contains_range(begin, end);
        }
        match &other.repr {
            Repr::Multiple(ranges) => ranges.iter().all(|(b, e)| {
                self.contains_range(Ipv4Addr::from(*b), Ipv4Addr::from(*e))
            }),
            // single/range shapes always report a continuous range
            _ => false,
        }
    }

    /// The inclusive bounds, when the set is a single address, one
    /// continuous range, or the wildcard (reported as the full range).
    /// `None` for multiples and non-wildcard special classes.
    #[must_use]
    pub fn continuous_range(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        match &self.repr {
            Repr::Single(a) => Some((Ipv4Addr::from(*a), Ipv4Addr::from(*a))),
            Repr::Range { begin, end } => Some((Ipv4Addr::from(*begin), Ipv4Addr::from(*end))),
            Repr::Special(SpecialClass::Any) => {
                Some((Ipv4Addr::from(0), Ipv4Addr::from(u32::MAX)))
            }
            _ => None,
        }
    }

    /// Lazily enumerate every concrete address in ascending order
    ///
    /// Each call starts a fresh traversal; dropping the iterator is
    /// cancellation. A non-wildcard special class enumerates nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use netposture::AddressSet;
    ///
    /// let set = AddressSet::parse("10.0.0.0/30").unwrap();
    /// let addrs: Vec<String> = set.iter().map(|a| a.to_string()).collect();
    /// assert_eq!(addrs, ["10.0.0.0", "10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    ///
    /// // Large sets are never materialized by the consumer unless it asks.
    /// let all = AddressSet::any();
    /// assert_eq!(all.iter().nth(2), Some("0.0.0.2".parse().unwrap()));
    /// ```
    #[must_use]
    pub fn iter(&self) -> AddrIter {
        let ranges = match &self.repr {
            Repr::Single(a) => vec![(*a, *a)],
            Repr::Range { begin, end } => vec![(*begin, *end)],
            Repr::Multiple(ranges) => ranges.clone(),
            Repr::Special(SpecialClass::Any) => vec![(0, u32::MAX)],
            Repr::Special(_) => Vec::new(),
        };
        AddrIter {
            ranges: ranges.into_iter(),
            cursor: None,
        }
    }

    /// Whether this set is a special (symbolic) class
    #[must_use]
    pub fn is_special(&self) -> bool {
        matches!(self.repr, Repr::Special(_))
    }

    /// The special class, if this set is symbolic
    #[must_use]
    pub fn class(&self) -> Option<SpecialClass> {
        match &self.repr {
            Repr::Special(class) => Some(*class),
            _ => None,
        }
    }

    /// Whether this set is the wildcard
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self.repr, Repr::Special(SpecialClass::Any))
    }

    /// Whether this set is set-equal to any member of `list`
    #[must_use]
    pub fn in_list(&self, list: &[Self]) -> bool {
        list.iter().any(|s| s == self)
    }

    /// The canonical textual form, which round-trips through [`parse`]
    ///
    /// [`parse`]: Self::parse
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }

    fn set_eq(&self, other: &Self) -> bool {
        // Two symbolic sets are equal iff they are the same class.
        if let (Repr::Special(a), Repr::Special(b)) = (&self.repr, &other.repr) {
            return a == b;
        }
        if self.size() != other.size() {
            return false;
        }
        match (self.continuous_range(), other.continuous_range()) {
            (Some(a), Some(b)) => return a == b,
            (None, None) => {}
            _ => return false,
        }
        // Both are coalesced multiples of the same cardinality.
        if self.size() < SMALL_SET_THRESHOLD {
            let a: Vec<Ipv4Addr> = self.iter().collect();
            let b: Vec<Ipv4Addr> = other.iter().collect();
            return a == b;
        }
        // Paired lazy enumeration, aborting on the first mismatch, so no
        // allocation proportional to set size.
        self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl PartialEq for AddressSet {
    /// Set equality: same addresses, regardless of internal shape
    fn eq(&self, other: &Self) -> bool {
        self.set_eq(other)
    }
}

impl Eq for AddressSet {}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Special(class) => f.write_str(class.keyword()),
            Repr::Single(a) => write!(f, "{}", Ipv4Addr::from(*a)),
            Repr::Range { begin, end } => fmt_bounds(f, *begin, *end),
            Repr::Multiple(ranges) => {
                for (i, (begin, end)) in ranges.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if begin == end {
                        write!(f, "{}", Ipv4Addr::from(*begin))?;
                    } else {
                        fmt_bounds(f, *begin, *end)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Format a continuous range: CIDR when the range collapses back to an
/// aligned power-of-two block, `a-b` otherwise. The full space never
/// reaches here; it normalizes to the wildcard at construction.
fn fmt_bounds(f: &mut fmt::Formatter<'_>, begin: u32, end: u32) -> fmt::Result {
    let len = u64::from(end - begin) + 1;
    if len.is_power_of_two() && u64::from(begin) % len == 0 {
        let prefix = 32 - len.trailing_zeros();
        write!(f, "{}/{}", Ipv4Addr::from(begin), prefix)
    } else {
        write!(f, "{}-{}", Ipv4Addr::from(begin), Ipv4Addr::from(end))
    }
}

impl FromStr for AddressSet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AddressSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AddressSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Lazy ascending enumeration over the concrete addresses of an
/// [`AddressSet`]. Dropping the iterator cancels the traversal.
#[derive(Debug)]
pub struct AddrIter {
    ranges: std::vec::IntoIter<(u32, u32)>,
    /// `(next, end)` of the active range
    cursor: Option<(u32, u32)>,
}

impl Iterator for AddrIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        loop {
            if let Some((next, end)) = self.cursor {
                self.cursor = if next == end { None } else { Some((next + 1, end)) };
                return Some(Ipv4Addr::from(next));
            }
            self.cursor = Some(self.ranges.next()?);
        }
    }
}
