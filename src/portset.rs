//! Port-set value type
//!
//! [`PortSet`] is the port-space sibling of [`crate::AddressSet`]: an
//! immutable set of ports over `0..=65535`, parsed from a single port
//! (`"443"`), an inclusive range (`"8000-8999"`), a comma-separated mixture,
//! or the wildcard `"*"`. Comma lists are coalesced at construction time and
//! equality is by denoted members, not by shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::addrset::SMALL_SET_THRESHOLD;
use crate::error::ParseError;

/// Internal shape; same canonicalization rules as the address-set shapes,
/// with the wildcard kept symbolic so `"*"` round-trips.
#[derive(Debug, Clone)]
enum Repr {
    Single(u16),
    Range { begin: u16, end: u16 },
    Multiple(Vec<(u16, u16)>),
    Any,
}

/// An immutable set of ports
#[derive(Debug, Clone)]
pub struct PortSet {
    repr: Repr,
}

impl PortSet {
    /// Parse a textual port expression
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidPort`] for a value outside `0..=65535`,
    /// [`ParseError::InvalidPortRange`] for an inverted range, and
    /// [`ParseError::EmptySegment`] for an empty expression or list
    /// segment. The wildcard cannot appear inside a comma list.
    ///
    /// # Examples
    ///
    /// ```
    /// use netposture::PortSet;
    ///
    /// let set = PortSet::parse("80,443,8000-8009").unwrap();
    /// assert_eq!(set.size(), 12);
    /// assert!(set.contains(8004));
    ///
    /// assert!(PortSet::parse("70000").is_err());
    /// assert!(PortSet::parse("90-80").is_err());
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
                Repr::Any => return Err(ParseError::SpecialInList("*".to_string())),
                Repr::Single(p) => ranges.push((p, p)),
                Repr::Range { begin, end } => ranges.push((begin, end)),
                Repr::Multiple(mut inner) => ranges.append(&mut inner),
            }
        }
        Ok(Self::from_ranges(ranges))
    }

    fn parse_segment(seg: &str) -> Result<Self, ParseError> {
        if seg == "*" {
            return Ok(Self::any());
        }
        if let Some((begin, end)) = seg.split_once('-') {
            let begin = parse_port(begin.trim())?;
            let end = parse_port(end.trim())?;
            return Self::range(begin, end);
        }
        Ok(Self::single(parse_port(seg)?))
    }

    /// The wildcard set: every port
    #[must_use]
    pub const fn any() -> Self {
        Self { repr: Repr::Any }
    }

    /// A set holding exactly one port
    #[must_use]
    pub const fn single(port: u16) -> Self {
        Self {
            repr: Repr::Single(port),
        }
    }

    /// An inclusive continuous range
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidPortRange`] if `begin > end`.
    pub fn range(begin: u16, end: u16) -> Result<Self, ParseError> {
        if begin > end {
            return Err(ParseError::InvalidPortRange { begin, end });
        }
        Ok(Self::from_bounds(begin, end))
    }

    const fn from_bounds(begin: u16, end: u16) -> Self {
        if begin == end {
            Self {
                repr: Repr::Single(begin),
            }
        } else if begin == 0 && end == u16::MAX {
            Self::any()
        } else {
            Self {
                repr: Repr::Range { begin, end },
            }
        }
    }

    fn from_ranges(mut ranges: Vec<(u16, u16)>) -> Self {
        ranges.sort_unstable();
        let mut merged: Vec<(u16, u16)> = Vec::with_capacity(ranges.len());
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

    /// Exact number of ports in the set
    #[must_use]
    pub fn size(&self) -> u32 {
        match &self.repr {
            Repr::Single(_) => 1,
            Repr::Range { begin, end } => u32::from(end - begin) + 1,
            Repr::Multiple(ranges) => ranges.iter().map(|(b, e)| u32::from(e - b) + 1).sum(),
            Repr::Any => 1 << 16,
        }
    }

    /// Exact membership test for one port
    #[must_use]
    pub fn contains(&self, port: u16) -> bool {
        match &self.repr {
            Repr::Single(v) => *v == port,
            Repr::Range { begin, end } => (*begin..=*end).contains(&port),
            Repr::Multiple(ranges) => ranges.iter().any(|(b, e)| (*b..=*e).contains(&port)),
            Repr::Any => true,
        }
    }

    /// Exact containment test for an inclusive port range. An inverted
    /// query range is never contained.
    #[must_use]
    pub fn contains_range(&self, begin: u16, end: u16) -> bool {
        if begin > end {
            return false;
        }
        match &self.repr {
            Repr::Single(v) => begin == end && *v == begin,
            Repr::Range { begin: b, end: e } => *b <= begin && end <= *e,
            Repr::Multiple(ranges) => ranges.iter().any(|(b, e)| *b <= begin && end <= *e),
            Repr::Any => true,
        }
    }

    /// Exact containment test between two port sets
    ///
    /// Unlike addresses there is no symbolic port, so the answer is always
    /// definite. `other`'s coalesced ranges are checked one by one.
    #[must_use]
    pub fn contains_set(&self, other: &Self) -> bool {
        if other.size() > self.size() {
            return false;
        }
        if let Some((begin, end)) = other.continuous_range() {
            return self.contains_range(begin, end);
        }
        match &other.repr {
            Repr::Multiple(ranges) => {
                ranges.iter().all(|(b, e)| self.contains_range(*b, *e))
            }
            _ => false,
        }
    }

    /// The inclusive bounds, when the set is one continuous run of ports.
    /// The wildcard reports the full `0-65535` range.
    #[must_use]
    pub fn continuous_range(&self) -> Option<(u16, u16)> {
        match &self.repr {
            Repr::Single(p) => Some((*p, *p)),
            Repr::Range { begin, end } => Some((*begin, *end)),
            Repr::Any => Some((0, u16::MAX)),
            Repr::Multiple(_) => None,
        }
    }

    /// Lazily enumerate every port in ascending order. Each call starts a
    /// fresh traversal; dropping the iterator is cancellation.
    #[must_use]
    pub fn iter(&self) -> PortIter {
        let ranges = match &self.repr {
            Repr::Single(p) => vec![(*p, *p)],
            Repr::Range { begin, end } => vec![(*begin, *end)],
            Repr::Multiple(ranges) => ranges.clone(),
            Repr::Any => vec![(0, u16::MAX)],
        };
        PortIter {
            ranges: ranges.into_iter(),
            cursor: None,
        }
    }

    /// Whether this set is the wildcard
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self.repr, Repr::Any)
    }

    /// The canonical textual form, which round-trips through [`parse`]
    ///
    /// [`parse`]: Self::parse
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }

    fn set_eq(&self, other: &Self) -> bool {
        if self.size() != other.size() {
            return false;
        }
        match (self.continuous_range(), other.continuous_range()) {
            (Some(a), Some(b)) => return a == b,
            (None, None) => {}
            _ => return false,
        }
        if u64::from(self.size()) < SMALL_SET_THRESHOLD {
            let a: Vec<u16> = self.iter().collect();
            let b: Vec<u16> = other.iter().collect();
            return a == b;
        }
        self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl PartialEq for PortSet {
    /// Set equality: same ports, regardless of internal shape
    fn eq(&self, other: &Self) -> bool {
        self.set_eq(other)
    }
}

impl Eq for PortSet {}

fn parse_port(text: &str) -> Result<u16, ParseError> {
    text.parse::<u16>()
        .map_err(|_| ParseError::invalid_port(text))
}

impl fmt::Display for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Any => f.write_str("*"),
            Repr::Single(p) => write!(f, "{p}"),
            Repr::Range { begin, end } => write!(f, "{begin}-{end}"),
            Repr::Multiple(ranges) => {
                for (i, (begin, end)) in ranges.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if begin == end {
                        write!(f, "{begin}")?;
                    } else {
                        write!(f, "{begin}-{end}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl FromStr for PortSet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PortSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PortSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Lazy ascending enumeration over the ports of a [`PortSet`]
#[derive(Debug)]
pub struct PortIter {
    ranges: std::vec::IntoIter<(u16, u16)>,
    cursor: Option<(u16, u16)>,
}

impl Iterator for PortIter {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        loop {
            if let Some((next, end)) = self.cursor {
                self.cursor = if next == end { None } else { Some((next + 1, end)) };
                return Some(next);
            }
            self.cursor = Some(self.ranges.next()?);
        }
    }
}
