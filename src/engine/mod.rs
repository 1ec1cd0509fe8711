//! Rule-evaluation engines
//!
//! Every engine answers the same three questions behind the [`RuleEngine`]
//! trait: can a source address reach the resource at all
//! ([`allows_ip`](RuleEngine::allows_ip)), can it reach a specific port
//! ([`allows_ip_to_port`](RuleEngine::allows_ip_to_port)), and does the
//! rule set stay inside an operator whitelist
//! ([`respects_whitelist`](RuleEngine::respects_whitelist)).
//!
//! The engines differ in their rule shape and default posture:
//!
//! | Engine | Empty rule set means |
//! |---|---|
//! | [`AllowListEngine`] | closed |
//! | [`SecurityGroup`] | priority race (no match allows) |
//! | [`KeyVaultAcl`] | governed by its default-allow flag |
//! | [`WebAppRestrictions`] | closed |
//! | [`CacheFirewall`] | **open** |
//!
//! Answers are [`TriState`] verdicts, not booleans; symbolic rule sources
//! that cannot be resolved surface as `Unknown` rather than being coerced
//! either way.

mod allowlist;
mod cache;
mod keyvault;
mod nsg;
mod webapp;

pub use allowlist::{AllowListEngine, Rule};
pub use cache::CacheFirewall;
pub use keyvault::KeyVaultAcl;
pub use nsg::{Access, Direction, SecurityGroup, SecurityGroupRule};
pub use webapp::{WebAppRestrictions, WebAppRule};

use crate::addrset::AddressSet;
use crate::error::{EvalError, ParseError, Result};
use crate::route::{IPPort, PacketRoute};
use crate::tristate::TriState;
use crate::whitelist::Whitelist;

/// A reachability answer: the verdict plus the routes that justify it
///
/// Routes are only present on a `True` verdict; a denied or indeterminate
/// answer carries no evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub state: TriState,
    pub routes: Vec<PacketRoute>,
}

impl Verdict {
    /// Definitely reachable, with supporting routes
    #[must_use]
    pub const fn allowed(routes: Vec<PacketRoute>) -> Self {
        Self {
            state: TriState::True,
            routes,
        }
    }

    /// Definitely unreachable
    #[must_use]
    pub const fn denied() -> Self {
        Self {
            state: TriState::False,
            routes: Vec::new(),
        }
    }

    /// Cannot be determined from available data
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            state: TriState::Unknown,
            routes: Vec::new(),
        }
    }

    /// Everything is reachable: `True` with the single full-wildcard route
    #[must_use]
    pub fn open() -> Self {
        Self::allowed(vec![PacketRoute::wildcard()])
    }

    /// Whether the verdict is a definite allow
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.state.is_true()
    }
}

/// A whitelist-compliance answer: the verdict plus every offending
/// (address-set, port-set) pair, sorted and de-duplicated
#[derive(Debug, Clone, PartialEq)]
pub struct Compliance {
    pub state: TriState,
    pub exceptions: Vec<IPPort>,
}

impl Compliance {
    /// Fully compliant: no exceptions
    #[must_use]
    pub const fn compliant() -> Self {
        Self {
            state: TriState::True,
            exceptions: Vec::new(),
        }
    }

    /// The question does not apply to this engine
    #[must_use]
    pub const fn not_applicable() -> Self {
        Self {
            state: TriState::NotApplicable,
            exceptions: Vec::new(),
        }
    }

    /// Build the verdict from collected exceptions: `True` when there are
    /// none, `Unknown` when any is indeterminate, `False` otherwise.
    #[must_use]
    pub(crate) fn from_exceptions(mut exceptions: Vec<(IPPort, TriState)>) -> Self {
        if exceptions.is_empty() {
            return Self::compliant();
        }
        let state = if exceptions.iter().any(|(_, v)| v.is_indeterminate()) {
            TriState::Unknown
        } else {
            TriState::False
        };
        let mut pairs: Vec<IPPort> = exceptions.drain(..).map(|(pair, _)| pair).collect();
        pairs.sort();
        pairs.dedup();
        Self {
            state,
            exceptions: pairs,
        }
    }
}

/// The common contract every rule engine exposes
///
/// The `_str` wrappers parse raw text before delegating; they are the
/// entry point used by the external query layer, which only handles
/// strings.
pub trait RuleEngine {
    /// Can `source` reach the resource on any port?
    fn allows_ip(&self, source: &AddressSet) -> Verdict;

    /// Can `source` reach the resource on `port`?
    fn allows_ip_to_port(&self, source: &AddressSet, port: u16) -> Verdict;

    /// Does the rule set stay inside `whitelist`?
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::BadWhitelist`] when the whitelist defines
    /// neither of its two forms. A verdict of `False`, `Unknown`, or
    /// `NotApplicable` is an answer, not an error.
    fn respects_whitelist(&self, whitelist: &Whitelist) -> std::result::Result<Compliance, EvalError>;

    /// Parse `source` and delegate to [`allows_ip`](Self::allows_ip)
    ///
    /// # Errors
    ///
    /// Returns a parse error for a malformed address expression.
    fn allows_ip_str(&self, source: &str) -> Result<Verdict> {
        let source = AddressSet::parse(source)?;
        Ok(self.allows_ip(&source))
    }

    /// Parse `source` and `port` and delegate to
    /// [`allows_ip_to_port`](Self::allows_ip_to_port)
    ///
    /// # Errors
    ///
    /// Returns a parse error for a malformed address expression or a port
    /// outside `0..=65535`.
    fn allows_ip_to_port_str(&self, source: &str, port: &str) -> Result<Verdict> {
        let source = AddressSet::parse(source)?;
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ParseError::invalid_port(port))?;
        Ok(self.allows_ip_to_port(&source, port))
    }
}
