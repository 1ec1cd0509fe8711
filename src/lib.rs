//! Static reachability and whitelist-compliance analysis for cloud
//! firewall rules
//!
//! This crate is the analytical core of a network-security posture tool.
//! Collectors feed it firewall-like rule data from a point-in-time cloud
//! snapshot; it answers whether an arbitrary source address (and
//! optionally port) could reach a resource, and whether the rule set
//! stays inside an operator-approved whitelist. Verdicts are four-valued
//! [`TriState`] answers, because some rule sources are symbolic network
//! scopes this evaluator cannot resolve without topology data.
//!
//! Everything is immutable after construction and purely CPU-bound: no
//! I/O, no shared mutable state, safe to evaluate from any number of
//! threads.
//!
//! # Example
//!
//! ```
//! use netposture::{AddressSet, AllowListEngine, Rule, RuleEngine, TriState};
//!
//! let engine = AllowListEngine::new(vec![
//!     Rule::new("office", AddressSet::parse("203.0.113.0/24")?),
//! ]);
//!
//! let verdict = engine.allows_ip_str("203.0.113.25")?;
//! assert_eq!(verdict.state, TriState::True);
//!
//! let verdict = engine.allows_ip_str("8.8.8.8")?;
//! assert_eq!(verdict.state, TriState::False);
//! # Ok::<(), netposture::NetPostureError>(())
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod addrset;
pub mod engine;
pub mod error;
pub mod portset;
pub mod route;
pub mod tristate;
pub mod whitelist;

pub use addrset::{AddrIter, AddressSet, SpecialClass};
pub use engine::{
    Access, AllowListEngine, CacheFirewall, Compliance, Direction, KeyVaultAcl, Rule, RuleEngine,
    SecurityGroup, SecurityGroupRule, Verdict, WebAppRestrictions, WebAppRule,
};
pub use error::{EvalError, NetPostureError, ParseError, Result};
pub use portset::{PortIter, PortSet};
pub use route::{IPPort, PacketRoute, Protocol};
pub use tristate::TriState;
pub use whitelist::Whitelist;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
