//! Generic allow-list engine
//!
//! The baseline engine: a flat list of named allow rules, closed by
//! default. Generic rule lists are port-agnostic, so the port-aware query
//! ignores its port argument and a per-port whitelist yields
//! `NotApplicable`. The resource-specific variants compose the helpers
//! defined here with their own default posture.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::addrset::AddressSet;
use crate::error::EvalError;
use crate::portset::PortSet;
use crate::route::IPPort;
use crate::tristate::TriState;
use crate::whitelist::Whitelist;

use super::{Compliance, RuleEngine, Verdict};

/// One allow-list entry: a name and the source range it admits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    /// The source addresses this rule admits
    pub sources: AddressSet,
    /// Whether the rule admits all cloud-internal addresses regardless of
    /// `sources`. `NotApplicable` when the resource type has no such
    /// concept.
    #[serde(default = "Rule::all_internal_default")]
    pub all_internal: TriState,
}

impl Rule {
    #[must_use]
    pub fn new(name: impl Into<String>, sources: AddressSet) -> Self {
        Self {
            name: name.into(),
            sources,
            all_internal: TriState::NotApplicable,
        }
    }

    /// Set the all-cloud-internal flag
    #[must_use]
    pub const fn with_all_internal(mut self, flag: TriState) -> Self {
        self.all_internal = flag;
        self
    }

    const fn all_internal_default() -> TriState {
        TriState::NotApplicable
    }
}

/// A port-agnostic allow-list: reachable iff some rule admits the source
#[derive(Debug, Clone, Default)]
pub struct AllowListEngine {
    rules: Vec<Rule>,
}

impl AllowListEngine {
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleEngine for AllowListEngine {
    fn allows_ip(&self, source: &AddressSet) -> Verdict {
        eval_allow_rules(&self.rules, source)
    }

    /// Generic rule lists do not narrow by port; the port is ignored.
    fn allows_ip_to_port(&self, source: &AddressSet, _port: u16) -> Verdict {
        self.allows_ip(source)
    }

    fn respects_whitelist(&self, whitelist: &Whitelist) -> Result<Compliance, EvalError> {
        check_sources(self.rules.iter().map(|r| &r.sources), whitelist)
    }
}

/// Scan an allow-rule list for `source`
///
/// A definite match wins immediately with the full-wildcard route (the
/// list does not narrow by port). Otherwise an indeterminate containment,
/// or any rule flagged as admitting all cloud-internal addresses, turns a
/// would-be `False` into `Unknown`.
pub(super) fn eval_allow_rules(rules: &[Rule], source: &AddressSet) -> Verdict {
    let mut uncertain = false;
    for rule in rules {
        let contained = rule.sources.tri_contains(source);
        if contained.is_true() {
            trace!(rule = %rule.name, %source, "allow rule matched");
            return Verdict::open();
        }
        if contained.is_indeterminate() || rule.all_internal.is_true() {
            uncertain = true;
        }
    }
    debug!(%source, uncertain, "no allow rule matched");
    if uncertain {
        Verdict::unknown()
    } else {
        Verdict::denied()
    }
}

/// Port-agnostic whitelist check over a list of rule source sets
///
/// Requires the whitelist's all-ports form; a per-port map cannot be
/// honored by a port-agnostic engine and yields `NotApplicable`. Every
/// source not definitely inside the approved set becomes an
/// `{address, *}` exception.
pub(super) fn check_sources<'a>(
    sources: impl Iterator<Item = &'a AddressSet>,
    whitelist: &Whitelist,
) -> Result<Compliance, EvalError> {
    whitelist.validate()?;
    let Some(approved) = &whitelist.all_ports else {
        return Ok(Compliance::not_applicable());
    };
    let mut exceptions = Vec::new();
    for source in sources {
        let verdict = approved.tri_contains(source);
        if !verdict.is_true() {
            trace!(%source, %verdict, "source outside whitelist");
            exceptions.push((IPPort::new(source.clone(), PortSet::any()), verdict));
        }
    }
    Ok(Compliance::from_exceptions(exceptions))
}

/// Whitelist check for a default-open posture: an engine that admits the
/// whole address space only complies with a whitelist that approves the
/// whole address space.
pub(super) fn check_default_open(whitelist: &Whitelist) -> Result<Compliance, EvalError> {
    whitelist.validate()?;
    if whitelist.is_wildcard() {
        return Ok(Compliance::compliant());
    }
    Ok(Compliance::from_exceptions(vec![(
        IPPort::wildcard(),
        TriState::False,
    )]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(text: &str) -> AddressSet {
        AddressSet::parse(text).unwrap()
    }

    fn engine(sources: &[&str]) -> AllowListEngine {
        AllowListEngine::new(
            sources
                .iter()
                .enumerate()
                .map(|(i, s)| Rule::new(format!("rule{i}"), addr(s)))
                .collect(),
        )
    }

    #[test]
    fn test_empty_rule_set_is_closed() {
        let engine = AllowListEngine::default();
        assert!(engine.is_empty());
        assert_eq!(engine.allows_ip(&addr("10.0.0.1")), Verdict::denied());
        assert_eq!(engine.allows_ip(&AddressSet::any()), Verdict::denied());
    }

    #[test]
    fn test_definite_match_yields_wildcard_route() {
        let engine = engine(&["10.0.0.0/24", "192.168.1.0/24"]);
        let verdict = engine.allows_ip(&addr("192.168.1.7"));
        assert_eq!(verdict, Verdict::open());
    }

    #[test]
    fn test_no_match_is_false() {
        let engine = engine(&["10.0.0.0/24"]);
        assert_eq!(engine.allows_ip(&addr("10.0.1.1")), Verdict::denied());
    }

    #[test]
    fn test_symbolic_rule_degrades_to_unknown() {
        let engine = engine(&["10.0.0.0/24", "VirtualNetwork"]);
        // 10.0.0.5 matches definitely despite the symbolic rule
        assert!(engine.allows_ip(&addr("10.0.0.5")).is_allowed());
        // outside the concrete rule, the symbolic rule blocks a definite No
        assert_eq!(engine.allows_ip(&addr("172.16.0.1")), Verdict::unknown());
    }

    #[test]
    fn test_all_internal_flag_degrades_to_unknown() {
        let rules = vec![
            Rule::new("office", addr("203.0.113.0/24")).with_all_internal(TriState::True),
        ];
        let engine = AllowListEngine::new(rules);
        assert_eq!(engine.allows_ip(&addr("10.9.9.9")), Verdict::unknown());
    }

    #[test]
    fn test_port_query_delegates() {
        let engine = engine(&["10.0.0.0/24"]);
        assert_eq!(
            engine.allows_ip_to_port(&addr("10.0.0.5"), 4444),
            engine.allows_ip(&addr("10.0.0.5"))
        );
    }

    #[test]
    fn test_whitelist_compliant() {
        let engine = engine(&["10.0.0.0", "10.255.255.255"]);
        let wl = Whitelist::for_all_ports(addr("10.0.0.0/8"));
        let result = engine.respects_whitelist(&wl).unwrap();
        assert_eq!(result, Compliance::compliant());
    }

    #[test]
    fn test_whitelist_violation_reports_exception() {
        let engine = engine(&["10.0.0.0", "10.255.255.255", "192.168.1.2"]);
        let wl = Whitelist::for_all_ports(addr("10.0.0.0/8"));
        let result = engine.respects_whitelist(&wl).unwrap();
        assert_eq!(result.state, TriState::False);
        assert_eq!(
            result.exceptions,
            vec![IPPort::new(addr("192.168.1.2"), PortSet::any())]
        );
    }

    #[test]
    fn test_whitelist_symbolic_rule_is_unknown() {
        let engine = engine(&["10.0.0.1", "VirtualNetwork"]);
        let wl = Whitelist::for_all_ports(addr("10.0.0.0/8"));
        let result = engine.respects_whitelist(&wl).unwrap();
        assert_eq!(result.state, TriState::Unknown);
        assert_eq!(
            result.exceptions,
            vec![IPPort::new(addr("VirtualNetwork"), PortSet::any())]
        );
    }

    #[test]
    fn test_per_port_whitelist_not_applicable() {
        use std::collections::BTreeMap;
        let engine = engine(&["10.0.0.1"]);
        let wl = Whitelist::for_ports(BTreeMap::from([(443, addr("10.0.0.0/8"))]));
        let result = engine.respects_whitelist(&wl).unwrap();
        assert_eq!(result, Compliance::not_applicable());
    }

    #[test]
    fn test_empty_whitelist_is_an_error() {
        let engine = engine(&["10.0.0.1"]);
        assert_eq!(
            engine.respects_whitelist(&Whitelist::default()),
            Err(EvalError::BadWhitelist)
        );
    }
}
