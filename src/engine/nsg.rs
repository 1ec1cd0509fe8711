//! Priority-ordered, directional security-group engine
//!
//! Rules carry an allow/deny action, a direction, and an integer priority
//! where a lower number means higher precedence. Reachability is a race
//! between the best-priority allow and the best-priority deny seen across
//! the inbound rules; outbound rules are stored but never analyzed.
//!
//! When no inbound rule matches at all, both precedents stay at their
//! unreachable maximum and the race resolves to *allow*. That is the
//! observed platform behavior and is kept deliberately; the integration
//! suite pins it as a named property.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::addrset::AddressSet;
use crate::error::EvalError;
use crate::portset::PortSet;
use crate::route::{IPPort, PacketRoute, Protocol};
use crate::tristate::TriState;
use crate::whitelist::Whitelist;

use super::{Compliance, RuleEngine, Verdict};

/// Allow or deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Allow,
    Deny,
}

/// Traffic direction a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One security-group rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub name: String,
    pub access: Access,
    pub direction: Direction,
    /// Lower numeric value = higher precedence
    pub priority: i32,
    pub protocol: Protocol,
    pub sources: Vec<AddressSet>,
    pub destinations: Vec<AddressSet>,
    pub source_ports: Vec<PortSet>,
    pub destination_ports: Vec<PortSet>,
}

impl SecurityGroupRule {
    /// Whether any of the rule's destination port sets contains `port`
    fn matches_port(&self, port: u16) -> bool {
        self.destination_ports.iter().any(|p| p.contains(port))
    }

    /// The routes this rule opens: one per destination/destination-port
    /// combination.
    fn routes(&self) -> Vec<PacketRoute> {
        let mut routes = Vec::new();
        for dest in &self.destinations {
            for ports in &self.destination_ports {
                routes.push(PacketRoute::new(
                    self.protocol,
                    dest.clone(),
                    ports.clone(),
                ));
            }
        }
        routes
    }
}

/// Both precedents start at an unreachable maximum; `i64` keeps
/// `i32::MAX`-priority rules distinguishable from "nothing seen".
const NO_PRECEDENT: i64 = i64::MAX;

/// A security group: inbound and outbound rule lists, each sorted
/// ascending by priority at construction time
#[derive(Debug, Clone, Default)]
pub struct SecurityGroup {
    inbound: Vec<SecurityGroupRule>,
    outbound: Vec<SecurityGroupRule>,
}

impl SecurityGroup {
    /// Partition `rules` by direction and sort each list by ascending
    /// priority, so every scan sees higher-precedence rules first.
    #[must_use]
    pub fn new(rules: Vec<SecurityGroupRule>) -> Self {
        let mut inbound = Vec::new();
        let mut outbound = Vec::new();
        for rule in rules {
            match rule.direction {
                Direction::Inbound => inbound.push(rule),
                Direction::Outbound => outbound.push(rule),
            }
        }
        inbound.sort_by_key(|r| r.priority);
        outbound.sort_by_key(|r| r.priority);
        Self { inbound, outbound }
    }

    #[must_use]
    pub fn inbound_rules(&self) -> &[SecurityGroupRule] {
        &self.inbound
    }

    #[must_use]
    pub fn outbound_rules(&self) -> &[SecurityGroupRule] {
        &self.outbound
    }
}

impl RuleEngine for SecurityGroup {
    /// Port-agnostic race over the inbound rules
    ///
    /// An indeterminate source containment short-circuits the whole scan:
    /// without resolving it, no later rule can be trusted to decide the
    /// race.
    fn allows_ip(&self, source: &AddressSet) -> Verdict {
        let mut best_allow = NO_PRECEDENT;
        let mut best_deny = NO_PRECEDENT;
        let mut routes = Vec::new();

        for rule in &self.inbound {
            let priority = i64::from(rule.priority);
            for rule_source in &rule.sources {
                let contained = rule_source.tri_contains(source);
                if contained.is_indeterminate() {
                    debug!(rule = %rule.name, %source, "indeterminate source containment");
                    return Verdict {
                        state: contained,
                        routes: Vec::new(),
                    };
                }
                if !contained.is_true() {
                    continue;
                }
                match rule.access {
                    Access::Allow if priority < best_deny => {
                        trace!(rule = %rule.name, priority, "allow precedent");
                        best_allow = best_allow.min(priority);
                        routes.extend(rule.routes());
                    }
                    Access::Deny if priority < best_allow => {
                        trace!(rule = %rule.name, priority, "deny precedent");
                        best_deny = best_deny.min(priority);
                    }
                    _ => {}
                }
                // one hit per rule is enough
                break;
            }
        }

        finish_race(best_allow, best_deny, routes)
    }

    /// Port-aware race: a rule participates only when its destination
    /// ports cover `port`
    ///
    /// Unlike [`allows_ip`](Self::allows_ip), an indeterminate source
    /// containment does not short-circuit; it is recorded as an unknown
    /// precedent that wins only with a strictly better priority than both
    /// definite precedents.
    fn allows_ip_to_port(&self, source: &AddressSet, port: u16) -> Verdict {
        let mut best_allow = NO_PRECEDENT;
        let mut best_deny = NO_PRECEDENT;
        let mut best_unknown = NO_PRECEDENT;
        let mut routes = Vec::new();

        for rule in &self.inbound {
            if !rule.matches_port(port) {
                continue;
            }
            let priority = i64::from(rule.priority);
            for rule_source in &rule.sources {
                let contained = rule_source.tri_contains(source);
                if contained.is_indeterminate() {
                    trace!(rule = %rule.name, priority, "unknown precedent");
                    best_unknown = best_unknown.min(priority);
                    break;
                }
                if !contained.is_true() {
                    continue;
                }
                match rule.access {
                    Access::Allow if priority < best_deny => {
                        trace!(rule = %rule.name, priority, port, "allow precedent");
                        best_allow = best_allow.min(priority);
                        routes.extend(rule.routes());
                    }
                    Access::Deny if priority < best_allow => {
                        trace!(rule = %rule.name, priority, port, "deny precedent");
                        best_deny = best_deny.min(priority);
                    }
                    _ => {}
                }
                break;
            }
        }

        if best_unknown < best_allow && best_unknown < best_deny {
            debug!(%source, port, "unknown precedent wins the race");
            return Verdict::unknown();
        }
        finish_race(best_allow, best_deny, routes)
    }

    /// Port-aware whitelist check over the inbound *allow* rules
    ///
    /// Never returns `NotApplicable`: this engine can honor both whitelist
    /// forms. Each offending (source set, destination port-set) pair
    /// becomes one exception.
    fn respects_whitelist(&self, whitelist: &Whitelist) -> Result<Compliance, EvalError> {
        whitelist.validate()?;
        let mut exceptions = Vec::new();
        for rule in &self.inbound {
            if rule.access != Access::Allow {
                continue;
            }
            for source in &rule.sources {
                let base = whitelist.covers_all_ports(source);
                if base.is_true() {
                    continue;
                }
                for ports in &rule.destination_ports {
                    let verdict = port_set_verdict(whitelist, source, ports, base);
                    if !verdict.is_true() {
                        trace!(rule = %rule.name, %source, %ports, %verdict, "whitelist exception");
                        exceptions.push((IPPort::new(source.clone(), ports.clone()), verdict));
                    }
                }
            }
        }
        Ok(Compliance::from_exceptions(exceptions))
    }
}

/// Resolve the allow/deny race. A deny wins only with a *strictly* better
/// priority, so the empty race (both precedents at the maximum) resolves
/// to allow.
fn finish_race(best_allow: i64, best_deny: i64, routes: Vec<PacketRoute>) -> Verdict {
    if best_deny < best_allow {
        Verdict::denied()
    } else {
        Verdict::allowed(routes)
    }
}

/// Worst whitelist verdict for `source` across every port in `ports`
///
/// `base` is the (non-`True`) all-ports verdict. Only ports with their own
/// whitelist entry can do better than `base`, so the scan walks the
/// per-port map instead of enumerating the port set; any port without an
/// entry contributes `base` itself.
fn port_set_verdict(
    whitelist: &Whitelist,
    source: &AddressSet,
    ports: &PortSet,
    base: TriState,
) -> TriState {
    let Some(map) = &whitelist.per_port else {
        return base;
    };
    let mut worst = TriState::True;
    let mut covered: u32 = 0;
    for (&port, approved) in map {
        if ports.contains(port) {
            covered += 1;
            worst = worst.worst(approved.tri_contains(source).max(base));
        }
    }
    if covered < ports.size() {
        worst = worst.worst(base);
    }
    worst
}
