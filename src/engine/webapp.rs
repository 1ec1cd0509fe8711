//! Web-app IP restriction engine
//!
//! Restrictions carry their own priority field and run the same
//! lower-number-wins allow/deny race as the security-group engine, but
//! over source addresses only; there is no port dimension. Unlike the
//! security group, an empty restriction list is closed.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::addrset::AddressSet;
use crate::error::EvalError;
use crate::whitelist::Whitelist;

use super::allowlist::check_sources;
use super::nsg::Access;
use super::{Compliance, RuleEngine, Verdict};

/// One IP restriction entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebAppRule {
    pub name: String,
    pub action: Access,
    /// Lower numeric value = higher precedence
    pub priority: i32,
    pub sources: AddressSet,
}

/// A web app's inbound IP restrictions, sorted ascending by priority at
/// construction time
#[derive(Debug, Clone, Default)]
pub struct WebAppRestrictions {
    rules: Vec<WebAppRule>,
}

impl WebAppRestrictions {
    #[must_use]
    pub fn new(mut rules: Vec<WebAppRule>) -> Self {
        rules.sort_by_key(|r| r.priority);
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[WebAppRule] {
        &self.rules
    }
}

impl RuleEngine for WebAppRestrictions {
    fn allows_ip(&self, source: &AddressSet) -> Verdict {
        if self.rules.is_empty() {
            return Verdict::denied();
        }

        let mut best_allow = i64::MAX;
        let mut best_deny = i64::MAX;
        for rule in &self.rules {
            let contained = rule.sources.tri_contains(source);
            if contained.is_indeterminate() {
                return Verdict {
                    state: contained,
                    routes: Vec::new(),
                };
            }
            if !contained.is_true() {
                continue;
            }
            let priority = i64::from(rule.priority);
            match rule.action {
                Access::Allow if priority < best_deny => {
                    trace!(rule = %rule.name, priority, "allow precedent");
                    best_allow = best_allow.min(priority);
                }
                Access::Deny if priority < best_allow => {
                    trace!(rule = %rule.name, priority, "deny precedent");
                    best_deny = best_deny.min(priority);
                }
                _ => {}
            }
        }

        if best_deny < best_allow {
            Verdict::denied()
        } else {
            // restrictions admit the source to the whole app, so the
            // evidence is the single full-wildcard route
            Verdict::open()
        }
    }

    /// Restrictions do not narrow by port
    fn allows_ip_to_port(&self, source: &AddressSet, _port: u16) -> Verdict {
        self.allows_ip(source)
    }

    /// Port-agnostic check over the *allow* restrictions only; deny
    /// entries never create exposure
    fn respects_whitelist(&self, whitelist: &Whitelist) -> Result<Compliance, EvalError> {
        check_sources(
            self.rules
                .iter()
                .filter(|r| r.action == Access::Allow)
                .map(|r| &r.sources),
            whitelist,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portset::PortSet;
    use crate::route::IPPort;
    use crate::tristate::TriState;

    fn addr(text: &str) -> AddressSet {
        AddressSet::parse(text).unwrap()
    }

    fn rule(name: &str, action: Access, priority: i32, source: &str) -> WebAppRule {
        WebAppRule {
            name: name.to_string(),
            action,
            priority,
            sources: addr(source),
        }
    }

    #[test]
    fn test_empty_restrictions_are_closed() {
        let app = WebAppRestrictions::default();
        assert_eq!(app.allows_ip(&addr("10.0.0.1")), Verdict::denied());
        assert_eq!(app.allows_ip(&AddressSet::any()), Verdict::denied());
    }

    #[test]
    fn test_priority_race_over_addresses() {
        let app = WebAppRestrictions::new(vec![
            rule("deny-subnet", Access::Deny, 100, "10.0.1.0/24"),
            rule("allow-net", Access::Allow, 200, "10.0.0.0/16"),
        ]);
        // denied inside the higher-precedence deny
        assert_eq!(app.allows_ip(&addr("10.0.1.5")), Verdict::denied());
        // allowed elsewhere in the wider allow
        assert_eq!(app.allows_ip(&addr("10.0.2.5")), Verdict::open());
        // no rule matches: the race resolves to allow, as for security groups
        assert_eq!(app.allows_ip(&addr("192.168.0.1")).state, TriState::True);
    }

    #[test]
    fn test_allow_with_lower_number_beats_deny() {
        let app = WebAppRestrictions::new(vec![
            rule("allow", Access::Allow, 100, "10.0.0.0/8"),
            rule("deny", Access::Deny, 200, "10.0.0.0/8"),
        ]);
        assert_eq!(app.allows_ip(&addr("10.1.2.3")), Verdict::open());
    }

    #[test]
    fn test_symbolic_source_short_circuits() {
        let app = WebAppRestrictions::new(vec![
            rule("vnet", Access::Allow, 100, "VirtualNetwork"),
            rule("allow", Access::Allow, 200, "*"),
        ]);
        assert_eq!(app.allows_ip(&addr("10.0.0.1")), Verdict::unknown());
    }

    #[test]
    fn test_port_query_delegates() {
        let app = WebAppRestrictions::new(vec![rule("allow", Access::Allow, 100, "10.0.0.0/8")]);
        assert_eq!(
            app.allows_ip_to_port(&addr("10.0.0.1"), 8080),
            app.allows_ip(&addr("10.0.0.1"))
        );
    }

    #[test]
    fn test_whitelist_checks_allow_rules_only() {
        let app = WebAppRestrictions::new(vec![
            rule("allow", Access::Allow, 100, "10.0.0.0/24"),
            // outside the whitelist, but a deny entry creates no exposure
            rule("deny", Access::Deny, 200, "198.51.100.0/24"),
        ]);
        let wl = Whitelist::for_all_ports(addr("10.0.0.0/8"));
        assert_eq!(app.respects_whitelist(&wl).unwrap(), Compliance::compliant());
    }

    #[test]
    fn test_whitelist_violation() {
        let app = WebAppRestrictions::new(vec![rule("allow", Access::Allow, 100, "198.51.100.7")]);
        let wl = Whitelist::for_all_ports(addr("10.0.0.0/8"));
        let result = app.respects_whitelist(&wl).unwrap();
        assert_eq!(result.state, TriState::False);
        assert_eq!(
            result.exceptions,
            vec![IPPort::new(addr("198.51.100.7"), PortSet::any())]
        );
    }
}
