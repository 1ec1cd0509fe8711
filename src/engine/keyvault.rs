//! Key-vault network ACL engine
//!
//! The vault ACL is not governed by rule-list emptiness but by a separate
//! default-allow flag: when set, everything is reachable regardless of the
//! listed rules. Without it, the listed IP rules behave like the generic
//! allow-list, except that virtual-network rules (subnet grants this
//! evaluator cannot resolve) keep any non-match from being a definite
//! `False`.

use tracing::debug;

use crate::addrset::{AddressSet, SpecialClass};
use crate::error::EvalError;
use crate::whitelist::Whitelist;

use super::allowlist::{check_default_open, check_sources, eval_allow_rules};
use super::{Compliance, Rule, RuleEngine, Verdict};

/// A key-vault network ACL
#[derive(Debug, Clone, Default)]
pub struct KeyVaultAcl {
    default_allow: bool,
    /// IP rules followed by the virtual-network rules, which are carried
    /// as symbolic `VirtualNetwork` sources so every evaluation path sees
    /// them as unresolvable rather than absent.
    rules: Vec<Rule>,
}

impl KeyVaultAcl {
    #[must_use]
    pub fn new(default_allow: bool, ip_rules: Vec<Rule>) -> Self {
        Self {
            default_allow,
            rules: ip_rules,
        }
    }

    /// Record a virtual-network rule (a subnet grant identified only by
    /// name)
    #[must_use]
    pub fn with_virtual_network_rule(mut self, name: impl Into<String>) -> Self {
        self.rules.push(Rule::new(
            name,
            AddressSet::special(SpecialClass::VirtualNetwork),
        ));
        self
    }

    #[must_use]
    pub const fn default_allow(&self) -> bool {
        self.default_allow
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl RuleEngine for KeyVaultAcl {
    fn allows_ip(&self, source: &AddressSet) -> Verdict {
        if self.default_allow {
            debug!(%source, "default-allow ACL, open");
            return Verdict::open();
        }
        eval_allow_rules(&self.rules, source)
    }

    /// Vault ACLs do not narrow by port
    fn allows_ip_to_port(&self, source: &AddressSet, _port: u16) -> Verdict {
        self.allows_ip(source)
    }

    fn respects_whitelist(&self, whitelist: &Whitelist) -> Result<Compliance, EvalError> {
        if self.default_allow {
            return check_default_open(whitelist);
        }
        check_sources(self.rules.iter().map(|r| &r.sources), whitelist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::IPPort;
    use crate::tristate::TriState;

    fn addr(text: &str) -> AddressSet {
        AddressSet::parse(text).unwrap()
    }

    #[test]
    fn test_default_allow_overrides_rules() {
        let acl = KeyVaultAcl::new(true, vec![Rule::new("office", addr("203.0.113.0/24"))]);
        // reachable even for sources no rule admits
        assert_eq!(acl.allows_ip(&addr("8.8.8.8")), Verdict::open());
        assert_eq!(acl.allows_ip_to_port(&addr("8.8.8.8"), 443), Verdict::open());
    }

    #[test]
    fn test_closed_without_rules() {
        let acl = KeyVaultAcl::new(false, Vec::new());
        assert_eq!(acl.allows_ip(&addr("10.0.0.1")), Verdict::denied());
    }

    #[test]
    fn test_ip_rules_behave_like_allow_list() {
        let acl = KeyVaultAcl::new(false, vec![Rule::new("office", addr("203.0.113.0/24"))]);
        assert!(acl.allows_ip(&addr("203.0.113.7")).is_allowed());
        assert_eq!(acl.allows_ip(&addr("8.8.8.8")), Verdict::denied());
    }

    #[test]
    fn test_virtual_network_rules_prevent_definite_deny() {
        // empty IP rule list but a subnet grant exists
        let acl = KeyVaultAcl::new(false, Vec::new()).with_virtual_network_rule("app-subnet");
        assert_eq!(acl.allows_ip(&addr("10.0.0.1")), Verdict::unknown());

        // an IP rule that misses degrades the same way
        let acl = KeyVaultAcl::new(false, vec![Rule::new("office", addr("203.0.113.0/24"))])
            .with_virtual_network_rule("app-subnet");
        assert!(acl.allows_ip(&addr("203.0.113.7")).is_allowed());
        assert_eq!(acl.allows_ip(&addr("8.8.8.8")), Verdict::unknown());
    }

    #[test]
    fn test_whitelist_default_allow_only_complies_with_wildcard() {
        let acl = KeyVaultAcl::new(true, Vec::new());
        let wildcard = Whitelist::for_all_ports(AddressSet::any());
        assert_eq!(acl.respects_whitelist(&wildcard).unwrap(), Compliance::compliant());

        let narrow = Whitelist::for_all_ports(addr("10.0.0.0/8"));
        let result = acl.respects_whitelist(&narrow).unwrap();
        assert_eq!(result.state, TriState::False);
        assert_eq!(result.exceptions, vec![IPPort::wildcard()]);
    }

    #[test]
    fn test_whitelist_virtual_network_rule_is_unknown() {
        let acl = KeyVaultAcl::new(false, vec![Rule::new("office", addr("10.1.0.0/16"))])
            .with_virtual_network_rule("app-subnet");
        let wl = Whitelist::for_all_ports(addr("10.0.0.0/8"));
        let result = acl.respects_whitelist(&wl).unwrap();
        assert_eq!(result.state, TriState::Unknown);
        assert_eq!(result.exceptions.len(), 1);
        assert_eq!(result.exceptions[0].address, addr("VirtualNetwork"));
    }
}
