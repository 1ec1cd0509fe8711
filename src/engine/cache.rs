//! Cache (Redis-style) firewall engine
//!
//! The cache firewall inverts the generic default: a cache with *no*
//! firewall rules is open to everything, because the platform only
//! restricts access once a first rule exists. The override lives in this
//! type rather than in the generic engine so the unusual posture is
//! explicit at the call site.

use tracing::debug;

use crate::addrset::AddressSet;
use crate::error::EvalError;
use crate::whitelist::Whitelist;

use super::allowlist::{check_default_open, check_sources, eval_allow_rules};
use super::{Compliance, Rule, RuleEngine, Verdict};

/// A cache firewall: allow rules with a default-open empty state
#[derive(Debug, Clone, Default)]
pub struct CacheFirewall {
    rules: Vec<Rule>,
}

impl CacheFirewall {
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleEngine for CacheFirewall {
    fn allows_ip(&self, source: &AddressSet) -> Verdict {
        if self.rules.is_empty() {
            debug!(%source, "no firewall rules, cache is open");
            return Verdict::open();
        }
        eval_allow_rules(&self.rules, source)
    }

    /// Cache firewalls do not narrow by port
    fn allows_ip_to_port(&self, source: &AddressSet, _port: u16) -> Verdict {
        self.allows_ip(source)
    }

    fn respects_whitelist(&self, whitelist: &Whitelist) -> Result<Compliance, EvalError> {
        if self.rules.is_empty() {
            return check_default_open(whitelist);
        }
        check_sources(self.rules.iter().map(|r| &r.sources), whitelist)
    }
}
