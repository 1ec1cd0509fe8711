//! Operator-supplied whitelist
//!
//! A [`Whitelist`] names the address space an operator considers
//! acceptable for inbound exposure, either as one address set applying to
//! every port or as a map from specific ports to address sets. Engines
//! check their rules against it via `respects_whitelist` and report
//! violations as [`crate::IPPort`] exceptions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::addrset::AddressSet;
use crate::error::EvalError;
use crate::tristate::TriState;

/// Approved inbound address space, all-ports and/or per-port
///
/// At least one of the two forms must be present for compliance checks to
/// be meaningful; [`validate`](Self::validate) enforces that. A
/// port-agnostic engine can only honor the all-ports form and reports
/// `NotApplicable` when handed a per-port map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Whitelist {
    /// Address set approved for every port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_ports: Option<AddressSet>,

    /// Address sets approved for specific ports only. `BTreeMap` keeps
    /// exception reporting deterministic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_port: Option<BTreeMap<u16, AddressSet>>,
}

impl Whitelist {
    /// A whitelist approving `addresses` on every port
    #[must_use]
    pub const fn for_all_ports(addresses: AddressSet) -> Self {
        Self {
            all_ports: Some(addresses),
            per_port: None,
        }
    }

    /// A whitelist approving addresses per port
    #[must_use]
    pub const fn for_ports(map: BTreeMap<u16, AddressSet>) -> Self {
        Self {
            all_ports: None,
            per_port: Some(map),
        }
    }

    /// Check that at least one of the two forms is present
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::BadWhitelist`] when the whitelist defines
    /// neither form. An empty whitelist is a configuration mistake, not a
    /// deny-everything policy.
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.all_ports.is_none() && self.per_port.is_none() {
            return Err(EvalError::BadWhitelist);
        }
        Ok(())
    }

    /// Whether the all-ports form approves every address
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.all_ports.as_ref().is_some_and(AddressSet::is_wildcard)
    }

    /// Verdict on exposing `source` on every port at once
    ///
    /// Only the all-ports form can approve that; a per-port map never
    /// covers the whole port space here.
    #[must_use]
    pub fn covers_all_ports(&self, source: &AddressSet) -> TriState {
        match &self.all_ports {
            Some(approved) => approved.tri_contains(source),
            None => TriState::False,
        }
    }

    /// Verdict on exposing `source` on one specific port
    ///
    /// The all-ports set and the port's own entry are both consulted; the
    /// more allowing of the two answers wins, so a definite approval from
    /// either form is enough.
    #[must_use]
    pub fn covers_port(&self, source: &AddressSet, port: u16) -> TriState {
        let mut best = self.covers_all_ports(source);
        if best.is_true() {
            return best;
        }
        if let Some(map) = &self.per_port {
            if let Some(approved) = map.get(&port) {
                best = best.max(approved.tri_contains(source));
            }
        }
        best
    }
}
