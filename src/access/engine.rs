use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use super::resolver::resolve_role_name;
use super::rules::upsert_defaults;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{AccessRule, Capabilities, Capability};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    #[serde(flatten)]
    pub capabilities: Capabilities,
    pub role_name: String,
}

impl AccessDecision {
    #[must_use]
    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }
}

/// Picks the rule with the longest endpoint that is a string prefix of
/// `path`. On equal lengths the earlier rule in `rules` wins.
pub fn find_matching_rule<'a>(rules: &'a [AccessRule], path: &str) -> Option<&'a AccessRule> {
    let mut best: Option<&AccessRule> = None;
    for rule in rules.iter().filter(|r| path.starts_with(r.endpoint.as_str())) {
        if best.is_none_or(|b| rule.endpoint.len() > b.endpoint.len()) {
            best = Some(rule);
        }
    }
    best
}

/// Decides which capabilities a principal holds on a route.
///
/// Holds no mutable state besides the seeding flag, so one instance is
/// shared by all request handlers.
pub struct AccessDecisionEngine {
    store: Arc<dyn Store>,
    seeded: AtomicBool,
}

impl AccessDecisionEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            seeded: AtomicBool::new(false),
        }
    }

    /// Seeds default rules once per process. Seeding is idempotent, so a
    /// race between two first callers only costs a redundant pass.
    pub fn ensure_defaults(&self) -> Result<()> {
        if self.seeded.load(Ordering::Acquire) {
            return Ok(());
        }
        upsert_defaults(self.store.as_ref())?;
        self.seeded.store(true, Ordering::Release);
        Ok(())
    }

    /// Capabilities of `role_name` on `path`; none if no rule matches.
    pub fn decide(&self, role_name: &str, path: &str) -> Result<Capabilities> {
        let rules = self.store.list_access_rules(role_name)?;
        match find_matching_rule(&rules, path) {
            Some(rule) => {
                tracing::debug!("Matched endpoint access: role={} endpoint={}", rule.role, rule.endpoint);
                Ok(rule.capabilities)
            }
            None => {
                tracing::info!("No endpoint access rule found: role={role_name} path={path}");
                Ok(Capabilities::NONE)
            }
        }
    }

    /// Full access check for an identity-provider subject.
    pub fn check_access(&self, external_id: Option<&str>, path: &str) -> Result<AccessDecision> {
        self.ensure_defaults()?;

        let external_id = external_id
            .filter(|id| !id.is_empty())
            .ok_or(Error::Unauthenticated)?;

        let role_name = resolve_role_name(self.store.as_ref(), external_id).inspect_err(|e| {
            if matches!(e, Error::NotFound) {
                tracing::warn!("User not found for external_id={external_id}");
            }
        })?;

        let capabilities = self.decide(&role_name, path)?;
        Ok(AccessDecision {
            capabilities,
            role_name,
        })
    }
}
