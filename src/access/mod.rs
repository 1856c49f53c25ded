//! Role-based access to UI routes.
//!
//! A user's role is resolved from their identity-provider subject, then the
//! role's rule with the longest endpoint prefix of the requested path decides
//! which capabilities apply.

mod engine;
mod resolver;
mod rules;

pub use engine::{AccessDecision, AccessDecisionEngine, find_matching_rule};
pub use resolver::{DefaultReason, RoleResolution, resolve_role, resolve_role_name};
pub use rules::{DEFAULT_RULES, DefaultRule, upsert_defaults};
