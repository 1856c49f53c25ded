use chrono::Utc;

use crate::error::Result;
use crate::store::Store;
use crate::types::{AccessRule, Capabilities};

/// One entry of the seed table.
#[derive(Debug, Clone, Copy)]
pub struct DefaultRule {
    pub role: &'static str,
    pub endpoint: &'static str,
    pub capabilities: Capabilities,
}

const fn rule(role: &'static str, endpoint: &'static str, capabilities: Capabilities) -> DefaultRule {
    DefaultRule {
        role,
        endpoint,
        capabilities,
    }
}

/// Rules seeded at startup. Within each endpoint the capability sets grow
/// from `user` to `admin` to `superadmin`.
pub const DEFAULT_RULES: &[DefaultRule] = &[
    rule("user", "/dashboard", Capabilities::VIEW),
    rule("user", "/datastore/browse", Capabilities::VIEW),
    rule("user", "/datastore/manage", Capabilities::CONTRIBUTE),
    rule("user", "/datastore/create", Capabilities::CONTRIBUTE),
    rule("user", "/settings", Capabilities::VIEW),
    rule("user", "/about", Capabilities::VIEW),
    rule("user", "/support", Capabilities::VIEW),
    rule("user", "/pipeline", Capabilities::VIEW),
    rule("user", "/usermanagement", Capabilities::NONE),
    rule("admin", "/dashboard", Capabilities::FULL),
    rule("admin", "/datastore/browse", Capabilities::FULL),
    rule("admin", "/datastore/manage", Capabilities::FULL),
    rule("admin", "/datastore/create", Capabilities::FULL),
    rule("admin", "/settings", Capabilities::FULL),
    rule("admin", "/about", Capabilities::FULL),
    rule("admin", "/support", Capabilities::FULL),
    rule("admin", "/pipeline", Capabilities::FULL),
    rule("admin", "/usermanagement", Capabilities::FULL),
    rule("superadmin", "/dashboard", Capabilities::FULL),
    rule("superadmin", "/datastore/browse", Capabilities::FULL),
    rule("superadmin", "/datastore/manage", Capabilities::FULL),
    rule("superadmin", "/datastore/create", Capabilities::FULL),
    rule("superadmin", "/settings", Capabilities::FULL),
    rule("superadmin", "/about", Capabilities::FULL),
    rule("superadmin", "/support", Capabilities::FULL),
    rule("superadmin", "/pipeline", Capabilities::FULL),
    rule("superadmin", "/usermanagement", Capabilities::FULL),
];

/// Inserts every default rule whose (role, endpoint) pair is missing.
/// Existing rules are left as they are, customised or not.
/// Returns how many rules were inserted.
pub fn upsert_defaults(store: &dyn Store) -> Result<usize> {
    let now = Utc::now();
    let mut inserted = 0;

    for default in DEFAULT_RULES {
        let rule = AccessRule {
            role: default.role.to_string(),
            endpoint: default.endpoint.to_string(),
            capabilities: default.capabilities,
            created_at: now,
        };
        if store.insert_access_rule_if_absent(&rule)? {
            inserted += 1;
        }
    }

    if inserted > 0 {
        tracing::info!("Seeded {inserted} default access rules");
    }
    Ok(inserted)
}
