use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three independent capabilities an access rule can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Viewer,
    Contributor,
    Admin,
}

impl Capability {
    pub fn parse(s: &str) -> Option<Capability> {
        match s {
            "viewer" => Some(Self::Viewer),
            "contributor" => Some(Self::Contributor),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Contributor => "contributor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The capability set granted for a route. The three flags are independent;
/// admin does not imply contributor or viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub viewer: bool,
    pub contributor: bool,
    pub admin: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities::new(false, false, false);
    pub const VIEW: Capabilities = Capabilities::new(true, false, false);
    pub const CONTRIBUTE: Capabilities = Capabilities::new(true, true, false);
    pub const FULL: Capabilities = Capabilities::new(true, true, true);

    #[must_use]
    pub const fn new(viewer: bool, contributor: bool, admin: bool) -> Self {
        Self {
            viewer,
            contributor,
            admin,
        }
    }

    #[must_use]
    pub const fn has(self, capability: Capability) -> bool {
        match capability {
            Capability::Viewer => self.viewer,
            Capability::Contributor => self.contributor,
            Capability::Admin => self.admin,
        }
    }

    /// True if every capability granted by `self` is also granted by `other`.
    #[must_use]
    pub const fn is_subset_of(self, other: Capabilities) -> bool {
        (!self.viewer || other.viewer)
            && (!self.contributor || other.contributor)
            && (!self.admin || other.admin)
    }

    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        [Capability::Viewer, Capability::Contributor, Capability::Admin]
            .into_iter()
            .filter(|c| self.has(*c))
            .map(Capability::as_str)
            .collect()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}
