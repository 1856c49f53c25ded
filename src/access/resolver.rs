use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{DEFAULT_ROLE, Role, User};

/// Why a user fell back to the default role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultReason {
    NoRoleReference,
    DanglingReference,
    UnnamedRole,
    LookupFailed,
}

/// Outcome of resolving a user's role. Resolution never fails: anything
/// short of a named role record degrades to [`DEFAULT_ROLE`].
#[derive(Debug, Clone)]
pub enum RoleResolution {
    Found(Role),
    UseDefault(DefaultReason),
}

impl RoleResolution {
    #[must_use]
    pub fn role_name(&self) -> &str {
        match self {
            RoleResolution::Found(role) => &role.name,
            RoleResolution::UseDefault(_) => DEFAULT_ROLE,
        }
    }
}

pub fn resolve_role(store: &dyn Store, user: &User) -> RoleResolution {
    let Some(role_id) = user.role_id.as_deref().filter(|id| !id.is_empty()) else {
        return RoleResolution::UseDefault(DefaultReason::NoRoleReference);
    };

    match store.get_role(role_id) {
        Ok(Some(role)) if !role.name.is_empty() => RoleResolution::Found(role),
        Ok(Some(_)) => RoleResolution::UseDefault(DefaultReason::UnnamedRole),
        Ok(None) => RoleResolution::UseDefault(DefaultReason::DanglingReference),
        Err(e) => {
            tracing::warn!("Role lookup failed for role_id={role_id}, using default: {e}");
            RoleResolution::UseDefault(DefaultReason::LookupFailed)
        }
    }
}

/// Resolves the role name for an identity-provider subject.
/// Fails with `NotFound` only when no user maps to `external_id`.
pub fn resolve_role_name(store: &dyn Store, external_id: &str) -> Result<String> {
    let user = store
        .get_user_by_external_id(external_id)?
        .ok_or(Error::NotFound)?;

    let resolution = resolve_role(store, &user);
    tracing::debug!(
        "User role resolved: role_id={:?} resolution={:?}",
        user.role_id,
        resolution
    );
    Ok(resolution.role_name().to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::store::SqliteStore;

    fn setup() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();

        let now = Utc::now();
        store
            .create_role(&Role {
                id: "role-admin".to_string(),
                name: "admin".to_string(),
                description: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        (temp, store)
    }

    fn user(external_id: &str, role_id: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: format!("id-{external_id}"),
            external_id: external_id.to_string(),
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            role_id: role_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_found_role() {
        let (_temp, store) = setup();
        store.create_user(&user("sub-a", Some("role-admin"))).unwrap();
        assert_eq!(resolve_role_name(&store, "sub-a").unwrap(), "admin");
    }

    #[test]
    fn test_missing_reference_defaults() {
        let (_temp, store) = setup();
        let u = user("sub-b", None);
        assert!(matches!(
            resolve_role(&store, &u),
            RoleResolution::UseDefault(DefaultReason::NoRoleReference)
        ));
    }

    #[test]
    fn test_dangling_reference_defaults() {
        let (_temp, store) = setup();
        store.create_user(&user("sub-c", Some("role-gone"))).unwrap();

        let u = store.get_user_by_external_id("sub-c").unwrap().unwrap();
        assert!(matches!(
            resolve_role(&store, &u),
            RoleResolution::UseDefault(DefaultReason::DanglingReference)
        ));
        assert_eq!(resolve_role_name(&store, "sub-c").unwrap(), DEFAULT_ROLE);
    }

    #[test]
    fn test_unknown_subject_is_not_found() {
        let (_temp, store) = setup();
        assert!(matches!(
            resolve_role_name(&store, "nobody"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_failed_lookup_defaults() {
        let (temp, store) = setup();
        store.create_user(&user("sub-d", Some("role-admin"))).unwrap();

        let conn = rusqlite::Connection::open(temp.path().join("test.db")).unwrap();
        conn.execute_batch("DROP TABLE roles").unwrap();

        let u = store.get_user_by_external_id("sub-d").unwrap().unwrap();
        assert!(matches!(
            resolve_role(&store, &u),
            RoleResolution::UseDefault(DefaultReason::LookupFailed)
        ));
        assert_eq!(resolve_role_name(&store, "sub-d").unwrap(), DEFAULT_ROLE);
    }
}
