use chrono::Utc;
use uuid::Uuid;

use crate::access::upsert_defaults;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{DEFAULT_ROLE, OAuthProfile, Role, User};

/// Built-in roles and their descriptions.
pub const BUILTIN_ROLES: &[(&str, &str)] = &[
    (DEFAULT_ROLE, "Default role for regular users - can view and browse data"),
    ("admin", "Administrator role - can manage data and users"),
    ("superadmin", "Super administrator role - full system access"),
];

/// Returns the named role, creating it if absent. Losing a creation race to
/// another caller yields the winner's record.
pub fn ensure_role(store: &dyn Store, name: &str, description: &str) -> Result<Role> {
    if let Some(role) = store.get_role_by_name(name)? {
        return Ok(role);
    }

    let now = Utc::now();
    let role = Role {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    match store.create_role(&role) {
        Ok(()) => {
            tracing::info!("Created role {name}");
            Ok(role)
        }
        Err(Error::AlreadyExists) => store.get_role_by_name(name)?.ok_or(Error::NotFound),
        Err(e) => Err(e),
    }
}

/// Id of the default `user` role.
pub fn ensure_default_role(store: &dyn Store) -> Result<String> {
    let (name, description) = BUILTIN_ROLES[0];
    ensure_role(store, name, description).map(|role| role.id)
}

/// Creates the built-in roles and seeds default access rules.
pub fn bootstrap_roles(store: &dyn Store) -> Result<Vec<Role>> {
    let roles = BUILTIN_ROLES
        .iter()
        .map(|(name, description)| ensure_role(store, name, description))
        .collect::<Result<Vec<_>>>()?;
    upsert_defaults(store)?;
    Ok(roles)
}

/// Returns the user for `external_id`, creating one with the default role
/// if none exists. An existing record is returned unchanged. The boolean is
/// true when a user was created.
pub fn find_or_create_user_from_oauth(
    store: &dyn Store,
    external_id: &str,
    profile: &OAuthProfile,
) -> Result<(User, bool)> {
    if external_id.is_empty() {
        return Err(Error::Validation("external id must not be empty".to_string()));
    }
    if let Some(user) = store.get_user_by_external_id(external_id)? {
        return Ok((user, false));
    }

    let role_id = ensure_default_role(store)?;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        external_id: external_id.to_string(),
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        email: profile.email.clone(),
        phone: profile.phone.clone(),
        role_id: Some(role_id),
        created_at: now,
        updated_at: now,
    };

    match store.create_user(&user) {
        Ok(()) => {
            tracing::info!("Created user {} for external_id={external_id}", user.id);
            Ok((user, true))
        }
        Err(Error::AlreadyExists) => {
            let existing = store
                .get_user_by_external_id(external_id)?
                .ok_or(Error::NotFound)?;
            Ok((existing, false))
        }
        Err(e) => Err(e),
    }
}

/// Points a user at the named role.
pub fn set_user_role(store: &dyn Store, user_id: &str, role_name: &str) -> Result<User> {
    let role = store.get_role_by_name(role_name)?.ok_or(Error::NotFound)?;
    store.update_user_role(user_id, &role.id)?;
    store.get_user(user_id)?.ok_or(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::access::DEFAULT_RULES;
    use crate::store::SqliteStore;

    fn setup() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    #[test]
    fn test_ensure_default_role_is_stable() {
        let (_temp, store) = setup();
        let first = ensure_default_role(&store).unwrap();
        let second = ensure_default_role(&store).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.list_roles().unwrap().len(), 1);
    }

    #[test]
    fn test_bootstrap_roles_twice() {
        let (_temp, store) = setup();
        bootstrap_roles(&store).unwrap();
        bootstrap_roles(&store).unwrap();

        assert_eq!(store.list_roles().unwrap().len(), BUILTIN_ROLES.len());
        assert_eq!(store.list_all_access_rules().unwrap().len(), DEFAULT_RULES.len());
    }

    #[test]
    fn test_find_or_create_never_duplicates() {
        let (_temp, store) = setup();
        let profile = OAuthProfile {
            first_name: Some("Ada".to_string()),
            ..Default::default()
        };

        let (first, created) = find_or_create_user_from_oauth(&store, "sub-1", &profile).unwrap();
        assert!(created);
        assert_eq!(first.display_name(), "Ada");

        let other = OAuthProfile {
            first_name: Some("Changed".to_string()),
            ..Default::default()
        };
        let (second, created) = find_or_create_user_from_oauth(&store, "sub-1", &other).unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.first_name.as_deref(), Some("Ada"));
        assert_eq!(store.list_users("", 100).unwrap().len(), 1);
    }

    #[test]
    fn test_new_user_gets_default_role() {
        let (_temp, store) = setup();
        let (user, _) =
            find_or_create_user_from_oauth(&store, "sub-2", &OAuthProfile::default()).unwrap();
        let role = store.get_role(user.role_id.as_deref().unwrap()).unwrap().unwrap();
        assert_eq!(role.name, DEFAULT_ROLE);
    }

    #[test]
    fn test_set_user_role() {
        let (_temp, store) = setup();
        bootstrap_roles(&store).unwrap();
        let (user, _) =
            find_or_create_user_from_oauth(&store, "sub-3", &OAuthProfile::default()).unwrap();

        let updated = set_user_role(&store, &user.id, "admin").unwrap();
        let admin = store.get_role_by_name("admin").unwrap().unwrap();
        assert_eq!(updated.role_id, Some(admin.id));

        assert!(matches!(
            set_user_role(&store, &user.id, "nope"),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            set_user_role(&store, "missing", "admin"),
            Err(Error::NotFound)
        ));
    }
}
