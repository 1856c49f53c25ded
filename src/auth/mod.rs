mod helpers;
mod middleware;
mod provision;
mod verifier;

pub use helpers::{decode_jwt_subject, extract_bearer_token};
pub use middleware::{AuthError, RequireIdentity, RequireUser};
pub use provision::{
    BUILTIN_ROLES, bootstrap_roles, ensure_default_role, ensure_role, find_or_create_user_from_oauth,
    set_user_role,
};
pub use verifier::IdentityVerifier;
