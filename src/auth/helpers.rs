use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Extracts the credential from a `Bearer` authorization header.
/// A missing header, another scheme, or an empty token all fail with
/// `Unauthenticated`.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Result<&str> {
    let header = auth_header.ok_or(Error::Unauthenticated)?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(Error::Unauthenticated)?;

    if token.is_empty() {
        return Err(Error::Unauthenticated);
    }
    Ok(token)
}

#[derive(Deserialize)]
struct SubjectClaim {
    sub: Option<String>,
}

/// Reads the `sub` claim from a JWT payload without verifying the signature.
pub fn decode_jwt_subject(token: &str) -> Result<String> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err(Error::Unauthenticated),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| Error::Unauthenticated)?;
    let claims: SubjectClaim = serde_json::from_slice(&bytes).map_err(|_| Error::Unauthenticated)?;

    claims
        .sub
        .filter(|s| !s.is_empty())
        .ok_or(Error::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(extract_bearer_token(None).is_err());
        assert!(extract_bearer_token(Some("Basic abc")).is_err());
        assert!(extract_bearer_token(Some("Bearer ")).is_err());
    }

    #[test]
    fn test_decode_jwt_subject() {
        assert_eq!(decode_jwt_subject(&jwt(r#"{"sub":"1234"}"#)).unwrap(), "1234");
    }

    #[test]
    fn test_decode_jwt_subject_rejects_bad_tokens() {
        assert!(decode_jwt_subject("not-a-jwt").is_err());
        assert!(decode_jwt_subject("a.!!!.c").is_err());
        assert!(decode_jwt_subject(&jwt(r#"{"name":"x"}"#)).is_err());
        assert!(decode_jwt_subject(&jwt(r#"{"sub":""}"#)).is_err());
    }
}
