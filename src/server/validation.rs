use chrono::{DateTime, NaiveDate, Utc};

use crate::server::response::ApiError;

const MAX_ROLE_NAME_LEN: usize = 64;
const MAX_ENDPOINT_LEN: usize = 256;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

pub fn validate_role_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Role name cannot be empty"));
    }
    if name.len() > MAX_ROLE_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Role name cannot exceed {MAX_ROLE_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(ApiError::bad_request(
            "Role name can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }
    Ok(())
}

/// Endpoints are route prefixes such as `/datastore/browse`.
pub fn validate_endpoint(endpoint: &str) -> Result<(), ApiError> {
    if !endpoint.starts_with('/') {
        return Err(ApiError::bad_request("Endpoint must start with '/'"));
    }
    if endpoint.len() > MAX_ENDPOINT_LEN {
        return Err(ApiError::bad_request(format!(
            "Endpoint cannot exceed {MAX_ENDPOINT_LEN} characters"
        )));
    }
    if endpoint.chars().any(char::is_whitespace) {
        return Err(ApiError::bad_request("Endpoint cannot contain whitespace"));
    }
    Ok(())
}

/// Parses an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC).
pub fn parse_since(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ApiError::bad_request(format!("Invalid date '{raw}'")))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn test_parse_since() {
        let day = parse_since("2024-03-05").unwrap();
        assert_eq!((day.year(), day.month(), day.day(), day.hour()), (2024, 3, 5, 0));

        let ts = parse_since("2024-03-05T10:30:00+02:00").unwrap();
        assert_eq!(ts.hour(), 8);

        assert!(parse_since("yesterday").is_err());
        assert!(parse_since("2024-13-01").is_err());
    }

    #[test]
    fn test_validate_role_name() {
        assert!(validate_role_name("data-steward").is_ok());
        assert!(validate_role_name("").is_err());
        assert!(validate_role_name("bad name").is_err());
        assert!(validate_role_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("/pipeline/runlogs").is_ok());
        assert!(validate_endpoint("pipeline").is_err());
        assert!(validate_endpoint("/a b").is_err());
    }
}
