use std::time::Duration;

use serde::Deserialize;

use super::helpers::decode_jwt_subject;
use crate::config::{AuthConfig, AuthMode};
use crate::error::{Error, Result};

const USERINFO_TIMEOUT: Duration = Duration::from_secs(5);

/// Turns a bearer credential into the identity provider's subject id.
#[derive(Debug, Clone)]
pub enum IdentityVerifier {
    /// Asks the provider's OIDC UserInfo endpoint.
    Userinfo { client: reqwest::Client, url: String },
    /// Trusts the JWT payload as-is. Only for deployments behind a gateway
    /// that already verified the signature.
    JwtClaims,
}

#[derive(Deserialize)]
struct UserinfoResponse {
    sub: Option<String>,
}

impl IdentityVerifier {
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        match config.mode {
            AuthMode::JwtClaims => Ok(Self::JwtClaims),
            AuthMode::Userinfo => {
                let client = reqwest::Client::builder()
                    .timeout(USERINFO_TIMEOUT)
                    .build()
                    .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
                Ok(Self::Userinfo {
                    client,
                    url: config.userinfo_url.clone(),
                })
            }
        }
    }

    pub async fn verify(&self, token: &str) -> Result<String> {
        match self {
            Self::JwtClaims => decode_jwt_subject(token),
            Self::Userinfo { client, url } => {
                let response = client.get(url).bearer_auth(token).send().await.map_err(|e| {
                    tracing::warn!("Userinfo request failed: {e}");
                    Error::Unauthenticated
                })?;

                if !response.status().is_success() {
                    tracing::debug!("Userinfo rejected token: {}", response.status());
                    return Err(Error::Unauthenticated);
                }

                let body: UserinfoResponse = response.json().await.map_err(|e| {
                    tracing::warn!("Userinfo response was not understood: {e}");
                    Error::Unauthenticated
                })?;

                body.sub.filter(|s| !s.is_empty()).ok_or(Error::Unauthenticated)
            }
        }
    }
}
