//! OAuth identity-token verification against the provider's tokeninfo
//! endpoint.

use serde::Deserialize;

use commune_core::error::ApiError;

use crate::domain::repository::{IdentityProvider, OAuthClaims};

/// Provider tokeninfo payload. `email_verified` arrives as the string
/// "true"/"false".
#[derive(Deserialize)]
struct TokenInfoResponse {
    aud: String,
    #[serde(default)]
    name: String,
    email: String,
    email_verified: String,
}

#[derive(Clone)]
pub struct HttpIdentityProvider {
    pub client: reqwest::Client,
    pub tokeninfo_url: String,
    pub client_id: String,
}

impl HttpIdentityProvider {
    pub fn new(tokeninfo_url: String, client_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            tokeninfo_url,
            client_id,
        }
    }
}

impl IdentityProvider for HttpIdentityProvider {
    async fn verify(&self, id_token: &str) -> Result<OAuthClaims, ApiError> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(e.into()))?;

        if response.status().is_client_error() {
            return Err(ApiError::unauthorized("identity token rejected"));
        }
        if !response.status().is_success() {
            return Err(ApiError::Upstream(anyhow::anyhow!(
                "tokeninfo failed with status {}",
                response.status()
            )));
        }

        let body: TokenInfoResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(e.into()))?;
        if body.aud != self.client_id {
            return Err(ApiError::unauthorized("identity token rejected"));
        }

        Ok(OAuthClaims {
            name: body.name,
            email: body.email,
            email_verified: body.email_verified == "true",
        })
    }
}
