use commune_auth_types::secrets::TokenSecrets;

/// Api service configuration loaded from environment variables.
#[derive(Debug)]
pub struct ApiConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// HMAC secrets for the four (tier, kind) token families. Rotating one
    /// revokes every outstanding token of that family.
    pub user_access_secret: String,
    pub user_refresh_secret: String,
    pub admin_access_secret: String,
    pub admin_refresh_secret: String,
    /// bcrypt cost factor for password and OTP hashes (default 10).
    pub bcrypt_cost: u32,
    /// Image-store endpoint (e.g. "https://images.internal").
    pub image_store_url: String,
    /// Image-store API key.
    pub image_store_key: String,
    /// Expected OAuth client id (`aud` claim of incoming identity tokens).
    pub oauth_client_id: String,
    /// OAuth token-verification endpoint.
    pub oauth_tokeninfo_url: String,
    /// TCP port to listen on (default 3110). Env var: `API_PORT`.
    pub api_port: u16,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            user_access_secret: std::env::var("USER_ACCESS_SECRET").expect("USER_ACCESS_SECRET"),
            user_refresh_secret: std::env::var("USER_REFRESH_SECRET").expect("USER_REFRESH_SECRET"),
            admin_access_secret: std::env::var("ADMIN_ACCESS_SECRET").expect("ADMIN_ACCESS_SECRET"),
            admin_refresh_secret: std::env::var("ADMIN_REFRESH_SECRET")
                .expect("ADMIN_REFRESH_SECRET"),
            bcrypt_cost: std::env::var("BCRYPT_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            image_store_url: std::env::var("IMAGE_STORE_URL").expect("IMAGE_STORE_URL"),
            image_store_key: std::env::var("IMAGE_STORE_KEY").expect("IMAGE_STORE_KEY"),
            oauth_client_id: std::env::var("OAUTH_CLIENT_ID").expect("OAUTH_CLIENT_ID"),
            oauth_tokeninfo_url: std::env::var("OAUTH_TOKENINFO_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/tokeninfo".to_owned()),
            api_port: std::env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3110),
        }
    }

    pub fn token_secrets(&self) -> TokenSecrets {
        TokenSecrets {
            user_access: self.user_access_secret.clone(),
            user_refresh: self.user_refresh_secret.clone(),
            admin_access: self.admin_access_secret.clone(),
            admin_refresh: self.admin_refresh_secret.clone(),
        }
    }
}
