use sea_orm::Database;
use tracing::info;

use commune_api::config::ApiConfig;
use commune_api::infra::image::HttpImageStore;
use commune_api::infra::oauth::HttpIdentityProvider;
use commune_api::router::build_router;
use commune_api::state::AppState;

#[tokio::main]
async fn main() {
    commune_core::tracing::init_tracing();

    let config = ApiConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let state = AppState {
        db,
        secrets: config.token_secrets(),
        bcrypt_cost: config.bcrypt_cost,
        image_store: HttpImageStore::new(
            config.image_store_url.clone(),
            config.image_store_key.clone(),
        ),
        identity: HttpIdentityProvider::new(
            config.oauth_tokeninfo_url.clone(),
            config.oauth_client_id.clone(),
        ),
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("api service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
