use sea_orm::DatabaseConnection;

use commune_auth_types::secrets::TokenSecrets;

use crate::infra::db::{
    DbCommentRepository, DbPostRepository, DbRelationRepository, DbUserRepository,
};
use crate::infra::image::HttpImageStore;
use crate::infra::oauth::HttpIdentityProvider;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub secrets: TokenSecrets,
    pub bcrypt_cost: u32,
    pub image_store: HttpImageStore,
    pub identity: HttpIdentityProvider,
}

impl AppState {
    pub fn user_repo(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    pub fn relation_repo(&self) -> DbRelationRepository {
        DbRelationRepository {
            db: self.db.clone(),
        }
    }

    pub fn post_repo(&self) -> DbPostRepository {
        DbPostRepository {
            db: self.db.clone(),
        }
    }

    pub fn comment_repo(&self) -> DbCommentRepository {
        DbCommentRepository {
            db: self.db.clone(),
        }
    }
}
