use sea_orm::entity::prelude::*;

/// User account record: credentials, role, OTP throttle state, social flags.
///
/// The three OTP hash columns share one expiry/attempts/cooldown triple —
/// exhausting attempts on one purpose blocks the others.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_name: String,
    #[sea_orm(unique)]
    pub email: String,
    /// Absent for OAuth-provisioned accounts.
    pub password_hash: Option<String>,
    pub role: i16,
    pub provider: i16,
    pub email_confirmed: bool,
    pub two_step_enabled: bool,
    pub is_deleted: bool,
    pub temp_email: Option<String>,
    pub avatar_url: Option<String>,
    pub avatar_id: Option<String>,
    /// Tokens issued at or before this instant are rejected.
    pub credential_changed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub confirm_email_otp: Option<String>,
    pub reset_password_otp: Option<String>,
    pub change_email_otp: Option<String>,
    pub otp_expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub otp_attempts: i16,
    pub otp_cooldown_until: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::posts::Entity")]
    Posts,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::posts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
