use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::UserName).string().not_null())
                    .col(
                        ColumnDef::new(Users::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::PasswordHash).string())
                    .col(
                        ColumnDef::new(Users::Role)
                            .small_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::Provider)
                            .small_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::EmailConfirmed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::TwoStepEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Users::TempEmail).string())
                    .col(ColumnDef::new(Users::AvatarUrl).string())
                    .col(ColumnDef::new(Users::AvatarId).string())
                    .col(ColumnDef::new(Users::CredentialChangedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Users::ConfirmEmailOtp).string())
                    .col(ColumnDef::new(Users::ResetPasswordOtp).string())
                    .col(ColumnDef::new(Users::ChangeEmailOtp).string())
                    .col(ColumnDef::new(Users::OtpExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Users::OtpAttempts)
                            .small_integer()
                            .not_null()
                            .default(5),
                    )
                    .col(ColumnDef::new(Users::OtpCooldownUntil).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    UserName,
    Email,
    PasswordHash,
    Role,
    Provider,
    EmailConfirmed,
    TwoStepEnabled,
    IsDeleted,
    TempEmail,
    AvatarUrl,
    AvatarId,
    CredentialChangedAt,
    ConfirmEmailOtp,
    ResetPasswordOtp,
    ChangeEmailOtp,
    OtpExpiresAt,
    OtpAttempts,
    OtpCooldownUntil,
    CreatedAt,
    UpdatedAt,
}
