use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FriendRequests::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FriendRequests::FromUser).uuid().not_null())
                    .col(ColumnDef::new(FriendRequests::ToUser).uuid().not_null())
                    .col(
                        ColumnDef::new(FriendRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(FriendRequests::FromUser)
                            .col(FriendRequests::ToUser),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(FriendRequests::Table, FriendRequests::FromUser)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(FriendRequests::Table, FriendRequests::ToUser)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Friendships::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Friendships::UserId).uuid().not_null())
                    .col(ColumnDef::new(Friendships::FriendId).uuid().not_null())
                    .col(
                        ColumnDef::new(Friendships::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Friendships::UserId)
                            .col(Friendships::FriendId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Friendships::Table, Friendships::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Friendships::Table, Friendships::FriendId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BlockedUsers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BlockedUsers::UserId).uuid().not_null())
                    .col(ColumnDef::new(BlockedUsers::BlockedId).uuid().not_null())
                    .col(
                        ColumnDef::new(BlockedUsers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(BlockedUsers::UserId)
                            .col(BlockedUsers::BlockedId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(BlockedUsers::Table, BlockedUsers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProfileViews::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ProfileViews::ProfileId).uuid().not_null())
                    .col(ColumnDef::new(ProfileViews::ViewerId).uuid().not_null())
                    .col(
                        ColumnDef::new(ProfileViews::VisitCount)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(ProfileViews::LastVisitedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ProfileViews::ProfileId)
                            .col(ProfileViews::ViewerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ProfileViews::Table, ProfileViews::ProfileId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProfileViews::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BlockedUsers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Friendships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FriendRequests::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FriendRequests {
    Table,
    FromUser,
    ToUser,
    CreatedAt,
}

#[derive(Iden)]
enum Friendships {
    Table,
    UserId,
    FriendId,
    CreatedAt,
}

#[derive(Iden)]
enum BlockedUsers {
    Table,
    UserId,
    BlockedId,
    CreatedAt,
}

#[derive(Iden)]
enum ProfileViews {
    Table,
    ProfileId,
    ViewerId,
    VisitCount,
    LastVisitedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
