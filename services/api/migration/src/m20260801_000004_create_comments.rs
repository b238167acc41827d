use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Comments::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Comments::PostId).uuid().not_null())
                    .col(ColumnDef::new(Comments::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(Comments::ParentId).uuid())
                    .col(ColumnDef::new(Comments::Text).text())
                    .col(ColumnDef::new(Comments::ImageUrl).string())
                    .col(ColumnDef::new(Comments::ImageId).string())
                    .col(
                        ColumnDef::new(Comments::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Comments::DeletedBy).uuid())
                    .col(
                        ColumnDef::new(Comments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Comments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Comments::Table, Comments::PostId)
                            .to(Posts::Table, Posts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Comments::Table, Comments::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Comments::Table)
                    .col(Comments::PostId)
                    .name("idx_comments_post_id")
                    .to_owned(),
            )
            .await?;

        // Reply-tree lookups walk parent_id repeatedly during cascade deletes.
        manager
            .create_index(
                Index::create()
                    .table(Comments::Table)
                    .col(Comments::ParentId)
                    .name("idx_comments_parent_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CommentLikes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CommentLikes::CommentId).uuid().not_null())
                    .col(ColumnDef::new(CommentLikes::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(CommentLikes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(CommentLikes::CommentId)
                            .col(CommentLikes::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(CommentLikes::Table, CommentLikes::CommentId)
                            .to(Comments::Table, Comments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(CommentLikes::Table, CommentLikes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommentLikes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Comments {
    Table,
    Id,
    PostId,
    AuthorId,
    ParentId,
    Text,
    ImageUrl,
    ImageId,
    IsDeleted,
    DeletedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CommentLikes {
    Table,
    CommentId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum Posts {
    Table,
    Id,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
