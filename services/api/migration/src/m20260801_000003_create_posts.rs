use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Posts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Posts::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(Posts::Content).text())
                    .col(ColumnDef::new(Posts::AssetGroup).string())
                    .col(
                        ColumnDef::new(Posts::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Posts::DeletedBy).uuid())
                    .col(
                        ColumnDef::new(Posts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Posts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Posts::Table, Posts::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Posts::Table)
                    .col(Posts::AuthorId)
                    .name("idx_posts_author_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PostImages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostImages::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostImages::PostId).uuid().not_null())
                    .col(ColumnDef::new(PostImages::Url).string().not_null())
                    .col(ColumnDef::new(PostImages::StorageId).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(PostImages::Table, PostImages::PostId)
                            .to(Posts::Table, Posts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(PostImages::Table)
                    .col(PostImages::PostId)
                    .name("idx_post_images_post_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PostReactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PostReactions::PostId).uuid().not_null())
                    .col(ColumnDef::new(PostReactions::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(PostReactions::Kind)
                            .small_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostReactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(PostReactions::PostId)
                            .col(PostReactions::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PostReactions::Table, PostReactions::PostId)
                            .to(Posts::Table, Posts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PostReactions::Table, PostReactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostReactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PostImages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Posts {
    Table,
    Id,
    AuthorId,
    Content,
    AssetGroup,
    IsDeleted,
    DeletedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum PostImages {
    Table,
    Id,
    PostId,
    Url,
    StorageId,
}

#[derive(Iden)]
enum PostReactions {
    Table,
    PostId,
    UserId,
    Kind,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
