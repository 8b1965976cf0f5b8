use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Wallpapers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallpapers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Wallpapers::UserEmail).string().not_null())
                    .col(
                        ColumnDef::new(Wallpapers::ImgDescription)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Wallpapers::ImgSize).string().not_null())
                    .col(ColumnDef::new(Wallpapers::ImgUrl).string().not_null())
                    .col(ColumnDef::new(Wallpapers::LlmName).string().not_null())
                    .col(ColumnDef::new(Wallpapers::LlmParams).text().not_null())
                    .col(
                        ColumnDef::new(Wallpapers::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_wallpapers_user_created")
                    .table(Wallpapers::Table)
                    .col(Wallpapers::UserEmail)
                    .col(Wallpapers::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Wallpapers::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Wallpapers {
    Table,
    Id,
    UserEmail,
    ImgDescription,
    ImgSize,
    ImgUrl,
    LlmName,
    LlmParams,
    CreatedAt,
}
