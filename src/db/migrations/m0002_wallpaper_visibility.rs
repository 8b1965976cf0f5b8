use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// SQLite only takes one column per ALTER TABLE.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Wallpapers::Table)
                    .add_column(
                        ColumnDef::new(Wallpapers::IsPublic)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Wallpapers::Table)
                    .add_column(ColumnDef::new(Wallpapers::Style).string().null())
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Wallpapers::Table)
                    .add_column(ColumnDef::new(Wallpapers::ImgKey).string().null())
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for column in [Wallpapers::ImgKey, Wallpapers::Style, Wallpapers::IsPublic] {
            manager
                .alter_table(
                    Table::alter()
                        .table(Wallpapers::Table)
                        .drop_column(column)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Wallpapers {
    Table,
    IsPublic,
    Style,
    ImgKey,
}
