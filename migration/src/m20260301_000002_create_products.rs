use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::ArticleId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::Description).text().null())
                    .col(ColumnDef::new(Products::ArticleGroup).string().null())
                    .col(ColumnDef::new(Products::PackageContent).string().null())
                    .col(ColumnDef::new(Products::SearchName).string().null())
                    .col(ColumnDef::new(Products::PriceUnit).string_len(32).null())
                    .col(ColumnDef::new(Products::ProductGroupId).string_len(64).null())
                    .col(ColumnDef::new(Products::MinQuantity).string_len(32).null())
                    .col(ColumnDef::new(Products::MultipleQuantity).string_len(32).null())
                    .col(ColumnDef::new(Products::MaxQuantity).string_len(32).null())
                    .col(ColumnDef::new(Products::Blocked).boolean().not_null().default(false))
                    .col(ColumnDef::new(Products::Active).boolean().not_null().default(true))
                    .col(ColumnDef::new(Products::ContentHash).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Products {
    Table,
    ArticleId,
    Name,
    Description,
    ArticleGroup,
    PackageContent,
    SearchName,
    PriceUnit,
    ProductGroupId,
    MinQuantity,
    MultipleQuantity,
    MaxQuantity,
    Blocked,
    Active,
    ContentHash,
    CreatedAt,
    UpdatedAt,
}
