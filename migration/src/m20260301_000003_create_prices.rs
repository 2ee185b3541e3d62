use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Price agreements are keyed by the ERP's own row id: one product can
        // carry several validity windows and quantity bands.
        manager
            .create_table(
                Table::create()
                    .table(Prices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Prices::PriceId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Prices::ProductId).string_len(64).not_null())
                    .col(ColumnDef::new(Prices::ItemSelection).string_len(32).null())
                    .col(ColumnDef::new(Prices::AccountCode).string_len(64).null())
                    .col(ColumnDef::new(Prices::AccountDescription).string().null())
                    .col(ColumnDef::new(Prices::ProductName).string().null())
                    .col(ColumnDef::new(Prices::ValidFrom).date().null())
                    .col(ColumnDef::new(Prices::ValidTo).date().null())
                    .col(ColumnDef::new(Prices::QuantityFrom).string_len(32).null())
                    .col(ColumnDef::new(Prices::QuantityTo).string_len(32).null())
                    .col(ColumnDef::new(Prices::UnitPrice).decimal().null())
                    .col(ColumnDef::new(Prices::Currency).string_len(8).null())
                    .col(ColumnDef::new(Prices::PriceUnit).string_len(32).null())
                    .col(ColumnDef::new(Prices::Active).boolean().not_null().default(true))
                    .col(ColumnDef::new(Prices::ContentHash).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Prices::CreatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(Prices::UpdatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_prices_product_id")
                    .table(Prices::Table)
                    .col(Prices::ProductId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Prices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Prices {
    Table,
    PriceId,
    ProductId,
    ItemSelection,
    AccountCode,
    AccountDescription,
    ProductName,
    ValidFrom,
    ValidTo,
    QuantityFrom,
    QuantityTo,
    UnitPrice,
    Currency,
    PriceUnit,
    Active,
    ContentHash,
    CreatedAt,
    UpdatedAt,
}
