use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customers::AccountId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Customers::Name).string().not_null())
                    .col(ColumnDef::new(Customers::VatNumber).string_len(32).null())
                    .col(ColumnDef::new(Customers::Pec).string().null())
                    .col(ColumnDef::new(Customers::Sdi).string_len(16).null())
                    .col(ColumnDef::new(Customers::FiscalCode).string_len(32).null())
                    .col(ColumnDef::new(Customers::DeliveryTerms).string().null())
                    .col(ColumnDef::new(Customers::Street).string().null())
                    .col(ColumnDef::new(Customers::LogisticsAddress).string().null())
                    .col(ColumnDef::new(Customers::PostalCode).string_len(16).null())
                    .col(ColumnDef::new(Customers::City).string().null())
                    .col(ColumnDef::new(Customers::Phone).string_len(64).null())
                    .col(ColumnDef::new(Customers::Mobile).string_len(64).null())
                    .col(ColumnDef::new(Customers::Url).string().null())
                    .col(ColumnDef::new(Customers::AttentionTo).string().null())
                    .col(ColumnDef::new(Customers::LastOrderDate).date().null())
                    .col(ColumnDef::new(Customers::Active).boolean().not_null().default(true))
                    .col(ColumnDef::new(Customers::ContentHash).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Customers::CreatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(Customers::UpdatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Customers {
    Table,
    AccountId,
    Name,
    VatNumber,
    Pec,
    Sdi,
    FiscalCode,
    DeliveryTerms,
    Street,
    LogisticsAddress,
    PostalCode,
    City,
    Phone,
    Mobile,
    Url,
    AttentionTo,
    LastOrderDate,
    Active,
    ContentHash,
    CreatedAt,
    UpdatedAt,
}
