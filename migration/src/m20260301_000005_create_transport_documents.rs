use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TransportDocuments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransportDocuments::DdtId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TransportDocuments::DdtNumber).string_len(64).not_null())
                    .col(ColumnDef::new(TransportDocuments::DeliveryDate).date().null())
                    .col(ColumnDef::new(TransportDocuments::OrderNumber).string_len(64).null())
                    .col(ColumnDef::new(TransportDocuments::CustomerAccount).string_len(64).null())
                    .col(ColumnDef::new(TransportDocuments::DeliveryName).string().null())
                    .col(ColumnDef::new(TransportDocuments::TrackingNumber).string_len(64).null())
                    .col(ColumnDef::new(TransportDocuments::DeliveryTerms).string_len(32).null())
                    .col(ColumnDef::new(TransportDocuments::DeliveryMethod).string_len(64).null())
                    .col(ColumnDef::new(TransportDocuments::DeliveryCity).string().null())
                    .col(ColumnDef::new(TransportDocuments::ContentHash).string_len(64).not_null())
                    .col(
                        ColumnDef::new(TransportDocuments::CreatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(TransportDocuments::UpdatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // DDTs are matched back to orders by order number
        manager
            .create_index(
                Index::create()
                    .name("idx_transport_documents_order_number")
                    .table(TransportDocuments::Table)
                    .col(TransportDocuments::OrderNumber)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransportDocuments::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TransportDocuments {
    Table,
    DdtId,
    DdtNumber,
    DeliveryDate,
    OrderNumber,
    CustomerAccount,
    DeliveryName,
    TrackingNumber,
    DeliveryTerms,
    DeliveryMethod,
    DeliveryCity,
    ContentHash,
    CreatedAt,
    UpdatedAt,
}
