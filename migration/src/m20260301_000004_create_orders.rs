use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::OrderId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::OrderNumber).string_len(64).null())
                    .col(ColumnDef::new(Orders::CustomerAccount).string_len(64).null())
                    .col(ColumnDef::new(Orders::CustomerName).string().null())
                    .col(ColumnDef::new(Orders::DeliveryName).string().null())
                    .col(ColumnDef::new(Orders::DeliveryAddress).string().null())
                    .col(ColumnDef::new(Orders::CreationDate).date().null())
                    .col(ColumnDef::new(Orders::DeliveryDate).date().null())
                    .col(ColumnDef::new(Orders::CustomerReference).string().null())
                    .col(ColumnDef::new(Orders::SalesStatus).string_len(64).null())
                    .col(ColumnDef::new(Orders::DocumentStatus).string_len(64).null())
                    .col(ColumnDef::new(Orders::OrderType).string_len(64).null())
                    .col(ColumnDef::new(Orders::TotalAmount).decimal().null())
                    .col(ColumnDef::new(Orders::ContentHash).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(Orders::UpdatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_order_number")
                    .table(Orders::Table)
                    .col(Orders::OrderNumber)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Orders {
    Table,
    OrderId,
    OrderNumber,
    CustomerAccount,
    CustomerName,
    DeliveryName,
    DeliveryAddress,
    CreationDate,
    DeliveryDate,
    CustomerReference,
    SalesStatus,
    DocumentStatus,
    OrderType,
    TotalAmount,
    ContentHash,
    CreatedAt,
    UpdatedAt,
}
