use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Invoices::InvoiceId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Invoices::InvoiceNumber).string_len(64).not_null())
                    .col(ColumnDef::new(Invoices::InvoiceDate).date().null())
                    .col(ColumnDef::new(Invoices::CustomerAccount).string_len(64).null())
                    .col(ColumnDef::new(Invoices::BillingName).string().null())
                    .col(ColumnDef::new(Invoices::Quantity).string_len(32).null())
                    .col(ColumnDef::new(Invoices::LineSum).decimal().null())
                    .col(ColumnDef::new(Invoices::DiscountAmount).decimal().null())
                    .col(ColumnDef::new(Invoices::TaxSum).decimal().null())
                    .col(ColumnDef::new(Invoices::InvoiceAmount).decimal().null())
                    .col(ColumnDef::new(Invoices::PurchaseOrder).string_len(64).null())
                    .col(ColumnDef::new(Invoices::CustomerReference).string().null())
                    .col(ColumnDef::new(Invoices::DueDate).date().null())
                    .col(ColumnDef::new(Invoices::PaymentTermId).string_len(32).null())
                    .col(ColumnDef::new(Invoices::OverdueDays).integer().null())
                    .col(ColumnDef::new(Invoices::ContentHash).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Invoices::CreatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(Invoices::UpdatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_customer_account")
                    .table(Invoices::Table)
                    .col(Invoices::CustomerAccount)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Invoices {
    Table,
    InvoiceId,
    InvoiceNumber,
    InvoiceDate,
    CustomerAccount,
    BillingName,
    Quantity,
    LineSum,
    DiscountAmount,
    TaxSum,
    InvoiceAmount,
    PurchaseOrder,
    CustomerReference,
    DueDate,
    PaymentTermId,
    OverdueDays,
    ContentHash,
    CreatedAt,
    UpdatedAt,
}
