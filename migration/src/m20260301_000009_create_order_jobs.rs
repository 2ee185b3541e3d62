use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderJobs::JobId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderJobs::UserId).string_len(64).not_null())
                    .col(ColumnDef::new(OrderJobs::Payload).json_binary().not_null())
                    .col(
                        ColumnDef::new(OrderJobs::Status)
                            .string_len(16)
                            .not_null()
                            .default("queued"),
                    )
                    .col(
                        ColumnDef::new(OrderJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(OrderJobs::ErpOrderId).string_len(64).null())
                    .col(ColumnDef::new(OrderJobs::Error).text().null())
                    .col(ColumnDef::new(OrderJobs::RetryOf).uuid().null())
                    .col(
                        ColumnDef::new(OrderJobs::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(ColumnDef::new(OrderJobs::StartedAt).timestamp().null())
                    .col(ColumnDef::new(OrderJobs::FinishedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_jobs_user_id")
                    .table(OrderJobs::Table)
                    .col(OrderJobs::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderJobs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OrderJobs {
    Table,
    JobId,
    UserId,
    Payload,
    Status,
    Attempts,
    ErpOrderId,
    Error,
    RetryOf,
    CreatedAt,
    StartedAt,
    FinishedAt,
}
