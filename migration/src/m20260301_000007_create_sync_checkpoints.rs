use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per sync domain; the resume point only moves forward unless
        // an administrator forces a reset.
        manager
            .create_table(
                Table::create()
                    .table(SyncCheckpoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncCheckpoints::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncCheckpoints::Domain)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SyncCheckpoints::LastPage)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncCheckpoints::TotalPages).integer().null())
                    .col(
                        ColumnDef::new(SyncCheckpoints::ItemsSynced)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncCheckpoints::State)
                            .string_len(16)
                            .not_null()
                            .default("idle"),
                    )
                    .col(ColumnDef::new(SyncCheckpoints::LastSuccessAt).timestamp().null())
                    .col(ColumnDef::new(SyncCheckpoints::LastFailureAt).timestamp().null())
                    .col(ColumnDef::new(SyncCheckpoints::LastError).text().null())
                    .col(
                        ColumnDef::new(SyncCheckpoints::UpdatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncCheckpoints::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SyncCheckpoints {
    Table,
    Id,
    Domain,
    LastPage,
    TotalPages,
    ItemsSynced,
    State,
    LastSuccessAt,
    LastFailureAt,
    LastError,
    UpdatedAt,
}
