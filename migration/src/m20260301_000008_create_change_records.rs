use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only audit trail of detected changes, one row per field-level
        // or record-level change.
        manager
            .create_table(
                Table::create()
                    .table(ChangeRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChangeRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChangeRecords::Domain).string_len(64).not_null())
                    .col(ColumnDef::new(ChangeRecords::EntityId).string_len(64).not_null())
                    .col(ColumnDef::new(ChangeRecords::ChangeType).string_len(16).not_null())
                    .col(ColumnDef::new(ChangeRecords::FieldName).string_len(64).null())
                    .col(ColumnDef::new(ChangeRecords::OldValue).text().null())
                    .col(ColumnDef::new(ChangeRecords::NewValue).text().null())
                    .col(ColumnDef::new(ChangeRecords::SyncRunId).uuid().not_null())
                    .col(
                        ColumnDef::new(ChangeRecords::RecordedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_change_records_domain_entity")
                    .table(ChangeRecords::Table)
                    .col(ChangeRecords::Domain)
                    .col(ChangeRecords::EntityId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_change_records_sync_run_id")
                    .table(ChangeRecords::Table)
                    .col(ChangeRecords::SyncRunId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChangeRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ChangeRecords {
    Table,
    Id,
    Domain,
    EntityId,
    ChangeType,
    FieldName,
    OldValue,
    NewValue,
    SyncRunId,
    RecordedAt,
}
