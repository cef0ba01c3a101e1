use super::DeletionLogs;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeletionLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeletionLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeletionLogs::Email).string().not_null())
                    .col(ColumnDef::new(DeletionLogs::Action).string().not_null())
                    .col(ColumnDef::new(DeletionLogs::Status).string().not_null())
                    .col(ColumnDef::new(DeletionLogs::Message).string().not_null())
                    .col(ColumnDef::new(DeletionLogs::IpAddress).string().null())
                    .col(ColumnDef::new(DeletionLogs::UserAgent).string().null())
                    .col(ColumnDef::new(DeletionLogs::RequestData).string().null())
                    .col(ColumnDef::new(DeletionLogs::ResponseData).string().null())
                    .col(ColumnDef::new(DeletionLogs::KeycloakUserId).string().null())
                    .col(ColumnDef::new(DeletionLogs::KeycloakRealm).string().null())
                    .col(
                        ColumnDef::new(DeletionLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Indexes cover the admin query filters and retention cleanup
        for (name, column) in [
            ("idx_deletion_logs_email", DeletionLogs::Email),
            ("idx_deletion_logs_action", DeletionLogs::Action),
            ("idx_deletion_logs_status", DeletionLogs::Status),
            ("idx_deletion_logs_created_at", DeletionLogs::CreatedAt),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(DeletionLogs::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeletionLogs::Table).to_owned())
            .await
    }
}
