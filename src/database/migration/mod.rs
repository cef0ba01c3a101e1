use sea_orm_migration::prelude::*;

pub use sea_orm_migration::MigratorTrait;

mod m20250815_120000_create_deletion_logs_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20250815_120000_create_deletion_logs_table::Migration,
        )]
    }
}

/// Common table and column identifiers
#[derive(Iden)]
pub enum DeletionLogs {
    Table,
    Id,
    Email,
    Action,
    Status,
    Message,
    IpAddress,
    UserAgent,
    RequestData,
    ResponseData,
    KeycloakUserId,
    KeycloakRealm,
    CreatedAt,
}
