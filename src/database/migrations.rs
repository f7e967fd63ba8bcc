pub use sea_orm_migration::prelude::*;

mod m20250805_192936_create_job;
mod m20260203_190033_create_websocket_message;
mod m20260301_090000_create_marketplace_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250805_192936_create_job::Migration),
            Box::new(m20260203_190033_create_websocket_message::Migration),
            Box::new(m20260301_090000_create_marketplace_tables::Migration),
        ]
    }
}
