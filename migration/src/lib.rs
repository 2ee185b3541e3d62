pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_customers;
mod m20260301_000002_create_products;
mod m20260301_000003_create_prices;
mod m20260301_000004_create_orders;
mod m20260301_000005_create_transport_documents;
mod m20260301_000006_create_invoices;
mod m20260301_000007_create_sync_checkpoints;
mod m20260301_000008_create_change_records;
mod m20260301_000009_create_order_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_customers::Migration),
            Box::new(m20260301_000002_create_products::Migration),
            Box::new(m20260301_000003_create_prices::Migration),
            Box::new(m20260301_000004_create_orders::Migration),
            Box::new(m20260301_000005_create_transport_documents::Migration),
            Box::new(m20260301_000006_create_invoices::Migration),
            Box::new(m20260301_000007_create_sync_checkpoints::Migration),
            Box::new(m20260301_000008_create_change_records::Migration),
            Box::new(m20260301_000009_create_order_jobs::Migration),
        ]
    }
}
