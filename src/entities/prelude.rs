pub use super::change_records::Entity as ChangeRecords;
pub use super::customers::Entity as Customers;
pub use super::invoices::Entity as Invoices;
pub use super::order_jobs::Entity as OrderJobs;
pub use super::orders::Entity as Orders;
pub use super::prices::Entity as Prices;
pub use super::products::Entity as Products;
pub use super::sync_checkpoints::Entity as SyncCheckpoints;
pub use super::transport_documents::Entity as TransportDocuments;
