//! Business logic shared by HTTP handlers and the CLI.

pub mod documents;
pub mod receipt_store;
pub mod share_service;
pub mod tenant_service;

pub use receipt_store::ReceiptStore;
pub use tenant_service::TenantService;
