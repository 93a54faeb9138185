pub mod bootstrap;
pub mod manager;
pub mod models;
pub mod tenant;

pub use manager::{DatabaseError, DatabaseManager};
pub use tenant::TenantDb;
