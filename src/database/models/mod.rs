pub mod assessment;
pub mod booking;
pub mod document;
pub mod jotter;
pub mod receipt;
pub mod settings;
pub mod tenant;

pub use assessment::DamageAssessment;
pub use booking::Booking;
pub use document::{DocumentPhoto, Estimate, Invoice, LineItem};
pub use jotter::JotterNote;
pub use receipt::Receipt;
pub use settings::BusinessSettings;
pub use tenant::Tenant;
