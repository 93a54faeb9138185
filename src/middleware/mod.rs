pub mod auth;
pub mod response;
pub mod tenant;

pub use auth::{auth_middleware, AuthContext};
pub use response::{ApiResponse, ApiResult};
pub use tenant::resolve_tenant_middleware;
