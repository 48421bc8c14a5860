// Middleware: JWT authentication, role guards and CORS

pub mod auth;
pub mod auth_middleware;
pub mod cors;

pub use auth::{
    require_admin, require_apporteur, require_client, require_expert, AuthenticatedUser,
};
pub use auth_middleware::auth_middleware;
pub use cors::dynamic_cors_middleware;
