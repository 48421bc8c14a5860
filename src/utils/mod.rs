// Utility modules for the Profitum backend

pub mod audit_logger;
pub mod auth_errors;
pub mod extract;
pub mod password;
pub mod service_error;
pub mod validation;

pub use audit_logger::{AuditAction, AuditLogger};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use auth_errors::{log_auth_failure, AuthError, AuthErrorResponse, ErrorDetail};
pub use password::{generate_temporary_password, hash_password, verify_password, PasswordError};
pub use service_error::{OrNotFound, ServiceError, ServiceResult};
pub use validation::{
    format_validation_errors, normalize_siren, trim_and_validate_field, trim_optional_field,
};
