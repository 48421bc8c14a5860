// Validation utilities shared by request types

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// French company identifier: exactly nine digits
    pub static ref SIREN_REGEX: Regex = Regex::new(r"^\d{9}$").unwrap();
    pub static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9 .\-()]{6,20}$").unwrap();
    pub static ref POSTAL_CODE_REGEX: Regex = Regex::new(r"^\d{5}$").unwrap();
}

/// Trim and validate string fields
///
/// # Returns
/// * `Ok(String)` - The trimmed string if valid
/// * `Err(String)` - Error message if a required field is empty
pub fn trim_and_validate_field(field: &str, required: bool) -> Result<String, String> {
    let trimmed = field.trim().to_string();
    if trimmed.is_empty() && required {
        Err("Field cannot be empty".to_string())
    } else {
        Ok(trimmed)
    }
}

/// `None` when the field is absent or blank after trimming
pub fn trim_optional_field(field: Option<&String>) -> Option<String> {
    field.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Strip spaces a user may type inside a SIREN ("123 456 789")
pub fn normalize_siren(siren: &str) -> String {
    siren.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn is_valid_siren(siren: &str) -> bool {
    SIREN_REGEX.is_match(siren)
}

/// Flatten validator errors into `field: message` pairs
pub fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors
                .iter()
                .map(move |e| format!("{}: {}", field, e.message.as_ref().unwrap_or(&e.code)))
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

/// Password policy applied to every account type
pub fn validate_password_strength(password: &str) -> Result<(), validator::ValidationError> {
    if password.chars().count() < 8 {
        let mut err = validator::ValidationError::new("password_too_short");
        err.message = Some("Password must be at least 8 characters".into());
        return Err(err);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) || !password.chars().any(|c| c.is_alphabetic())
    {
        let mut err = validator::ValidationError::new("password_complexity");
        err.message = Some("Password must contain letters and digits".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(email(message = "Invalid email format"))]
        email: String,
        #[validate(regex(path = "SIREN_REGEX", message = "SIREN must contain 9 digits"))]
        siren: String,
    }

    #[test]
    fn test_trim_helpers() {
        assert_eq!(trim_and_validate_field("  abc ", true).unwrap(), "abc");
        assert!(trim_and_validate_field("   ", true).is_err());
        assert_eq!(trim_and_validate_field("   ", false).unwrap(), "");
        assert_eq!(trim_optional_field(Some(&"  ".to_string())), None);
        assert_eq!(
            trim_optional_field(Some(&" Lyon ".to_string())),
            Some("Lyon".to_string())
        );
    }

    #[test]
    fn test_siren() {
        assert!(is_valid_siren("123456789"));
        assert!(!is_valid_siren("12345678"));
        assert!(!is_valid_siren("12345678A"));
        assert_eq!(normalize_siren("123 456 789"), "123456789");
    }

    #[test]
    fn test_format_validation_errors() {
        let probe = Probe {
            email: "nope".into(),
            siren: "12".into(),
        };
        let errors = probe.validate().unwrap_err();
        let formatted = format_validation_errors(&errors);
        assert_eq!(
            formatted,
            "email: Invalid email format, siren: SIREN must contain 9 digits"
        );
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("short1").is_err());
        assert!(validate_password_strength("longenough").is_err());
        assert!(validate_password_strength("12345678").is_err());
        assert!(validate_password_strength("profitum2024").is_ok());
    }
}
