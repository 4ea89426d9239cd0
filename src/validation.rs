//! Validators attached to field descriptors
//!
//! Each function matches [`crate::fields::StrValidator`] or
//! [`crate::fields::IntValidator`] and returns a short reason on failure,
//! which ends up in the prompt loop or the per-record error.

use std::sync::OnceLock;

use regex::Regex;

/// Roles accepted by the console for user accounts
pub const USER_ROLES: &[&str] = &["admin", "operator", "auditor", "viewer"];

/// Provides hostname validation for proxy and device records
pub struct HostnameValidator;

impl HostnameValidator {
    pub fn new() -> Self {
        Self {}
    }

    /// Validates a hostname for format and syntax
    ///
    /// This function checks that the hostname:
    /// - Does not exceed 253 characters (RFC 1035)
    /// - Consists of valid characters (a-z, 0-9, -, .)
    /// - Does not have empty labels (consecutive, leading or trailing dots)
    /// - Has no label starting or ending with a hyphen
    /// - Has no label longer than 63 characters
    ///
    /// Single-label names (`proxy01`) are allowed, unlike public domains.
    pub fn validate_format(&self, host: &str) -> bool {
        if host.is_empty() || host.len() > 253 {
            return false;
        }

        host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
    }
}

impl Default for HostnameValidator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_hostname(host: &str) -> Result<(), String> {
    if HostnameValidator::new().validate_format(host) {
        Ok(())
    } else {
        Err("not a valid hostname".to_string())
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)+$")
            .expect("email pattern is valid")
    })
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email_pattern().is_match(email) {
        Ok(())
    } else {
        Err("not a valid email address".to_string())
    }
}

pub fn validate_priority(priority: &i64) -> Result<(), String> {
    if *priority >= 0 {
        Ok(())
    } else {
        Err("priority cannot be negative".to_string())
    }
}

pub fn validate_role(role: &str) -> Result<(), String> {
    if USER_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(format!("role must be one of {}", USER_ROLES.join(", ")))
    }
}

pub fn validate_not_empty(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err("a value is required".to_string())
    } else {
        Ok(())
    }
}
