//! User Record Types
//!
//! Payloads accepted by the service and the record shape it returns.

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum length of any free-text field
pub const MAX_FIELD_LEN: usize = 256;

/// Payload for creating a user
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewUser {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub country: String,
}

impl fmt::Display for NewUser {
    // Never prints the password
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "first_name:{}, last_name:{}, nickname:{}, country:{}, email:{}",
            self.first_name, self.last_name, self.nickname, self.country, self.email
        )
    }
}

impl NewUser {
    /// Check required fields and formats
    pub fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("email is required".to_string());
        }
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        for (name, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("nickname", &self.nickname),
            ("country", &self.country),
        ] {
            validate_length(name, value)?;
        }
        Ok(())
    }
}

/// Payload for updating a user; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl UpdateUser {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        for (name, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("nickname", &self.nickname),
            ("country", &self.country),
        ] {
            if let Some(value) = value {
                validate_length(name, value)?;
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.nickname.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.country.is_none()
    }
}

/// A stored user as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub country: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Format a timestamp the way records expose it (RFC 3339, second precision)
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

fn validate_email(email: &str) -> Result<(), String> {
    if !email_pattern().is_match(email) {
        return Err(format!("invalid email address: {}", email));
    }
    validate_length("email", email)
}

fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

fn validate_length(name: &str, value: &str) -> Result<(), String> {
    if value.len() > MAX_FIELD_LEN {
        return Err(format!(
            "{} exceeds maximum length of {} characters",
            name, MAX_FIELD_LEN
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid_new_user() -> NewUser {
        NewUser {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            nickname: "johnd".to_string(),
            email: "john.doe@example.com".to_string(),
            password: "password123".to_string(),
            country: "UK".to_string(),
        }
    }

    #[test]
    fn test_validate_new_user() {
        assert!(valid_new_user().validate().is_ok());

        let no_email = NewUser {
            email: "".to_string(),
            ..valid_new_user()
        };
        assert_eq!(no_email.validate().unwrap_err(), "email is required");

        let bad_email = NewUser {
            email: "not-an-email".to_string(),
            ..valid_new_user()
        };
        assert!(bad_email.validate().is_err());

        let short_password = NewUser {
            password: "1234567".to_string(),
            ..valid_new_user()
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_validate_update_user() {
        assert!(UpdateUser::default().validate().is_ok());
        assert!(UpdateUser::default().is_empty());

        let update = UpdateUser {
            email: Some("broken@".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = UpdateUser {
            nickname: Some("x".repeat(MAX_FIELD_LEN + 1)),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_display_hides_password() {
        let shown = valid_new_user().to_string();
        assert!(shown.contains("john.doe@example.com"));
        assert!(!shown.contains("password123"));
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(format_timestamp(ts), "2024-03-01T12:30:00Z");
    }

    #[test]
    fn test_update_user_partial_json() {
        let update: UpdateUser = serde_json::from_str(r#"{"country": "IT"}"#).unwrap();
        assert_eq!(update.country.as_deref(), Some("IT"));
        assert!(update.email.is_none());
        assert!(!update.is_empty());
    }
}
