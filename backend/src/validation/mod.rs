//! Email and URL format checks.
//!
//! The checks never block a value from being committed. A failure is recorded
//! in [`ValidationState`] (read by the "can I proceed" gate) and reported as
//! a warning log entry.
//!
//! # Example
//!
//! ```rust,ignore
//! use elablite::validation::{is_valid_email, is_valid_url};
//!
//! assert!(is_valid_email("jane.doe@example.org"));
//! assert!(is_valid_url("https://example.org/lab"));
//! assert!(!is_valid_url("example.org"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::api::logs::log_warning;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("Invalid embedded email pattern")
});

/// Check the format of an email address.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    email.len() <= 254 && !email.contains("..") && EMAIL_RE.is_match(email)
}

/// Check the format of an absolute http(s)/ftp URL with a host.
pub fn is_valid_url(raw: &str) -> bool {
    match url::Url::parse(raw.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https" | "ftp") && parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Fields whose last check failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationState {
    invalid: BTreeSet<String>,
}

impl ValidationState {
    /// Check an email field and record the outcome.
    pub fn check_email(&mut self, field: &str, value: &str) -> bool {
        self.record(field, is_valid_email(value), "Invalid email")
    }

    /// Check a URL field and record the outcome.
    pub fn check_url(&mut self, field: &str, value: &str) -> bool {
        self.record(field, is_valid_url(value), "Invalid URL")
    }

    fn record(&mut self, field: &str, valid: bool, message: &str) -> bool {
        if valid {
            self.invalid.remove(field);
        } else {
            log_warning(format!("{}: '{}'", message, field));
            self.invalid.insert(field.to_string());
        }
        valid
    }

    /// At least one field failed its last check.
    pub fn has_error(&self) -> bool {
        !self.invalid.is_empty()
    }

    /// Names of the failing fields.
    pub fn invalid_fields(&self) -> impl Iterator<Item = &str> {
        self.invalid.iter().map(String::as_str)
    }

    /// Forget every recorded failure.
    pub fn clear(&mut self) {
        self.invalid.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("jane.doe@example.org"));
        assert!(is_valid_email("lab+xrf@crc.mnhn.fr"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email("jane.doe"));
        assert!(!is_valid_email("jane@localhost"));
        assert!(!is_valid_email("a..b@example.org"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_urls() {
        assert!(is_valid_url("https://example.org/path?q=1"));
        assert!(is_valid_url("http://127.0.0.1:8080"));
        assert!(!is_valid_url("example.org"));
        assert!(!is_valid_url("mailto:jane@example.org"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_state_tracks_per_field() {
        let mut state = ValidationState::default();
        assert!(!state.check_email("contact", "nope"));
        assert!(!state.check_url("site", "nope"));
        assert!(state.has_error());

        state.check_email("contact", "jane@example.org");
        assert!(state.has_error());
        assert_eq!(state.invalid_fields().collect::<Vec<_>>(), vec!["site"]);

        state.check_url("site", "https://example.org");
        assert!(!state.has_error());
    }
}
