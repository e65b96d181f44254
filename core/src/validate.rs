//! Hostname format check applied before domain and mailbox creation.
//!
//! Accepts ASCII labels of letters, digits and `-` (not leading),
//! separated by dots, ending in an alphabetic label of two or more
//! characters. Internationalized names and length limits are not
//! checked; the server rejects what this lets through.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ApiError;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9][A-Za-z0-9-]*\.)+[A-Za-z]{2,}$")
        .expect("HOSTNAME regex should compile - this is a bug")
});

pub fn is_hostname(candidate: &str) -> bool {
    HOSTNAME.is_match(candidate)
}

/// Reject `domain` with `ApiError::Validation` unless it looks like a hostname.
pub fn check_hostname(domain: &str) -> Result<(), ApiError> {
    if is_hostname(domain) {
        Ok(())
    } else {
        Err(ApiError::Validation {
            domain: domain.to_string(),
        })
    }
}
