//! Shared utility functions for back-end adapters.

use cb_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Read a credential from the environment variable named `env_var`.
///
/// A missing, non-UTF-8, or blank value is a [`Error::Config`]; back ends
/// cannot start without their credentials.
pub fn resolve_secret(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Ok(_) => Err(Error::Config(format!("environment variable '{env_var}' is empty"))),
        Err(_) => Err(Error::Config(format!(
            "environment variable '{env_var}' not set or not valid UTF-8"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_secret_reads_env() {
        let var_name = "CB_TEST_RESOLVE_SECRET_1234";
        std::env::set_var(var_name, "  env-secret-value \n");
        assert_eq!(resolve_secret(var_name).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_secret_missing() {
        let err = resolve_secret("CB_TEST_NONEXISTENT_VAR_8888").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("CB_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn resolve_secret_blank() {
        let var_name = "CB_TEST_BLANK_SECRET_5555";
        std::env::set_var(var_name, "   ");
        let err = resolve_secret(var_name).unwrap_err();
        assert!(err.to_string().contains("is empty"));
        std::env::remove_var(var_name);
    }
}
