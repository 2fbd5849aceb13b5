//! Environment-based credential lookup shared by the driver constructors.

use crate::error::DriverError;

/// Reads a required environment variable, mapping absence or an empty
/// value to an authentication error naming the variable.
pub fn required_env(name: &str) -> Result<String, DriverError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(DriverError::authentication(format!(
            "missing required environment variable {name}"
        ))
        .with_detail("variable", name)),
    }
}

/// Reads an optional environment variable, treating empty values as unset.
pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Reads an environment variable with a fallback default.
pub fn env_or(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_is_an_authentication_error() {
        let err = required_env("DRIVEKIT_TEST_UNSET_VAR").expect_err("unset");

        assert_eq!(err.kind(), crate::ErrorKind::Authentication);
        assert_eq!(
            err.detail("variable"),
            Some(&serde_json::Value::from("DRIVEKIT_TEST_UNSET_VAR"))
        );
    }

    #[test]
    fn default_applies_when_unset() {
        assert_eq!(
            env_or("DRIVEKIT_TEST_UNSET_VAR", "https://api.example.test"),
            "https://api.example.test"
        );
    }
}
