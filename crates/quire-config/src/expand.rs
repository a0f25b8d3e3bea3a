//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// `field` names the config key for error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains('$') {
        return Ok(value.to_owned());
    }

    shellexpand::env(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_unchanged() {
        assert_eq!(expand_env("/blog/", "f").unwrap(), "/blog/");
    }

    #[test]
    fn test_default_value_used() {
        let result = expand_env("${QUIRE_EXPAND_TEST_UNSET:-/fallback/}", "f").unwrap();
        assert_eq!(result, "/fallback/");
    }

    #[test]
    fn test_unset_variable_errors() {
        let result = expand_env("${QUIRE_EXPAND_TEST_DEFINITELY_UNSET}", "build.base_url");
        match result {
            Err(ConfigError::EnvVar { field, message }) => {
                assert_eq!(field, "build.base_url");
                assert!(message.contains("QUIRE_EXPAND_TEST_DEFINITELY_UNSET"));
            }
            other => panic!("expected EnvVar error, got {other:?}"),
        }
    }
}
