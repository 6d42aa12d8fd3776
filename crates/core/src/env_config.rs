//! Environment variable overrides with warn-level logging for invalid values.

/// Environment variable naming the YAML configuration file.
pub const CONFIG_PATH_ENV: &str = "YML";

/// Parse an environment variable with a default fallback.
///
/// - If the variable is not set: returns `default` silently (expected case).
/// - If the variable is set but cannot be parsed: logs a warning and returns `default`.
pub fn env_parse_with_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    default: T,
) -> T {
    match std::env::var(var) {
        Ok(v) => match v.parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    var,
                    value = %v,
                    default = %default,
                    "invalid env var value, using default"
                );
                default
            },
        },
        Err(_) => default,
    }
}

/// Non-empty string value of an environment variable.
pub fn env_string(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_valid_value() {
        let var_name = "XIYAN_TEST_ENV_PARSE_VALID_4411";
        // SAFETY: test-local variable name, not read by other tests.
        unsafe { std::env::set_var(var_name, "8012") };
        let result: u16 = env_parse_with_default(var_name, 8080);
        assert_eq!(result, 8012);
        unsafe { std::env::remove_var(var_name) };
    }

    #[test]
    fn test_env_parse_invalid_value() {
        let var_name = "XIYAN_TEST_ENV_PARSE_INVALID_4412";
        unsafe { std::env::set_var(var_name, "not-a-port") };
        let result: u16 = env_parse_with_default(var_name, 8080);
        assert_eq!(result, 8080);
        unsafe { std::env::remove_var(var_name) };
    }

    #[test]
    fn test_env_parse_missing_var() {
        let result: u16 = env_parse_with_default("XIYAN_TEST_ENV_PARSE_MISSING_4413", 8080);
        assert_eq!(result, 8080);
    }

    #[test]
    fn test_env_string_ignores_blank() {
        let var_name = "XIYAN_TEST_ENV_STRING_BLANK_4414";
        unsafe { std::env::set_var(var_name, "   ") };
        assert_eq!(env_string(var_name), None);
        unsafe { std::env::remove_var(var_name) };
    }
}
