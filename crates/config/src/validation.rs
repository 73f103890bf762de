use crate::ConfigResult;

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a file name has no directory component
    pub fn validate_file_name(value: &str, field_name: &str) -> ConfigResult<()> {
        Self::validate_not_empty(value, field_name)?;
        if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be a plain file name, got: {value}"
            )));
        }
        Ok(())
    }

    /// Validate that an interval is positive and reasonable
    pub fn validate_interval_seconds(interval_seconds: u64, field_name: &str) -> ConfigResult<()> {
        if interval_seconds == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if interval_seconds > 86400 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 86400"
            )));
        }
        Ok(())
    }

    /// Validate that a count is positive
    pub fn validate_count(count: usize, field_name: &str) -> ConfigResult<()> {
        if count == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        Ok(())
    }
}
