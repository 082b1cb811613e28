use once_cell::sync::Lazy;
use regex::Regex;
use validator::Validate;

use crate::error::AppError;

pub static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap());

/// Missing required request field -> 400, matching the error taxonomy.
pub fn require<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

pub trait ValidateExt {
    fn validate_request(&self) -> Result<(), AppError>;
}

impl<T: Validate> ValidateExt for T {
    fn validate_request(&self) -> Result<(), AppError> {
        self.validate().map_err(|errors| {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|field| field.to_string())
                .collect();
            fields.sort();
            AppError::Validation(format!("Invalid value for: {}", fields.join(", ")))
        })
    }
}
