use crate::error::ApiError;

/// Ids end up as path segments on the backend, so only plain identifier
/// characters are accepted.
pub fn validate_id<'a>(kind: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let valid = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!("invalid {kind} id")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("student", "65a1f0c2e4b0a1b2c3d4e5f6").is_ok());
        assert!(validate_id("class", "class_01-b").is_ok());
        assert!(validate_id("student", "").is_err());
        assert!(validate_id("student", "../admin").is_err());
        assert!(validate_id("class", &"a".repeat(65)).is_err());
    }
}
