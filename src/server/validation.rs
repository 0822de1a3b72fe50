use crate::server::response::ApiError;

const MAX_LABEL_LEN: usize = 120;
const MIN_CYCLE_START_DAY: i64 = 1;
const MAX_CYCLE_START_DAY: i64 = 28;

/// Contract-group labels are free text, but never empty and never absurd.
/// Returns the trimmed label.
pub fn validate_contract_group(name: &str) -> Result<String, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("Contract group name is required"));
    }
    if trimmed.len() > MAX_LABEL_LEN {
        return Err(ApiError::bad_request(format!(
            "Contract group name cannot exceed {MAX_LABEL_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_measurement(value: f64) -> Result<f64, ApiError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ApiError::bad_request(
            "Measurement must be a positive number",
        ));
    }
    Ok(value)
}

pub fn validate_cycle_start_day(day: i64) -> Result<i64, ApiError> {
    if !(MIN_CYCLE_START_DAY..=MAX_CYCLE_START_DAY).contains(&day) {
        return Err(ApiError::bad_request(format!(
            "Cycle start day must be between {MIN_CYCLE_START_DAY} and {MAX_CYCLE_START_DAY}"
        )));
    }
    Ok(day)
}

pub fn validate_email(email: &str) -> Result<String, ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(ApiError::bad_request("A valid e-mail address is required"));
    }
    Ok(trimmed.to_string())
}

/// Assignments must be a JSON array when supplied.
pub fn validate_assignments(value: &serde_json::Value) -> Result<String, ApiError> {
    if !value.is_array() {
        return Err(ApiError::bad_request("Assignments must be an array"));
    }
    serde_json::to_string(value)
        .map_err(|_| ApiError::bad_request("Assignments could not be serialized"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_group_trimmed() {
        assert_eq!(validate_contract_group("  Zona Sul ").unwrap(), "Zona Sul");
        assert!(validate_contract_group("   ").is_err());
        assert!(validate_contract_group(&"x".repeat(121)).is_err());
    }

    #[test]
    fn test_measurement_positive() {
        assert!(validate_measurement(12.5).is_ok());
        assert!(validate_measurement(0.0).is_err());
        assert!(validate_measurement(-1.0).is_err());
        assert!(validate_measurement(f64::NAN).is_err());
    }

    #[test]
    fn test_cycle_day_bounds() {
        assert!(validate_cycle_start_day(1).is_ok());
        assert!(validate_cycle_start_day(28).is_ok());
        assert!(validate_cycle_start_day(0).is_err());
        assert!(validate_cycle_start_day(29).is_err());
    }

    #[test]
    fn test_assignments_shape() {
        assert!(validate_assignments(&serde_json::json!([])).is_ok());
        assert!(validate_assignments(&serde_json::json!({"contractGroup": "X"})).is_err());
    }
}
