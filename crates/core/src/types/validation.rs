//! Execution of declarative validation rules against property values.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

use regex::Regex;
use serde_json::Value;

use super::errors::{ErrorCode, ValidationError};
use super::schema::{ValidationRule, json_type_name};

const PATTERN_CACHE_LIMIT: usize = 256;

// Compiled `pattern` constraints keyed by their source
static PATTERNS: LazyLock<Mutex<HashMap<String, Regex>>> = LazyLock::new(Default::default);

fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = PATTERNS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)?;
    if cache.len() >= PATTERN_CACHE_LIMIT {
        cache.clear();
    }
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

impl ValidationRule {
    /// Check a single value. `field` names the property in error records.
    pub fn check(&self, field: &str, value: &Value) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        check_value(self, field, value, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn check_value(rule: &ValidationRule, field: &str, value: &Value, errors: &mut Vec<ValidationError>) {
    // Type checking
    let type_ok = match (rule, value) {
        (ValidationRule::Any, _) => true,
        (ValidationRule::Text { .. }, Value::String(_)) => true,
        (ValidationRule::Number { .. }, Value::Number(_)) => true,
        (ValidationRule::Boolean, Value::Bool(_)) => true,
        (ValidationRule::Date, Value::String(s)) => is_valid_date(s) || is_valid_datetime(s),
        (ValidationRule::List { .. }, Value::Array(_)) => true,
        (ValidationRule::Enum { .. }, Value::String(_)) => true,
        (ValidationRule::Association { .. }, Value::String(_)) => true,
        (ValidationRule::Association { .. }, Value::Array(items)) => {
            items.iter().all(Value::is_string)
        }
        (ValidationRule::Object, Value::Object(_)) => true,
        _ => false,
    };

    if !type_ok {
        errors.push(
            ValidationError::for_property(
                ErrorCode::TypeMismatch,
                field,
                format!("expected {}, got {}", rule.tag(), json_type_name(value)),
            )
            .with_expected_actual(rule.tag(), json_type_name(value)),
        );
        return;
    }

    match (rule, value) {
        (ValidationRule::Text { min_length, max_length, pattern }, Value::String(s)) => {
            let len = s.chars().count();
            if let Some(min) = min_length
                && len < *min
            {
                errors.push(constraint(
                    field,
                    format!("text length {} is less than minimum {}", len, min),
                ));
            }
            if let Some(max) = max_length
                && len > *max
            {
                errors.push(constraint(
                    field,
                    format!("text length {} is greater than maximum {}", len, max),
                ));
            }
            if let Some(pattern) = pattern {
                match compiled(pattern) {
                    Ok(re) if !re.is_match(s) => errors.push(constraint(
                        field,
                        format!("value '{}' does not match pattern '{}'", s, pattern),
                    )),
                    Ok(_) => {}
                    Err(e) => errors.push(constraint(
                        field,
                        format!("pattern '{}' is not a valid regex: {}", pattern, e),
                    )),
                }
            }
        }

        (ValidationRule::Number { min, max, integer }, Value::Number(n)) => {
            if let Some(f) = n.as_f64() {
                if let Some(min) = min
                    && f < *min
                {
                    errors.push(constraint(
                        field,
                        format!("value {} is less than minimum {}", f, min),
                    ));
                }
                if let Some(max) = max
                    && f > *max
                {
                    errors.push(constraint(
                        field,
                        format!("value {} is greater than maximum {}", f, max),
                    ));
                }
                if *integer && f.fract() != 0.0 {
                    errors.push(constraint(field, format!("value {} must be an integer", f)));
                }
            }
        }

        (ValidationRule::List { items, min_items, max_items }, Value::Array(seq)) => {
            if let Some(min) = min_items
                && seq.len() < *min
            {
                errors.push(constraint(
                    field,
                    format!("list has {} items, minimum is {}", seq.len(), min),
                ));
            }
            if let Some(max) = max_items
                && seq.len() > *max
            {
                errors.push(constraint(
                    field,
                    format!("list has {} items, maximum is {}", seq.len(), max),
                ));
            }
            if let Some(item_rule) = items {
                for (i, item) in seq.iter().enumerate() {
                    let before = errors.len();
                    check_value(item_rule, field, item, errors);
                    for err in &mut errors[before..] {
                        err.path = Some(format!("{}[{}]", field, i));
                    }
                }
            }
        }

        // An empty enumeration accepts any text.
        (ValidationRule::Enum { values }, Value::String(s)) => {
            if !values.is_empty() && !values.contains(s) {
                errors.push(
                    ValidationError::for_property(
                        ErrorCode::EnumViolation,
                        field,
                        format!("'{}' is not one of {:?}", s, values),
                    )
                    .with_expected_actual(values.join("|"), s.clone()),
                );
            }
        }

        (ValidationRule::Association { multiple: false }, Value::Array(items))
            if items.len() > 1 =>
        {
            errors.push(constraint(
                field,
                format!("expects a single reference, got {}", items.len()),
            ));
        }

        _ => {}
    }
}

fn constraint(field: &str, message: String) -> ValidationError {
    ValidationError::for_property(ErrorCode::ConstraintViolation, field, message)
}

/// Check if a string is a valid date (YYYY-MM-DD format).
pub fn is_valid_date(s: &str) -> bool {
    s.len() == 10 && chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Check if a string is a valid datetime (ISO 8601 format).
pub fn is_valid_datetime(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
}
