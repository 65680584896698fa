//! Field-constraint validation against a flattened projection.

use serde::{Deserialize, Serialize};

use crate::constraint::FieldConstraint;
use crate::enums::DataType;
use crate::flatten::FlattenedValue;

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub field_path: String,
    pub message: String,
}

/// Outcome of validating one document against a constraint set.
/// Errors are ordered by field path, then message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationIssue>,
}

/// Evaluates every constraint against the flattened projection of a
/// candidate document.
pub fn validate_constraints(
    flattened: &[FlattenedValue],
    constraints: &[FieldConstraint],
) -> ValidationReport {
    let mut errors = Vec::new();

    for constraint in constraints {
        let matching: Vec<&FlattenedValue> = flattened
            .iter()
            .filter(|v| v.key == constraint.field_path)
            .collect();

        if constraint.required && matching.is_empty() {
            errors.push(issue(constraint, "required field is missing"));
            continue;
        }

        for entry in &matching {
            check_entry(constraint, entry, &mut errors);
        }
    }

    errors.sort_by(|a, b| {
        a.field_path
            .cmp(&b.field_path)
            .then_with(|| a.message.cmp(&b.message))
    });
    errors.dedup();

    ValidationReport {
        ok: errors.is_empty(),
        errors,
    }
}

fn check_entry(
    constraint: &FieldConstraint,
    entry: &FlattenedValue,
    errors: &mut Vec<ValidationIssue>,
) {
    // Null handling comes first; a permitted null skips the value rules.
    if entry.data_type == DataType::Null {
        if !constraint.nullable {
            errors.push(issue(constraint, "value must not be null"));
        }
        return;
    }

    if let Some(expected) = constraint.data_type {
        if entry.data_type != expected {
            errors.push(issue(
                constraint,
                &format!(
                    "expected type {} but found {}",
                    expected, entry.data_type
                ),
            ));
        }
    }

    if let Some(element_type) = constraint.array_element_type {
        if entry.position.is_some() && entry.data_type != element_type {
            errors.push(issue(
                constraint,
                &format!(
                    "array elements must be of type {} but found {}",
                    element_type, entry.data_type
                ),
            ));
        }
    }

    let Some(value) = entry.value.as_deref() else {
        return;
    };

    if let Some(pattern) = constraint.regex_pattern.as_deref() {
        match regex::Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(value) {
                    errors.push(issue(
                        constraint,
                        &format!("value does not match pattern {pattern}"),
                    ));
                }
            }
            Err(_) => {
                errors.push(issue(
                    constraint,
                    &format!("constraint pattern {pattern} is not a valid regex"),
                ));
            }
        }
    }

    let length = value.chars().count() as i64;
    if let Some(min) = constraint.min_length {
        if length < min {
            errors.push(issue(
                constraint,
                &format!("length {length} is below minimum {min}"),
            ));
        }
    }
    if let Some(max) = constraint.max_length {
        if length > max {
            errors.push(issue(
                constraint,
                &format!("length {length} exceeds maximum {max}"),
            ));
        }
    }

    if entry.data_type.is_numeric() {
        if let Ok(number) = value.parse::<f64>() {
            if let Some(min) = constraint.min_value {
                if number < min {
                    errors.push(issue(
                        constraint,
                        &format!("value {number} is below minimum {min}"),
                    ));
                }
            }
            if let Some(max) = constraint.max_value {
                if number > max {
                    errors.push(issue(
                        constraint,
                        &format!("value {number} exceeds maximum {max}"),
                    ));
                }
            }
        }
    }

    if let Some(allowed) = constraint.allowed_values.as_deref() {
        if !allowed.iter().any(|a| a == value) {
            errors.push(issue(
                constraint,
                &format!("value {value:?} is not in the allowed set"),
            ));
        }
    }
}

fn issue(constraint: &FieldConstraint, message: &str) -> ValidationIssue {
    ValidationIssue {
        field_path: constraint.field_path.clone(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten_text;

    fn flat(text: &str) -> Vec<FlattenedValue> {
        flatten_text(text).unwrap()
    }

    fn year_constraint() -> FieldConstraint {
        let mut c = FieldConstraint::new("col_a", "year");
        c.data_type = Some(DataType::Integer);
        c.required = true;
        c.min_value = Some(1900.0);
        c
    }

    #[test]
    fn valid_document_passes() {
        let report = validate_constraints(
            &flat(r#"{"title":"X","year":1999}"#),
            &[year_constraint()],
        );
        assert!(report.ok);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn wrong_type_fails() {
        let report = validate_constraints(&flat(r#"{"year":"abc"}"#), &[year_constraint()]);
        assert!(!report.ok);
        assert_eq!(report.errors[0].field_path, "year");
        assert!(report.errors[0].message.contains("expected type integer"));
    }

    #[test]
    fn missing_required_fails() {
        let report = validate_constraints(&flat(r#"{"title":"Y"}"#), &[year_constraint()]);
        assert!(!report.ok);
        assert_eq!(report.errors[0].message, "required field is missing");
    }

    #[test]
    fn below_minimum_fails() {
        let report = validate_constraints(&flat(r#"{"year":1800}"#), &[year_constraint()]);
        assert!(!report.ok);
        assert!(report.errors[0].message.contains("below minimum"));
    }

    #[test]
    fn null_allowed_when_nullable() {
        let mut c = FieldConstraint::new("col_a", "note");
        c.data_type = Some(DataType::String);
        let report = validate_constraints(&flat(r#"{"note":null}"#), &[c]);
        assert!(report.ok);
    }

    #[test]
    fn null_rejected_when_not_nullable() {
        let mut c = FieldConstraint::new("col_a", "note");
        c.nullable = false;
        let report = validate_constraints(&flat(r#"{"note":null}"#), &[c]);
        assert!(!report.ok);
        assert_eq!(report.errors[0].message, "value must not be null");
    }

    #[test]
    fn regex_mismatch_fails() {
        let mut c = FieldConstraint::new("col_a", "isbn");
        c.regex_pattern = Some("^[0-9-]+$".to_owned());
        let report = validate_constraints(&flat(r#"{"isbn":"not an isbn!"}"#), &[c]);
        assert!(!report.ok);
    }

    #[test]
    fn length_bounds() {
        let mut c = FieldConstraint::new("col_a", "code");
        c.min_length = Some(2);
        c.max_length = Some(4);

        assert!(!validate_constraints(&flat(r#"{"code":"a"}"#), std::slice::from_ref(&c)).ok);
        assert!(validate_constraints(&flat(r#"{"code":"abc"}"#), std::slice::from_ref(&c)).ok);
        assert!(!validate_constraints(&flat(r#"{"code":"abcde"}"#), &[c]).ok);
    }

    #[test]
    fn allowed_values() {
        let mut c = FieldConstraint::new("col_a", "state");
        c.allowed_values = Some(vec!["draft".into(), "final".into()]);

        assert!(validate_constraints(&flat(r#"{"state":"draft"}"#), std::slice::from_ref(&c)).ok);
        assert!(!validate_constraints(&flat(r#"{"state":"open"}"#), &[c]).ok);
    }

    #[test]
    fn array_element_type_checks_every_element() {
        let mut c = FieldConstraint::new("col_a", "scores");
        c.array_element_type = Some(DataType::Integer);

        assert!(validate_constraints(&flat(r#"{"scores":[1,2,3]}"#), std::slice::from_ref(&c)).ok);
        let report = validate_constraints(&flat(r#"{"scores":[1,"x",3]}"#), &[c]);
        assert!(!report.ok);
        assert!(report.errors[0].message.contains("array elements"));
    }

    #[test]
    fn errors_sorted_by_field_path() {
        let mut a = FieldConstraint::new("col_a", "zz");
        a.required = true;
        let mut b = FieldConstraint::new("col_a", "aa");
        b.required = true;

        let report = validate_constraints(&flat(r#"{"other":1}"#), &[a, b]);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].field_path, "aa");
        assert_eq!(report.errors[1].field_path, "zz");
    }
}
