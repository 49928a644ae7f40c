//! Status-code interpretation.
//!
//! All NA and zero substitution goes through [`interpret_measurement`] and
//! [`interpret_code`], which evaluate [`crate::layout::STATUS_RULES`].

use crate::constants::SENTINEL_TOLERANCE;
use crate::layout::{FieldRole, StatusAction, rule_for};

/// A normalized value and the status action that produced it, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Interpreted<T> {
    pub value: T,
    pub action: Option<StatusAction>,
}

impl<T> Interpreted<T> {
    fn plain(value: T) -> Self {
        Self {
            value,
            action: None,
        }
    }
}

/// Parse a decimal accepting either `.` or `,` as the separator.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn is_literal_missing(value: f64, literal_missing: Option<f64>) -> bool {
    literal_missing.is_some_and(|sentinel| (value - sentinel).abs() < SENTINEL_TOLERANCE)
}

/// Normalize one measurement given its raw text and companion status.
pub fn interpret_measurement(
    role: &FieldRole,
    raw: &str,
    status: Option<&str>,
) -> Interpreted<Option<f64>> {
    let FieldRole::Measurement {
        literal_missing, ..
    } = role
    else {
        return Interpreted::plain(None);
    };

    let parsed = parse_decimal(raw).filter(|&value| !is_literal_missing(value, *literal_missing));

    let Some(rule) = status.and_then(|status| rule_for(role, status.trim())) else {
        return Interpreted::plain(parsed);
    };

    let value = match rule.action {
        StatusAction::ForceMissing => None,
        StatusAction::ForceZero => Some(0.0),
        StatusAction::KeepAndFlag | StatusAction::ClearCode => parsed,
    };

    Interpreted {
        value,
        action: Some(rule.action),
    }
}

/// Normalize a textual code; codes are trimmed, never coerced to numbers.
pub fn interpret_code(role: &FieldRole, raw: &str, status: Option<&str>) -> Interpreted<Option<String>> {
    let trimmed = raw.trim();
    let value = (!trimmed.is_empty()).then(|| trimmed.to_string());

    match status.and_then(|status| rule_for(role, status.trim())) {
        Some(rule) if rule.action == StatusAction::ClearCode => Interpreted {
            value: None,
            action: Some(rule.action),
        },
        _ => Interpreted::plain(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::QuantityKind;

    const TEMPERATURE: FieldRole = FieldRole::Measurement {
        kind: QuantityKind::Continuous,
        literal_missing: None,
    };
    const PRECIPITATION: FieldRole = FieldRole::Measurement {
        kind: QuantityKind::Additive,
        literal_missing: None,
    };
    const OCCURRENCE: FieldRole = FieldRole::Measurement {
        kind: QuantityKind::Occurrence,
        literal_missing: None,
    };
    const WATER_LEVEL: FieldRole = FieldRole::Measurement {
        kind: QuantityKind::Continuous,
        literal_missing: Some(9999.0),
    };

    #[test]
    fn test_parse_decimal_separators() {
        assert_eq!(parse_decimal("12.5"), Some(12.5));
        assert_eq!(parse_decimal(" -3,2 "), Some(-3.2));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("NaN"), None);
    }

    #[test]
    fn test_status_8_always_missing() {
        for role in [TEMPERATURE, PRECIPITATION, OCCURRENCE, WATER_LEVEL] {
            for raw in ["0", "12.5", "-4,1", "", "junk", "9999"] {
                let result = interpret_measurement(&role, raw, Some("8"));
                assert_eq!(result.value, None, "{:?} {}", role, raw);
                assert_eq!(result.action, Some(StatusAction::ForceMissing));
            }
        }
        // padded status is trimmed first
        assert_eq!(interpret_measurement(&TEMPERATURE, "5", Some(" 8 ")).value, None);
    }

    #[test]
    fn test_status_9_zero_for_additive_and_occurrence() {
        for role in [PRECIPITATION, OCCURRENCE] {
            for raw in ["", "3.4", "x", "0"] {
                let result = interpret_measurement(&role, raw, Some("9"));
                assert_eq!(result.value, Some(0.0));
                assert_eq!(result.action, Some(StatusAction::ForceZero));
            }
        }
    }

    #[test]
    fn test_status_9_kept_and_flagged_for_continuous() {
        let result = interpret_measurement(&TEMPERATURE, "-1,5", Some("9"));
        assert_eq!(result.value, Some(-1.5));
        assert_eq!(result.action, Some(StatusAction::KeepAndFlag));

        let result = interpret_measurement(&TEMPERATURE, "", Some("9"));
        assert_eq!(result.value, None);
    }

    #[test]
    fn test_no_status_keeps_value() {
        let result = interpret_measurement(&PRECIPITATION, "2,0", Some(""));
        assert_eq!(result.value, Some(2.0));
        assert_eq!(result.action, None);
        assert_eq!(interpret_measurement(&PRECIPITATION, "2,0", None).value, Some(2.0));
    }

    #[test]
    fn test_literal_sentinel_is_missing() {
        assert_eq!(interpret_measurement(&WATER_LEVEL, "9999", None).value, None);
        assert_eq!(interpret_measurement(&WATER_LEVEL, "9999,0", None).value, None);
        assert_eq!(
            interpret_measurement(&WATER_LEVEL, "312", None).value,
            Some(312.0)
        );
    }

    #[test]
    fn test_codes_are_trimmed_text() {
        let result = interpret_code(&FieldRole::Code, " W ", None);
        assert_eq!(result.value.as_deref(), Some("W"));
        assert_eq!(interpret_code(&FieldRole::Code, "  ", None).value, None);
        // leading zeros survive: codes are never numeric
        assert_eq!(
            interpret_code(&FieldRole::Code, "07", Some("")).value.as_deref(),
            Some("07")
        );
    }

    #[test]
    fn test_code_cleared_by_status() {
        for status in ["8", "9"] {
            let result = interpret_code(&FieldRole::Code, "3", Some(status));
            assert_eq!(result.value, None);
            assert_eq!(result.action, Some(StatusAction::ClearCode));
        }
    }
}
