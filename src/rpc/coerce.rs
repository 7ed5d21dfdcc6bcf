//! Argument fixup against a method's declared parameter shape.
//!
//! Conversion is best effort: a value that cannot be converted is passed on
//! unchanged and the handler's own typed extraction reports the failure.

use std::time::Duration;

use serde_json::{Number, Value};

use super::handler::{HandlerError, ParamSpec, ParamType};

/// Validates the argument count, converts mismatched values and fills
/// omitted trailing parameters from their defaults.
///
/// A count mismatch is reported like any other handler failure.
pub fn fixup_args(params: &[ParamSpec], mut args: Vec<Value>) -> Result<Vec<Value>, HandlerError> {
    let required = params.iter().filter(|p| !p.has_default()).count();
    if args.len() < required {
        return Err(HandlerError::new(format!(
            "Argument count mismatch (expected at least {}, got {})",
            required,
            args.len()
        )));
    }
    if args.len() > params.len() {
        return Err(HandlerError::new(format!(
            "Argument count mismatch (expected at most {}, got {})",
            params.len(),
            args.len()
        )));
    }

    for (arg, spec) in args.iter_mut().zip(params) {
        let value = std::mem::take(arg);
        *arg = coerce(value, &spec.ty);
    }

    for (index, spec) in params.iter().enumerate().skip(args.len()) {
        match &spec.default {
            Some(default) => args.push(default.clone()),
            None => {
                return Err(HandlerError::new(format!(
                    "Missing argument {} ({})",
                    index,
                    spec.ty.name()
                )))
            }
        }
    }

    Ok(args)
}

/// Converts one value toward `ty`, or returns it unchanged.
pub fn coerce(value: Value, ty: &ParamType) -> Value {
    if value.is_null() || ty.accepts(&value) {
        return value;
    }
    match value {
        Value::Number(_) | Value::Bool(_) if ty.is_primitive() => {
            convert_primitive(&value, ty).unwrap_or(value)
        }
        Value::String(ref text) if matches!(ty, ParamType::Duration) => parse_duration(text)
            .and_then(|span| serde_json::to_value(span).ok())
            .unwrap_or(value),
        Value::Array(_) | Value::Object(_) => match ty {
            ParamType::Structured { convert, .. } => match convert(value.clone()) {
                Ok(converted) => converted,
                Err(_) => value,
            },
            _ => value,
        },
        other => other,
    }
}

fn convert_primitive(value: &Value, ty: &ParamType) -> Option<Value> {
    match ty {
        ParamType::Int => as_i64(value).map(Value::from),
        ParamType::UInt => as_i64(value)
            .and_then(|n| u64::try_from(n).ok())
            .or_else(|| value.as_u64())
            .map(Value::from),
        ParamType::Float => as_f64(value)
            .and_then(Number::from_f64)
            .map(Value::Number),
        ParamType::Bool => match value {
            Value::Number(_) => as_f64(value).map(|n| Value::Bool(n != 0.0)),
            _ => None,
        },
        ParamType::String => match value {
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(true) => Some(Value::String("True".to_string())),
            Value::Bool(false) => Some(Value::String("False".to_string())),
            _ => None,
        },
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else if let Some(u) = n.as_u64() {
                i64::try_from(u).ok()
            } else {
                let rounded = n.as_f64()?.round_ties_even();
                if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
                    Some(rounded as i64)
                } else {
                    None
                }
            }
        }
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Parses `[d.]hh:mm[:ss[.fffffff]]` or a whole number of days.
pub fn parse_duration(text: &str) -> Option<Duration> {
    const DAY: u64 = 86_400;

    let text = text.trim();
    if !text.contains(':') {
        let days: u64 = text.parse().ok()?;
        return days.checked_mul(DAY).map(Duration::from_secs);
    }

    let mut fields = text.split(':');
    let head = fields.next()?;
    let (days, hours) = match head.split_once('.') {
        Some((days, hours)) => (parse_field(days, u64::MAX)?, parse_field(hours, 23)?),
        None => (0, parse_field(head, 23)?),
    };
    let minutes = parse_field(fields.next()?, 59)?;
    let (seconds, nanos) = match fields.next() {
        Some(field) => parse_seconds(field)?,
        None => (0, 0),
    };
    if fields.next().is_some() {
        return None;
    }

    let secs = days
        .checked_mul(DAY)?
        .checked_add(hours * 3_600 + minutes * 60 + seconds)?;
    Some(Duration::new(secs, nanos))
}

fn parse_field(field: &str, max: u64) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok().filter(|value| *value <= max)
}

fn parse_seconds(field: &str) -> Option<(u64, u32)> {
    let (whole, fraction) = match field.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (field, None),
    };
    let seconds = parse_field(whole, 59)?;
    let nanos = match fraction {
        None => 0,
        Some(digits) => {
            if digits.is_empty() || digits.len() > 7 || !digits.bytes().all(|b| b.is_ascii_digit())
            {
                return None;
            }
            let padded = format!("{:0<9}", digits);
            padded.parse().ok()?
        }
    };
    Some((seconds, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn required(ty: ParamType) -> ParamSpec {
        ParamSpec { ty, default: None }
    }

    fn optional(ty: ParamType, default: Value) -> ParamSpec {
        ParamSpec {
            ty,
            default: Some(default),
        }
    }

    #[rstest]
    #[case(json!(2.5), ParamType::Int, json!(2))]
    #[case(json!(3.5), ParamType::Int, json!(4))]
    #[case(json!(true), ParamType::Int, json!(1))]
    #[case(json!(7), ParamType::Float, json!(7.0))]
    #[case(json!(-3), ParamType::UInt, json!(-3))]
    #[case(json!(0), ParamType::Bool, json!(false))]
    #[case(json!(42), ParamType::String, json!("42"))]
    #[case(json!(true), ParamType::String, json!("True"))]
    #[case(json!(false), ParamType::String, json!("False"))]
    #[case(json!("5"), ParamType::Int, json!("5"))]
    #[case(json!(null), ParamType::Int, json!(null))]
    #[case(json!([1, 2]), ParamType::Any, json!([1, 2]))]
    fn coerce_cases(#[case] input: Value, #[case] ty: ParamType, #[case] expected: Value) {
        assert_eq!(coerce(input, &ty), expected);
    }

    #[test]
    fn coerce_duration_string() {
        let converted = coerce(json!("00:01:30"), &ParamType::Duration);
        assert_eq!(converted, json!({ "secs": 90, "nanos": 0 }));
    }

    #[test]
    fn coerce_structured_array() {
        let ty = ParamType::structured::<Vec<f64>>();
        assert_eq!(coerce(json!([1, 2]), &ty), json!([1.0, 2.0]));
        assert_eq!(coerce(json!(["a"]), &ty), json!(["a"]));
    }

    #[rstest]
    #[case("1", Some(Duration::from_secs(86_400)))]
    #[case("01:02", Some(Duration::from_secs(3_720)))]
    #[case("1.02:03:04", Some(Duration::from_secs(93_784)))]
    #[case("00:00:01.5", Some(Duration::from_millis(1_500)))]
    #[case("00:00:00.0000001", Some(Duration::from_nanos(100)))]
    #[case("24:00", None)]
    #[case("00:60", None)]
    #[case("-01:00", None)]
    #[case("1:2:3:4", None)]
    #[case("abc", None)]
    fn duration_cases(#[case] text: &str, #[case] expected: Option<Duration>) {
        assert_eq!(parse_duration(text), expected);
    }

    #[test]
    fn too_few_arguments() {
        let params = vec![required(ParamType::Int), required(ParamType::Int)];
        let err = fixup_args(&params, vec![json!(1)]).unwrap_err();
        assert_eq!(err.message, "Argument count mismatch (expected at least 2, got 1)");
    }

    #[test]
    fn too_many_arguments() {
        let params = vec![required(ParamType::Int)];
        let err = fixup_args(&params, vec![json!(1), json!(2)]).unwrap_err();
        assert_eq!(err.message, "Argument count mismatch (expected at most 1, got 2)");
    }

    #[test]
    fn defaults_fill_trailing_parameters() {
        let params = vec![
            required(ParamType::Int),
            optional(ParamType::Int, json!(10)),
            optional(ParamType::String, json!("x")),
        ];
        let args = fixup_args(&params, vec![json!(1)]).unwrap();
        assert_eq!(args, vec![json!(1), json!(10), json!("x")]);

        let args = fixup_args(&params, vec![json!(1), json!(2)]).unwrap();
        assert_eq!(args, vec![json!(1), json!(2), json!("x")]);
    }

    #[test]
    fn required_after_optional_is_reported() {
        let params = vec![optional(ParamType::Int, json!(0)), required(ParamType::Int)];
        let err = fixup_args(&params, vec![json!(1)]).unwrap_err();
        assert!(err.message.contains("Missing argument 1"));
    }
}
