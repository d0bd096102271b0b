use serde_json::{Map as JsonMap, Number, Value};

use super::super::errors::AgentError;
use crate::application::tooling::{ParamKind, ParamSpec, ToolDescriptor};

/// Map untyped call parameters onto a tool's declared schema, in
/// declaration order. Extra parameters are ignored; the result carries
/// exactly the schema's names as keys. Coercion is idempotent over values
/// it has already produced.
pub(crate) fn coerce_arguments(
    params: &Value,
    tool: &ToolDescriptor,
) -> Result<JsonMap<String, Value>, AgentError> {
    let supplied = match params {
        Value::Object(map) => Some(map),
        _ => None,
    };

    let mut arguments = JsonMap::new();
    for spec in &tool.parameters {
        let value = supplied
            .and_then(|map| map.get(&spec.name))
            .ok_or_else(|| AgentError::MissingParameter {
                tool: tool.name.clone(),
                param: spec.name.clone(),
            })?;

        let coerced = match spec.kind {
            ParamKind::Integer => coerce_integer(spec, value)?,
            ParamKind::Number => coerce_number(spec, value)?,
            ParamKind::Array => coerce_array(spec, value)?,
            ParamKind::Text => coerce_text(value),
        };
        arguments.insert(spec.name.clone(), coerced);
    }

    Ok(arguments)
}

fn coerce_integer(spec: &ParamSpec, value: &Value) -> Result<Value, AgentError> {
    match value {
        Value::Number(number) => {
            if let Some(whole) = number.as_i64() {
                return Ok(Value::from(whole));
            }
            // Fractional input truncates toward zero.
            number
                .as_f64()
                .map(|float| Value::from(float.trunc() as i64))
                .ok_or_else(|| coercion_error(spec, value, "integer"))
        }
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| coercion_error(spec, value, "integer")),
        _ => Err(coercion_error(spec, value, "integer")),
    }
}

fn coerce_number(spec: &ParamSpec, value: &Value) -> Result<Value, AgentError> {
    let float = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    float
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| coercion_error(spec, value, "number"))
}

/// Sequences pass through untouched. String form is a narrow convenience:
/// a full bracket pair around comma-separated integers.
fn coerce_array(spec: &ParamSpec, value: &Value) -> Result<Value, AgentError> {
    match value {
        Value::Array(_) => Ok(value.clone()),
        Value::String(text) => {
            let trimmed = text.trim();
            let inner = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .ok_or_else(|| coercion_error(spec, value, "integer array"))?;

            if inner.trim().is_empty() {
                return Ok(Value::Array(Vec::new()));
            }

            let mut elements = Vec::new();
            for piece in inner.split(',') {
                let parsed = piece
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| coercion_error(spec, value, "integer array"))?;
                elements.push(Value::from(parsed));
            }
            Ok(Value::Array(elements))
        }
        _ => Err(coercion_error(spec, value, "integer array")),
    }
}

fn coerce_text(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        other => Value::String(other.to_string()),
    }
}

fn coercion_error(spec: &ParamSpec, value: &Value, expected: &'static str) -> AgentError {
    AgentError::TypeCoercion {
        param: spec.name.clone(),
        value: value.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::ParamKind;
    use serde_json::json;

    fn descriptor(params: Vec<(&str, ParamKind)>) -> ToolDescriptor {
        ToolDescriptor {
            name: "probe".to_string(),
            description: None,
            parameters: params
                .into_iter()
                .map(|(name, kind)| ParamSpec {
                    name: name.to_string(),
                    kind,
                    required: true,
                })
                .collect(),
        }
    }

    #[test]
    fn coerces_integers_from_numbers_and_strings() {
        let tool = descriptor(vec![("a", ParamKind::Integer), ("b", ParamKind::Integer)]);
        let arguments =
            coerce_arguments(&json!({"a": 5, "b": "3"}), &tool).expect("coercion succeeds");
        assert_eq!(arguments.get("a"), Some(&json!(5)));
        assert_eq!(arguments.get("b"), Some(&json!(3)));
    }

    #[test]
    fn is_idempotent_over_typed_values() {
        let tool = descriptor(vec![
            ("count", ParamKind::Integer),
            ("ratio", ParamKind::Number),
            ("items", ParamKind::Array),
            ("label", ParamKind::Text),
        ]);
        let raw = json!({
            "count": "7",
            "ratio": "2.5",
            "items": "[1, 2, 3]",
            "label": 9,
        });

        let first = coerce_arguments(&raw, &tool).expect("first pass");
        let second =
            coerce_arguments(&Value::Object(first.clone()), &tool).expect("second pass");
        assert_eq!(first, second);
    }

    #[test]
    fn parses_array_from_bracketed_string() {
        let tool = descriptor(vec![("steps", ParamKind::Array)]);
        let arguments =
            coerce_arguments(&json!({"steps": "[1, 2, 3]"}), &tool).expect("coercion succeeds");
        assert_eq!(arguments.get("steps"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn rejects_unterminated_array_string() {
        let tool = descriptor(vec![("steps", ParamKind::Array)]);
        let error = coerce_arguments(&json!({"steps": "[1,2"}), &tool).expect_err("must fail");
        assert!(matches!(error, AgentError::TypeCoercion { .. }));
    }

    #[test]
    fn empty_bracket_pair_yields_empty_sequence() {
        let tool = descriptor(vec![("steps", ParamKind::Array)]);
        let arguments = coerce_arguments(&json!({"steps": "[]"}), &tool).expect("coerces");
        assert_eq!(arguments.get("steps"), Some(&json!([])));
    }

    #[test]
    fn reports_missing_parameter() {
        let tool = descriptor(vec![("a", ParamKind::Integer), ("b", ParamKind::Integer)]);
        let error = coerce_arguments(&json!({"a": 1}), &tool).expect_err("must fail");
        assert!(matches!(
            error,
            AgentError::MissingParameter { ref param, .. } if param == "b"
        ));
    }

    #[test]
    fn empty_payload_fails_unless_tool_takes_no_parameters() {
        let with_params = descriptor(vec![("a", ParamKind::Integer)]);
        let error = coerce_arguments(&json!({}), &with_params).expect_err("must fail");
        assert!(matches!(error, AgentError::MissingParameter { .. }));

        let zero_params = descriptor(vec![]);
        let arguments = coerce_arguments(&Value::Null, &zero_params).expect("tolerated");
        assert!(arguments.is_empty());
    }

    #[test]
    fn ignores_parameters_outside_the_schema() {
        let tool = descriptor(vec![("a", ParamKind::Integer)]);
        let arguments =
            coerce_arguments(&json!({"a": 1, "debug": true}), &tool).expect("coerces");
        assert_eq!(arguments.len(), 1);
        assert!(arguments.contains_key("a"));
    }

    #[test]
    fn rejects_non_numeric_integer_input() {
        let tool = descriptor(vec![("a", ParamKind::Integer)]);
        let error = coerce_arguments(&json!({"a": "five"}), &tool).expect_err("must fail");
        assert!(matches!(
            error,
            AgentError::TypeCoercion { expected: "integer", .. }
        ));
    }

    #[test]
    fn stringifies_non_string_text_input() {
        let tool = descriptor(vec![("label", ParamKind::Text)]);
        let arguments = coerce_arguments(&json!({"label": 12}), &tool).expect("coerces");
        assert_eq!(arguments.get("label"), Some(&json!("12")));
    }
}
