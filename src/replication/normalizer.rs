// ABOUTME: Field normalizer - coerces loosely typed wire fields into stable output types
// ABOUTME: Amount fields become floats, foreign-key ids become strings

use serde_json::{Map, Number, Value};

use crate::api::models::parse_timestamp;
use crate::api::Record;
use crate::error::ReplicationError;

/// Amount fields that arrive as number-or-string.
const AMOUNT_FIELDS: [&str; 2] = ["order_total", "order_total_usd"];

/// Integer ids on a response that reference string-typed ids on the questions stream.
const RESPONSE_ID_FIELDS: [&str; 1] = ["question_id"];

/// Timestamp fields that must parse; a malformed one aborts the sync.
const TIMESTAMP_FIELDS: [&str; 3] = ["inserted_at", "updated_at", "response_provided_at"];

/// Whether a value counts as set for coercion purposes.
///
/// Coercion only touches truthy values: null, `false`, zero, empty strings and
/// empty containers all pass through unchanged. A literal `0` order total is
/// therefore left as an integer rather than becoming `0.0`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Apply `coerce` to `field` only when it is present and truthy.
fn coerce_if_truthy<F>(
    fields: &mut Map<String, Value>,
    field: &'static str,
    coerce: F,
) -> Result<(), ReplicationError>
where
    F: FnOnce(&'static str, &Value) -> Result<Value, ReplicationError>,
{
    if let Some(value) = fields.get_mut(field) {
        if is_truthy(value) {
            *value = coerce(field, &*value)?;
        }
    }
    Ok(())
}

fn to_float(field: &'static str, value: &Value) -> Result<Value, ReplicationError> {
    let invalid = || ReplicationError::InvalidNumber {
        field,
        value: value.to_string(),
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    Number::from_f64(parsed).map(Value::Number).ok_or_else(invalid)
}

fn to_id_string(_field: &'static str, value: &Value) -> Result<Value, ReplicationError> {
    Ok(match value {
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    })
}

fn check_timestamps(fields: &Map<String, Value>) -> Result<(), ReplicationError> {
    for field in TIMESTAMP_FIELDS {
        match fields.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::String(raw)) => {
                parse_timestamp(field, raw)?;
            }
            Some(other) => {
                return Err(ReplicationError::MalformedTimestamp {
                    field,
                    value: other.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Normalize one `responses` record.
pub fn normalize_response(record: Record) -> Result<Record, ReplicationError> {
    let mut fields = record.into_fields();
    check_timestamps(&fields)?;
    for field in AMOUNT_FIELDS {
        coerce_if_truthy(&mut fields, field, to_float)?;
    }
    for field in RESPONSE_ID_FIELDS {
        coerce_if_truthy(&mut fields, field, to_id_string)?;
    }
    Ok(Record::new(fields))
}

/// Normalize one `questions` record.
///
/// Question ids are stringified on the question itself, on each of its
/// responses, and on the single level of clarification question a response can
/// carry (including that clarification's own responses).
pub fn normalize_question(record: Record) -> Result<Record, ReplicationError> {
    let mut fields = record.into_fields();
    stringify_question_ids(&mut fields, true)?;
    Ok(Record::new(fields))
}

fn stringify_question_ids(
    question: &mut Map<String, Value>,
    allow_clarification: bool,
) -> Result<(), ReplicationError> {
    coerce_if_truthy(question, "id", to_id_string)?;

    let Some(Value::Array(responses)) = question.get_mut("responses") else {
        return Ok(());
    };
    for response in responses.iter_mut() {
        let Value::Object(response) = response else {
            continue;
        };
        coerce_if_truthy(response, "id", to_id_string)?;
        if allow_clarification {
            if let Some(Value::Object(clarification)) = response.get_mut("clarification_question") {
                stringify_question_ids(clarification, false)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_response_amounts_and_question_id() {
        let normalized = normalize_response(record(json!({
            "id": "1",
            "order_total": "19.99",
            "order_total_usd": 12,
            "question_id": 42
        })))
        .unwrap();

        assert_eq!(normalized.get("order_total"), Some(&json!(19.99)));
        assert_eq!(normalized.get("order_total_usd"), Some(&json!(12.0)));
        assert_eq!(normalized.get("question_id"), Some(&json!("42")));
        assert_eq!(normalized.get("id"), Some(&json!("1")));
    }

    #[test]
    fn test_normalize_response_leaves_falsy_values() {
        let normalized = normalize_response(record(json!({
            "id": "1",
            "order_total": null,
            "order_total_usd": 0,
            "question_id": null
        })))
        .unwrap();

        assert_eq!(normalized.get("order_total"), Some(&Value::Null));
        // zero is falsy, so it stays an integer
        assert_eq!(normalized.get("order_total_usd"), Some(&json!(0)));
        assert_eq!(normalized.get("question_id"), Some(&Value::Null));
    }

    #[test]
    fn test_normalize_response_absent_fields_stay_absent() {
        let normalized = normalize_response(record(json!({"id": "1"}))).unwrap();
        assert!(normalized.get("order_total").is_none());
        assert!(normalized.get("question_id").is_none());
    }

    #[test]
    fn test_normalize_response_rejects_non_numeric_amount() {
        let err = normalize_response(record(json!({"id": "1", "order_total": "n/a"}))).unwrap_err();
        assert!(matches!(
            err,
            ReplicationError::InvalidNumber {
                field: "order_total",
                ..
            }
        ));
    }

    #[test]
    fn test_normalize_response_rejects_malformed_timestamp() {
        let ok = normalize_response(record(json!({
            "id": "1",
            "inserted_at": "2023-01-01T00:00:00.000001",
            "updated_at": null
        })));
        assert!(ok.is_ok());

        let err = normalize_response(record(json!({
            "id": "1",
            "updated_at": "not a time"
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            ReplicationError::MalformedTimestamp {
                field: "updated_at",
                ..
            }
        ));
    }

    #[test]
    fn test_normalize_question_nested_ids() {
        let normalized = normalize_question(record(json!({
            "id": 7,
            "prompt": "How did you hear about us?",
            "responses": [
                {"id": 70, "value": "Podcast", "clarification_question": {
                    "id": 8,
                    "responses": [{"id": 80}, {"id": 81}]
                }},
                {"id": 71, "value": "Friend", "clarification_question": null}
            ]
        })))
        .unwrap();

        assert_eq!(normalized.get("id"), Some(&json!("7")));
        let responses = normalized.get("responses").unwrap();
        assert_eq!(responses[0]["id"], json!("70"));
        assert_eq!(responses[1]["id"], json!("71"));
        assert_eq!(responses[0]["clarification_question"]["id"], json!("8"));
        assert_eq!(
            responses[0]["clarification_question"]["responses"],
            json!([{"id": "80"}, {"id": "81"}])
        );
        assert_eq!(responses[1]["clarification_question"], Value::Null);
    }

    #[test]
    fn test_normalize_question_stops_after_one_clarification_level() {
        let normalized = normalize_question(record(json!({
            "id": 1,
            "responses": [{"id": 2, "clarification_question": {
                "id": 3,
                "responses": [{"id": 4, "clarification_question": {"id": 5}}]
            }}]
        })))
        .unwrap();

        let responses = normalized.get("responses").unwrap();
        let nested = &responses[0]["clarification_question"]["responses"][0];
        assert_eq!(nested["id"], json!("4"));
        assert_eq!(nested["clarification_question"]["id"], json!(5));
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(1)));
    }
}
