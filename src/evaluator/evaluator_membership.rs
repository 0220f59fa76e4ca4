use super::Value;
use super::cmp::cypher_equals;

pub(super) fn string_predicate<F>(left: &Value, right: &Value, pred: F) -> Value
where
    F: FnOnce(&str, &str) -> bool,
{
    match (left, right) {
        (Value::String(l), Value::String(r)) => Value::Bool(pred(l, r)),
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        _ => Value::Null,
    }
}

pub(super) fn in_list(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (_, Value::Null) => Value::Null,
        (l, Value::List(items)) => {
            let mut saw_null = false;
            for item in items {
                match cypher_equals(l, item) {
                    Value::Bool(true) => return Value::Bool(true),
                    Value::Bool(false) => {}
                    Value::Null => saw_null = true,
                    _ => saw_null = true,
                }
            }
            if saw_null {
                Value::Null
            } else {
                Value::Bool(false)
            }
        }
        _ => Value::Null,
    }
}

/// `=~`: the pattern must match the whole subject string. An invalid pattern
/// is a non-match, not an error.
pub(super) fn regex_match(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::String(subject), Value::String(pattern)) => {
            match regex::Regex::new(&format!("^(?:{pattern})$")) {
                Ok(re) => Value::Bool(re.is_match(subject)),
                Err(_) => Value::Bool(false),
            }
        }
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::{in_list, regex_match};
    use crate::executor::Value;

    #[test]
    fn regex_requires_full_string_match() {
        let subject = Value::String("Keanu".to_string());
        assert_eq!(
            regex_match(&subject, &Value::String("K.*".to_string())),
            Value::Bool(true)
        );
        assert_eq!(
            regex_match(&subject, &Value::String("ean".to_string())),
            Value::Bool(false)
        );
    }

    #[test]
    fn invalid_regex_pattern_is_a_non_match() {
        assert_eq!(
            regex_match(
                &Value::String("x".to_string()),
                &Value::String("(unclosed".to_string())
            ),
            Value::Bool(false)
        );
    }

    #[test]
    fn regex_on_null_operand_is_null() {
        assert_eq!(
            regex_match(&Value::Null, &Value::String(".*".to_string())),
            Value::Null
        );
    }

    #[test]
    fn null_in_empty_list_is_false() {
        assert_eq!(
            in_list(&Value::Null, &Value::List(vec![])),
            Value::Bool(false)
        );
    }

    #[test]
    fn null_in_non_empty_list_is_null() {
        assert_eq!(
            in_list(
                &Value::Null,
                &Value::List(vec![Value::Int(1), Value::Int(2), Value::Null])
            ),
            Value::Null
        );
    }
}
