// ABOUTME: Evaluates JavaScript literal expressions into JSON values without executing code.
// ABOUTME: Used for module state and for constant route attributes.

use crate::syntax::{
    node_text, object_properties, significant_children, string_literal_value, unwrap_parens,
    ExpressionSnippet, PropertyKind,
};
use serde_json::{Map, Number, Value};
use tree_sitter::Node;

/// Largest integer a JavaScript number holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// JSON value of a pure literal expression, `None` when any part is not a literal.
pub fn evaluate_literal(node: &Node, content: &str) -> Option<Value> {
    let node = unwrap_parens(*node);
    match node.kind() {
        "object" => {
            let mut map = Map::new();
            for property in object_properties(&node) {
                if property.kind != PropertyKind::Pair {
                    return None;
                }
                let key = property.name(content)?;
                let value = evaluate_literal(&property.value?, content)?;
                map.insert(key, value);
            }
            Some(Value::Object(map))
        }
        "array" => significant_children(&node)
            .iter()
            .map(|element| evaluate_literal(element, content))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        "string" | "template_string" => string_literal_value(&node, content).map(Value::String),
        "number" => parse_number(node_text(&node, content)),
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" | "undefined" => Some(Value::Null),
        "identifier" if node_text(&node, content) == "undefined" => Some(Value::Null),
        "unary_expression" => {
            let operator = node.child_by_field_name("operator")?;
            let argument = node.child_by_field_name("argument")?;
            let value = evaluate_literal(&argument, content)?;
            match (node_text(&operator, content), value) {
                ("-", Value::Number(n)) => negate(&n),
                ("+", Value::Number(n)) => Some(Value::Number(n)),
                ("!", Value::Bool(b)) => Some(Value::Bool(!b)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Module state: the literal value, or the raw expression text when it is not a literal.
pub fn state_value(node: &Node, content: &str) -> Value {
    evaluate_literal(node, content)
        .unwrap_or_else(|| Value::String(node_text(&unwrap_parens(*node), content).to_string()))
}

/// State value for a standalone source snippet such as `{ a: 1 }`.
pub fn parse_state_source(source: &str) -> Result<Value, String> {
    let snippet = ExpressionSnippet::parse(source)?;
    let expression = snippet
        .expression()
        .ok_or_else(|| "state expression is empty".to_string())?;
    Ok(state_value(&expression, snippet.text()))
}

fn parse_number(raw: &str) -> Option<Value> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    if cleaned.ends_with('n') {
        // BigInt has no JSON representation.
        return None;
    }
    let lower = cleaned.to_ascii_lowercase();
    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    let value = match radix {
        Some(radix) => i64::from_str_radix(&lower[2..], radix).ok()? as f64,
        None => lower.parse::<f64>().ok()?,
    };
    number_value(value)
}

fn number_value(value: f64) -> Option<Value> {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        Some(Value::Number(Number::from(value as i64)))
    } else {
        Number::from_f64(value).map(Value::Number)
    }
}

fn negate(number: &Number) -> Option<Value> {
    if let Some(i) = number.as_i64() {
        if i == 0 {
            // JSON has no negative zero; keep it an integer.
            return Some(Value::Number(Number::from(0)));
        }
        return Some(Value::Number(Number::from(-i)));
    }
    number.as_f64().and_then(|f| number_value(-f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(source: &str) -> Value {
        parse_state_source(source).unwrap()
    }

    #[test]
    fn evaluates_plain_literals() {
        assert_eq!(eval("0"), json!(0));
        assert_eq!(eval("{ a: 1 }"), json!({"a": 1}));
        assert_eq!(
            eval("[1, 'two', true, null, undefined]"),
            json!([1, "two", true, null, null])
        );
        assert_eq!(
            eval("{ list: [], loading: false, 'x-y': \"z\" }"),
            json!({"list": [], "loading": false, "x-y": "z"})
        );
        assert_eq!(eval("`tpl`"), json!("tpl"));
    }

    #[test]
    fn integral_numbers_stay_integers() {
        assert_eq!(eval("1.0"), json!(1));
        assert_eq!(eval("-3"), json!(-3));
        assert_eq!(eval("0x1F"), json!(31));
        assert_eq!(eval("1_000"), json!(1000));
        assert_eq!(eval("2.5"), json!(2.5));
        assert_eq!(eval("1e3"), json!(1000));
    }

    #[test]
    fn falls_back_to_source_text() {
        assert_eq!(eval("{ at: Date.now() }"), json!("{ at: Date.now() }"));
        assert_eq!(eval("initialState"), json!("initialState"));
        assert_eq!(eval("10n"), json!("10n"));
    }

    #[test]
    fn rejects_non_expressions() {
        assert!(parse_state_source("{ a: ").is_err());
    }
}
