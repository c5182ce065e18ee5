//! Built-in static helpers and value methods.
//!
//! Names follow the .NET-flavoured surface template authors expect
//! (`int.Parse`, `"a,b".Split(",")`, `Math.Max`), matched case-sensitively.

use super::value::{EvalError, EvalResult, Value};

/// Call a static helper such as `int.Parse(...)`.
///
/// Returns `None` when `type_name` is not a known static receiver, so the
/// caller can report the name as an undefined variable instead.
pub fn call_static(type_name: &str, method: &str, args: Vec<Value>) -> Option<EvalResult<Value>> {
    let result = match type_name {
        "int" | "long" | "Int32" | "Int64" => call_int_static(method, args),
        "double" | "float" | "decimal" | "Double" => call_double_static(method, args),
        "bool" | "Boolean" => call_bool_static(method, args),
        "string" | "String" => call_string_static(method, args),
        "Math" => call_math_static(method, args),
        _ => return None,
    };
    Some(result)
}

/// Read a property such as `.Length` from a value.
pub fn member(receiver: &Value, name: &str) -> EvalResult<Value> {
    match (receiver, name) {
        (Value::Str(s), "Length") => Ok(Value::Int(s.chars().count() as i64)),
        (Value::List(items), "Count" | "Length") => Ok(Value::Int(items.len() as i64)),
        _ => Err(EvalError::invalid_op(format!(
            "{} has no property '{}'",
            receiver.type_name(),
            name
        ))),
    }
}

/// Call a method on a value.
pub fn call_method(receiver: &Value, method: &str, args: Vec<Value>) -> EvalResult<Value> {
    if method == "ToString" {
        expect_args(method, &args, 0)?;
        return Ok(Value::Str(receiver.display()));
    }
    match receiver {
        Value::Str(s) => call_str_method(s, method, args),
        Value::List(items) => call_list_method(items, method, args),
        _ => Err(EvalError::invalid_op(format!(
            "{} has no method '{}'",
            receiver.type_name(),
            method
        ))),
    }
}

// ============================================================================
// Static helpers
// ============================================================================

fn call_int_static(method: &str, args: Vec<Value>) -> EvalResult<Value> {
    match method {
        "Parse" => {
            expect_args(method, &args, 1)?;
            parse_int(&args[0]).map(Value::Int)
        }
        _ => Err(EvalError::undefined_method(format!("int.{}", method))),
    }
}

fn call_double_static(method: &str, args: Vec<Value>) -> EvalResult<Value> {
    match method {
        "Parse" => {
            expect_args(method, &args, 1)?;
            match &args[0] {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Float(f) => Ok(Value::Float(*f)),
                Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    EvalError::argument(format!("'{}' is not a valid number", s))
                }),
                other => Err(EvalError::type_mismatch("string", other.type_name())),
            }
        }
        _ => Err(EvalError::undefined_method(format!("double.{}", method))),
    }
}

fn call_bool_static(method: &str, args: Vec<Value>) -> EvalResult<Value> {
    match method {
        "Parse" => {
            expect_args(method, &args, 1)?;
            match &args[0] {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Str(s) if s.trim().eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::Str(s) if s.trim().eq_ignore_ascii_case("false") => {
                    Ok(Value::Bool(false))
                }
                other => Err(EvalError::argument(format!(
                    "'{}' is not a valid boolean",
                    other.display()
                ))),
            }
        }
        _ => Err(EvalError::undefined_method(format!("bool.{}", method))),
    }
}

fn call_string_static(method: &str, args: Vec<Value>) -> EvalResult<Value> {
    match method {
        "IsNullOrEmpty" => {
            expect_args(method, &args, 1)?;
            Ok(Value::Bool(args[0].display().is_empty()))
        }
        "IsNullOrWhiteSpace" => {
            expect_args(method, &args, 1)?;
            Ok(Value::Bool(args[0].display().trim().is_empty()))
        }
        "Concat" => Ok(Value::Str(args.iter().map(Value::display).collect())),
        "Join" => {
            let (sep, rest) = args
                .split_first()
                .ok_or_else(|| EvalError::argument("Join expects a separator"))?;
            let sep = sep.display();
            let parts: Vec<String> = match rest {
                [Value::List(items)] => items.iter().map(Value::display).collect(),
                _ => rest.iter().map(Value::display).collect(),
            };
            Ok(Value::Str(parts.join(&sep)))
        }
        _ => Err(EvalError::undefined_method(format!("string.{}", method))),
    }
}

fn call_math_static(method: &str, args: Vec<Value>) -> EvalResult<Value> {
    match method {
        "Max" | "Min" => {
            expect_args(method, &args, 2)?;
            let ordering = super::ops::compare(&args[0], &args[1])?;
            let take_first = if method == "Max" {
                ordering.is_ge()
            } else {
                ordering.is_le()
            };
            let mut args = args;
            Ok(if take_first {
                args.swap_remove(0)
            } else {
                args.swap_remove(1)
            })
        }
        "Abs" => {
            expect_args(method, &args, 1)?;
            match &args[0] {
                Value::Int(i) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| EvalError::invalid_op("integer overflow")),
                other => Ok(Value::Float(other.as_float()?.abs())),
            }
        }
        "Round" | "Floor" | "Ceiling" => {
            expect_args(method, &args, 1)?;
            let f = args[0].as_float()?;
            let rounded = match method {
                "Round" => f.round(),
                "Floor" => f.floor(),
                _ => f.ceil(),
            };
            Ok(Value::Float(rounded))
        }
        _ => Err(EvalError::undefined_method(format!("Math.{}", method))),
    }
}

fn parse_int(value: &Value) -> EvalResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| EvalError::argument(format!("'{}' is not a valid integer", s))),
        other => Err(EvalError::type_mismatch("string", other.type_name())),
    }
}

// ============================================================================
// Value methods
// ============================================================================

fn call_str_method(s: &str, method: &str, args: Vec<Value>) -> EvalResult<Value> {
    match method {
        "ToUpper" => Ok(Value::Str(s.to_uppercase())),
        "ToLower" => Ok(Value::Str(s.to_lowercase())),
        "Trim" => Ok(Value::Str(s.trim().to_string())),
        "Split" => {
            let sep = string_arg(method, &args, 0)?;
            if sep.is_empty() {
                return Err(EvalError::argument("Split separator cannot be empty"));
            }
            Ok(Value::List(
                s.split(sep.as_str())
                    .map(|part| Value::Str(part.to_string()))
                    .collect(),
            ))
        }
        "Contains" => {
            let needle = string_arg(method, &args, 0)?;
            Ok(Value::Bool(s.contains(needle.as_str())))
        }
        "StartsWith" => {
            let prefix = string_arg(method, &args, 0)?;
            Ok(Value::Bool(s.starts_with(prefix.as_str())))
        }
        "EndsWith" => {
            let suffix = string_arg(method, &args, 0)?;
            Ok(Value::Bool(s.ends_with(suffix.as_str())))
        }
        "Replace" => {
            let from = string_arg(method, &args, 0)?;
            let to = string_arg(method, &args, 1)?;
            if from.is_empty() {
                return Err(EvalError::argument("Replace pattern cannot be empty"));
            }
            Ok(Value::Str(s.replace(from.as_str(), &to)))
        }
        "IndexOf" => {
            let needle = string_arg(method, &args, 0)?;
            let index = s
                .find(needle.as_str())
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Ok(Value::Int(index))
        }
        "Substring" => {
            let chars: Vec<char> = s.chars().collect();
            let start = int_arg(method, &args, 0)?;
            let start = usize::try_from(start)
                .ok()
                .filter(|&i| i <= chars.len())
                .ok_or_else(|| EvalError::index_oob(start, chars.len()))?;
            let end = match args.get(1) {
                Some(len) => {
                    let len = len.as_int()?;
                    usize::try_from(len)
                        .ok()
                        .map(|l| start + l)
                        .filter(|&e| e <= chars.len())
                        .ok_or_else(|| EvalError::index_oob(len, chars.len() - start))?
                }
                None => chars.len(),
            };
            Ok(Value::Str(chars[start..end].iter().collect()))
        }
        _ => Err(EvalError::invalid_op(format!(
            "string has no method '{}'",
            method
        ))),
    }
}

fn call_list_method(items: &[Value], method: &str, args: Vec<Value>) -> EvalResult<Value> {
    match method {
        "Contains" => {
            expect_args(method, &args, 1)?;
            Ok(Value::Bool(
                items.iter().any(|item| super::ops::equals(item, &args[0])),
            ))
        }
        "Reverse" => Ok(Value::List(items.iter().rev().cloned().collect())),
        _ => Err(EvalError::invalid_op(format!(
            "list has no method '{}'",
            method
        ))),
    }
}

fn expect_args(method: &str, args: &[Value], count: usize) -> EvalResult<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(EvalError::argument(format!(
            "{} expects {} argument(s), got {}",
            method,
            count,
            args.len()
        )))
    }
}

fn string_arg(method: &str, args: &[Value], index: usize) -> EvalResult<String> {
    args.get(index)
        .map(Value::display)
        .ok_or_else(|| EvalError::argument(format!("{} expects argument {}", method, index + 1)))
}

fn int_arg(method: &str, args: &[Value], index: usize) -> EvalResult<i64> {
    args.get(index)
        .ok_or_else(|| EvalError::argument(format!("{} expects argument {}", method, index + 1)))?
        .as_int()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_parse() {
        let parsed = call_static("int", "Parse", vec![Value::from(" 42 ")]).unwrap();
        assert_eq!(parsed.unwrap(), Value::Int(42));
        let bad = call_static("int", "Parse", vec![Value::from("4x")]).unwrap();
        assert!(bad.is_err());
        assert!(call_static("nope", "Parse", vec![]).is_none());
    }

    #[test]
    fn test_split_and_join() {
        let parts = call_method(&Value::from("1,2,3"), "Split", vec![Value::from(",")]).unwrap();
        assert_eq!(parts, Value::from(vec!["1", "2", "3"]));
        let joined = call_static("string", "Join", vec![Value::from("-"), parts])
            .unwrap()
            .unwrap();
        assert_eq!(joined, Value::from("1-2-3"));
    }

    #[test]
    fn test_substring_bounds() {
        let s = Value::from("héllo");
        assert_eq!(
            call_method(&s, "Substring", vec![Value::Int(1), Value::Int(3)]).unwrap(),
            Value::from("éll")
        );
        assert_eq!(
            call_method(&s, "Substring", vec![Value::Int(2)]).unwrap(),
            Value::from("llo")
        );
        assert!(call_method(&s, "Substring", vec![Value::Int(9)]).is_err());
        assert!(call_method(&s, "Substring", vec![Value::Int(4), Value::Int(5)]).is_err());
    }

    #[test]
    fn test_members_and_math() {
        assert_eq!(member(&Value::from("abc"), "Length").unwrap(), Value::Int(3));
        assert!(member(&Value::Int(1), "Length").is_err());
        let max = call_static("Math", "Max", vec![Value::Int(3), Value::Float(4.5)])
            .unwrap()
            .unwrap();
        assert_eq!(max, Value::Float(4.5));
    }

    #[test]
    fn test_to_string_on_any_value() {
        assert_eq!(
            call_method(&Value::Bool(true), "ToString", vec![]).unwrap(),
            Value::from("True")
        );
    }
}
