//! Builtin functions and methods.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::Write as _;

use chrono::NaiveDate;
use quire_renderer::escape_html;

use crate::ScriptError;
use crate::value::{Map, Value};

/// Maximum number of items `range()` may produce.
const MAX_RANGE: i64 = 1_000_000;

/// Call a builtin function. Returns `None` for unknown names.
pub(crate) fn call<'a>(
    name: &str,
    args: Vec<Value<'a>>,
    kwargs: &Map<'a>,
    out: &mut String,
) -> Option<Result<Value<'a>, ScriptError>> {
    let result = match name {
        "print" => print(args, kwargs, out),
        "len" => no_kwargs(name, kwargs).and_then(|()| len(&one(name, args)?)),
        "str" => no_kwargs(name, kwargs).and_then(|()| {
            let text = optional(name, args)?.map(|v| v.to_string()).unwrap_or_default();
            Ok(Value::Str(text))
        }),
        "int" => no_kwargs(name, kwargs).and_then(|()| to_int(&one(name, args)?).map(Value::Int)),
        "float" => no_kwargs(name, kwargs).and_then(|()| to_float(&one(name, args)?)),
        "bool" => no_kwargs(name, kwargs).and_then(|()| {
            Ok(Value::Bool(
                optional(name, args)?.is_some_and(|v| v.is_truthy()),
            ))
        }),
        "hx" | "htmlspecialchars" => no_kwargs(name, kwargs)
            .and_then(|()| Ok(Value::Str(escape_html(&one(name, args)?.to_string())))),
        "range" => no_kwargs(name, kwargs).and_then(|()| range(&args)),
        "sorted" => sorted(args, kwargs),
        "reversed" => no_kwargs(name, kwargs).and_then(|()| {
            let mut items = one(name, args)?.iter_items()?;
            items.reverse();
            Ok(Value::List(items))
        }),
        "min" => no_kwargs(name, kwargs).and_then(|()| extreme(name, args, Ordering::Less)),
        "max" => no_kwargs(name, kwargs).and_then(|()| extreme(name, args, Ordering::Greater)),
        "strftime" => no_kwargs(name, kwargs).and_then(|()| strftime(&args)),
        _ => return None,
    };
    Some(result)
}

/// Call a method on a value.
pub(crate) fn call_method<'a>(
    receiver: &Value<'a>,
    method: &str,
    args: Vec<Value<'a>>,
) -> Result<Value<'a>, ScriptError> {
    match receiver {
        Value::Str(s) => string_method(s, method, args),
        Value::Map(_) | Value::Object(_) => mapping_method(receiver, method, args),
        Value::List(_) if method == "append" => Err(ScriptError::type_error(
            "append() needs a list stored in a variable",
        )),
        other => Err(no_method(other, method)),
    }
}

fn no_method(value: &Value<'_>, method: &str) -> ScriptError {
    ScriptError::type_error(format!(
        "'{}' object has no method '{method}'",
        value.type_name()
    ))
}

fn no_kwargs(name: &str, kwargs: &Map<'_>) -> Result<(), ScriptError> {
    match kwargs.keys().next() {
        Some(key) => Err(ScriptError::type_error(format!(
            "{name}() got an unexpected keyword argument '{key}'"
        ))),
        None => Ok(()),
    }
}

fn arity(name: &str, args: &[Value<'_>], min: usize, max: usize) -> Result<(), ScriptError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {min}")
    } else {
        format!("{min} to {max}")
    };
    Err(ScriptError::type_error(format!(
        "{name}() takes {expected} argument(s) ({} given)",
        args.len()
    )))
}

fn one<'a>(name: &str, args: Vec<Value<'a>>) -> Result<Value<'a>, ScriptError> {
    arity(name, &args, 1, 1)?;
    Ok(args.into_iter().next().unwrap_or_default())
}

fn optional<'a>(name: &str, args: Vec<Value<'a>>) -> Result<Option<Value<'a>>, ScriptError> {
    arity(name, &args, 0, 1)?;
    Ok(args.into_iter().next())
}

fn string_arg(name: &str, value: &Value<'_>) -> Result<String, ScriptError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(ScriptError::type_error(format!(
            "{name}() argument must be str, not '{}'",
            other.type_name()
        ))),
    }
}

fn print(args: Vec<Value<'_>>, kwargs: &Map<'_>, out: &mut String) -> Result<Value<'static>, ScriptError> {
    let mut sep = " ".to_owned();
    let mut end = "\n".to_owned();
    for (key, value) in kwargs {
        let text = match value {
            Value::None => continue,
            other => string_arg("print", other)?,
        };
        match key.as_str() {
            "sep" => sep = text,
            "end" => end = text,
            other => {
                return Err(ScriptError::type_error(format!(
                    "print() got an unexpected keyword argument '{other}'"
                )));
            }
        }
    }

    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(&sep);
        }
        let _ = write!(out, "{arg}");
    }
    out.push_str(&end);
    Ok(Value::None)
}

fn len(value: &Value<'_>) -> Result<Value<'static>, ScriptError> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::Object(obj) => obj.keys().len(),
        other => {
            return Err(ScriptError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    i64::try_from(n).map(Value::Int).map_err(|_| ScriptError::Overflow)
}

/// Convert to an integer the way `int()` does.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub(crate) fn to_int(value: &Value<'_>) -> Result<i64, ScriptError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Float(f) => {
            let truncated = f.trunc();
            if truncated.is_finite() && truncated.abs() < i64::MAX as f64 {
                Ok(truncated as i64)
            } else {
                Err(ScriptError::Value(format!("cannot convert {f} to integer")))
            }
        }
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ScriptError::Value(format!("invalid literal for int(): '{s}'"))),
        other => Err(ScriptError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_float(value: &Value<'_>) -> Result<Value<'static>, ScriptError> {
    match value {
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ScriptError::Value(format!("could not convert string to float: '{s}'"))),
        other => Err(ScriptError::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn range(args: &[Value<'_>]) -> Result<Value<'static>, ScriptError> {
    arity("range", args, 1, 3)?;
    let ints = args.iter().map(to_int).collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(ScriptError::type_error("range() expected 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(ScriptError::Value("range() arg 3 must not be zero".to_owned()));
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        if items.len() >= usize::try_from(MAX_RANGE).unwrap_or(usize::MAX) {
            return Err(ScriptError::Value(format!(
                "range() may produce at most {MAX_RANGE} items"
            )));
        }
        items.push(Value::Int(current));
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::List(items))
}

/// Stable sort with a fallible comparison.
fn sort_by_key<'a>(
    items: Vec<Value<'a>>,
    key: impl Fn(&Value<'a>) -> Result<Value<'a>, ScriptError>,
    reverse: bool,
) -> Result<Vec<Value<'a>>, ScriptError> {
    let mut keyed = items
        .into_iter()
        .map(|item| Ok((key(&item)?, item)))
        .collect::<Result<Vec<_>, ScriptError>>()?;

    let error = RefCell::new(None);
    keyed.sort_by(|(a, _), (b, _)| match a.compare(b) {
        Ok(ord) if reverse => ord.reverse(),
        Ok(ord) => ord,
        Err(e) => {
            error.borrow_mut().get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = error.into_inner() {
        return Err(e);
    }
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

fn sorted<'a>(args: Vec<Value<'a>>, kwargs: &Map<'a>) -> Result<Value<'a>, ScriptError> {
    let mut key_field = None;
    let mut reverse = false;
    for (name, value) in kwargs {
        match (name.as_str(), value) {
            ("key", Value::None) => {}
            ("key", Value::Str(field)) => key_field = Some(field.clone()),
            ("key", other) => {
                return Err(ScriptError::type_error(format!(
                    "sorted() key must name a field, not '{}'",
                    other.type_name()
                )));
            }
            ("reverse", value) => reverse = value.is_truthy(),
            (other, _) => {
                return Err(ScriptError::type_error(format!(
                    "sorted() got an unexpected keyword argument '{other}'"
                )));
            }
        }
    }

    let items = one("sorted", args)?.iter_items()?;
    let sorted = match key_field {
        Some(field) => sort_by_key(items, |item| Ok(item.field(&field).unwrap_or_default()), reverse)?,
        None => sort_by_key(items, |item| Ok(item.clone()), reverse)?,
    };
    Ok(Value::List(sorted))
}

fn extreme<'a>(name: &str, args: Vec<Value<'a>>, want: Ordering) -> Result<Value<'a>, ScriptError> {
    let items = if args.len() == 1 {
        one(name, args)?.iter_items()?
    } else {
        args
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| ScriptError::Value(format!("{name}() arg is an empty sequence")))?;
    for item in iter {
        if item.compare(&best)? == want {
            best = item;
        }
    }
    Ok(best)
}

fn strftime(args: &[Value<'_>]) -> Result<Value<'static>, ScriptError> {
    arity("strftime", args, 2, 2)?;
    let date_text = string_arg("strftime", &args[0])?;
    let format = string_arg("strftime", &args[1])?;
    let date = NaiveDate::parse_from_str(date_text.trim(), "%Y-%m-%d")
        .map_err(|e| ScriptError::Value(format!("invalid date '{date_text}': {e}")))?;

    let mut out = String::new();
    write!(out, "{}", date.format(&format))
        .map_err(|_| ScriptError::Value(format!("invalid date format '{format}'")))?;
    Ok(Value::Str(out))
}

fn string_method<'a>(s: &str, method: &str, args: Vec<Value<'a>>) -> Result<Value<'a>, ScriptError> {
    let text = |args: &[Value<'_>], i: usize| string_arg(method, &args[i]);
    match method {
        "upper" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        "lower" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        "strip" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::Str(s.trim().to_owned()))
        }
        "startswith" => {
            arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(text(&args, 0)?.as_str())))
        }
        "endswith" => {
            arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(text(&args, 0)?.as_str())))
        }
        "replace" => {
            arity(method, &args, 2, 2)?;
            Ok(Value::Str(s.replace(text(&args, 0)?.as_str(), &text(&args, 1)?)))
        }
        "split" => {
            arity(method, &args, 0, 1)?;
            let parts: Vec<Value<'a>> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::from).collect(),
                Some(_) => {
                    let sep = text(&args, 0)?;
                    if sep.is_empty() {
                        return Err(ScriptError::Value("empty separator".to_owned()));
                    }
                    s.split(sep.as_str()).map(Value::from).collect()
                }
            };
            Ok(Value::List(parts))
        }
        "join" => {
            let items = one(method, args)?.iter_items()?;
            let joined = items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(s);
            Ok(Value::Str(joined))
        }
        _ => Err(no_method(&Value::Str(s.to_owned()), method)),
    }
}

fn mapping_method<'a>(
    receiver: &Value<'a>,
    method: &str,
    args: Vec<Value<'a>>,
) -> Result<Value<'a>, ScriptError> {
    match method {
        "get" => {
            arity(method, &args, 1, 2)?;
            let mut args = args.into_iter();
            let key = args.next().unwrap_or_default();
            let default = args.next().unwrap_or_default();
            let key = string_arg(method, &key)?;
            Ok(receiver.field(&key).unwrap_or(default))
        }
        "keys" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::List(receiver.iter_items()?))
        }
        "values" | "items" => {
            arity(method, &args, 0, 0)?;
            let mut out = Vec::new();
            for key in receiver.iter_items()? {
                let Value::Str(name) = &key else { continue };
                let value = receiver.field(name).unwrap_or_default();
                out.push(if method == "items" {
                    Value::List(vec![key, value])
                } else {
                    value
                });
            }
            Ok(Value::List(out))
        }
        _ => Err(no_method(receiver, method)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::eval_expression;

    fn eval(src: &str) -> Value<'static> {
        eval_expression(src, &Map::new()).unwrap()
    }

    fn eval_err(src: &str) -> ScriptError {
        eval_expression(src, &Map::new()).unwrap_err()
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval("int('42')"), Value::Int(42));
        assert_eq!(eval("int(3.9)"), Value::Int(3));
        assert_eq!(eval("float('2.5')"), Value::Float(2.5));
        assert_eq!(eval("str(12) + str(None)"), Value::from("12"));
        assert_eq!(eval("bool([])"), Value::Bool(false));
        assert!(matches!(eval_err("int('x')"), ScriptError::Value(_)));
    }

    #[test]
    fn test_len() {
        assert_eq!(eval("len('héllo')"), Value::Int(5));
        assert_eq!(eval("len({'a': 1})"), Value::Int(1));
        assert!(matches!(eval_err("len(3)"), ScriptError::Type(_)));
    }

    #[test]
    fn test_hx_escapes_markup() {
        assert_eq!(
            eval("hx('<a href=\"x\">&</a>')"),
            Value::from("&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;")
        );
        assert_eq!(eval("htmlspecialchars('<')"), Value::from("&lt;"));
    }

    #[test]
    fn test_range() {
        assert_eq!(eval("range(3)"), Value::List(vec![Value::Int(0), Value::Int(1), Value::Int(2)]));
        assert_eq!(eval("range(5, 0, -2)"), Value::List(vec![Value::Int(5), Value::Int(3), Value::Int(1)]));
        assert!(matches!(eval_err("range(1, 2, 0)"), ScriptError::Value(_)));
        assert!(matches!(eval_err("range(10000000)"), ScriptError::Value(_)));
    }

    #[test]
    fn test_sorted_by_field_is_stable() {
        let result = eval(
            "[p['n'] for p in sorted([{'d': 1, 'n': 'a'}, {'d': 2, 'n': 'b'}, {'d': 1, 'n': 'c'}], key='d', reverse=True)]",
        );
        assert_eq!(result, Value::List(vec![Value::from("b"), Value::from("a"), Value::from("c")]));
    }

    #[test]
    fn test_sorted_mixed_types_errors() {
        assert!(matches!(eval_err("sorted([1, 'a'])"), ScriptError::Type(_)));
    }

    #[test]
    fn test_min_max_reversed() {
        assert_eq!(eval("min([3, 1, 2])"), Value::Int(1));
        assert_eq!(eval("max(3, 7, 5)"), Value::Int(7));
        assert_eq!(eval("reversed([1, 2])"), Value::List(vec![Value::Int(2), Value::Int(1)]));
        assert!(matches!(eval_err("max([])"), ScriptError::Value(_)));
    }

    #[test]
    fn test_strftime() {
        assert_eq!(eval("strftime('2024-03-09', '%d %B %Y')"), Value::from("09 March 2024"));
        assert!(matches!(eval_err("strftime('yesterday', '%Y')"), ScriptError::Value(_)));
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(eval("' Hi '.strip().upper()"), Value::from("HI"));
        assert_eq!(eval("'a-b-c'.split('-')"), Value::List(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(eval("', '.join(['x', 1])"), Value::from("x, 1"));
        assert_eq!(eval("'index.html'.endswith('.html')"), Value::Bool(true));
        assert_eq!(eval("'a.b'.replace('.', '/')"), Value::from("a/b"));
    }

    #[test]
    fn test_map_methods() {
        assert_eq!(eval("{'a': 1}.get('b', 'none')"), Value::from("none"));
        assert_eq!(eval("{'a': 1}.get('a')"), Value::Int(1));
        assert_eq!(eval("{'b': 2, 'a': 1}.keys()"), Value::List(vec!["a".into(), "b".into()]));
        assert_eq!(eval("{'a': 1}.values()"), Value::List(vec![Value::Int(1)]));
    }

    #[test]
    fn test_unknown_method_and_kwargs() {
        assert!(matches!(eval_err("'x'.nope()"), ScriptError::Type(_)));
        assert!(matches!(eval_err("len('x', extra=1)"), ScriptError::Type(_)));
        assert!(matches!(eval_err("[1].append(2)"), ScriptError::Type(_)));
    }
}
