//! Argument access for native method bodies
//!
//! Native methods receive `&[Value]`. [`ArgList`] adds positional accessors
//! that treat missing arguments as undefined, and [`ArgList::verify`] checks
//! an argument list against a compact signature string:
//!
//! | code | accepts            |
//! |------|--------------------|
//! | `s`  | string             |
//! | `n`  | int or double      |
//! | `i`  | int                |
//! | `d`  | double             |
//! | `b`  | bool               |
//! | `o`  | object             |
//! | `m`  | method             |
//! | `l`  | list               |
//! | `0`  | null               |
//! | `u`  | undefined          |
//! | `*`  | anything           |
//!
//! `|` joins alternatives for one position and `?` marks the start of the
//! optional tail, so `"s|0 ?s s"` is a string-or-null followed by up to two
//! strings. Whitespace is ignored.

use crate::error::{BridgeError, BridgeResult};
use crate::list::ListRef;
use crate::method::MethodRef;
use crate::object::ObjectRef;
use crate::value::{UNDEFINED, Value, ValueType};

#[derive(Debug)]
struct Param {
    codes: Vec<char>,
}

fn code_accepts(code: char, value: &Value) -> bool {
    match code {
        's' => value.is_string(),
        'n' => value.is_number(),
        'i' => value.is_int(),
        'd' => value.is_double(),
        'b' => value.is_bool(),
        'o' => value.is_object(),
        'm' => value.is_method(),
        'l' => value.is_list(),
        '0' => value.is_null(),
        'u' => value.is_undefined(),
        _ => true,
    }
}

fn code_name(code: char) -> &'static str {
    match code {
        's' => ValueType::String.name(),
        'n' => "number",
        'i' => ValueType::Int.name(),
        'd' => ValueType::Double.name(),
        'b' => ValueType::Bool.name(),
        'o' => ValueType::Object.name(),
        'm' => ValueType::Method.name(),
        'l' => ValueType::List.name(),
        '0' => ValueType::Null.name(),
        'u' => ValueType::Undefined.name(),
        _ => "any",
    }
}

/// Parse a signature into (params, required count)
fn parse_signature(method: &str, signature: &str) -> BridgeResult<(Vec<Param>, usize)> {
    let mut params: Vec<Param> = Vec::new();
    let mut required = None;
    let mut alternative = false;

    for c in signature.chars() {
        match c {
            c if c.is_whitespace() => {}
            '?' => {
                required.get_or_insert(params.len());
            }
            '|' => alternative = true,
            's' | 'n' | 'i' | 'd' | 'b' | 'o' | 'm' | 'l' | '0' | 'u' | '*' => {
                match params.last_mut() {
                    Some(last) if alternative => last.codes.push(c),
                    _ => params.push(Param { codes: vec![c] }),
                }
                alternative = false;
            }
            other => {
                return Err(BridgeError::invalid_arguments(
                    method,
                    format!("invalid signature code '{}'", other),
                ));
            }
        }
    }

    let required = required.unwrap_or(params.len());
    Ok((params, required))
}

pub trait ArgList {
    /// Argument at `index`, undefined when absent
    fn arg(&self, index: usize) -> &Value;

    fn count(&self) -> usize;

    fn str_arg(&self, index: usize) -> BridgeResult<&str> {
        self.arg(index).to_str()
    }

    fn int_arg(&self, index: usize) -> BridgeResult<i32> {
        self.arg(index).to_int()
    }

    fn number_arg(&self, index: usize) -> BridgeResult<f64> {
        self.arg(index).to_number()
    }

    fn bool_arg(&self, index: usize) -> bool {
        self.arg(index).is_truthy()
    }

    fn object_arg(&self, index: usize) -> BridgeResult<ObjectRef> {
        self.arg(index).to_object()
    }

    fn method_arg(&self, index: usize) -> BridgeResult<MethodRef> {
        self.arg(index).to_method()
    }

    fn list_arg(&self, index: usize) -> BridgeResult<ListRef> {
        self.arg(index).to_list()
    }

    /// String argument, or `None` when it is null or undefined
    fn opt_str_arg(&self, index: usize) -> BridgeResult<Option<&str>> {
        match self.arg(index) {
            Value::Undefined | Value::Null => Ok(None),
            other => other.to_str().map(Some),
        }
    }

    /// Check the argument list against `signature`
    fn verify(&self, method: &str, signature: &str) -> BridgeResult<()> {
        let (params, required) = parse_signature(method, signature)?;
        let count = self.count();

        if count < required {
            return Err(BridgeError::invalid_arguments(
                method,
                format!("expected at least {} arguments, got {}", required, count),
            ));
        }
        if count > params.len() {
            return Err(BridgeError::invalid_arguments(
                method,
                format!("expected at most {} arguments, got {}", params.len(), count),
            ));
        }

        for (index, param) in params.iter().enumerate().take(count) {
            let value = self.arg(index);
            if !param.codes.iter().any(|&code| code_accepts(code, value)) {
                let expected: Vec<&str> = param.codes.iter().map(|&c| code_name(c)).collect();
                return Err(BridgeError::invalid_arguments(
                    method,
                    format!(
                        "argument {} must be {}, got {}",
                        index + 1,
                        expected.join(" or "),
                        value.type_name()
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl ArgList for [Value] {
    fn arg(&self, index: usize) -> &Value {
        self.get(index).unwrap_or(&UNDEFINED)
    }

    fn count(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_args_are_undefined() {
        let args: &[Value] = &[Value::int(1)];
        assert!(args.arg(5).is_undefined());
        assert_eq!(args.int_arg(0).unwrap(), 1);
        assert!(args.str_arg(0).is_err());
        assert_eq!(args.opt_str_arg(3).unwrap(), None);
    }

    #[test]
    fn test_verify_alternatives_and_optional() {
        let sig = "s|0 ?s s s";
        let ok: &[Value] = &[Value::Null];
        ok.verify("setHTTPProxy", sig).unwrap();

        let full: &[Value] = &[
            Value::string("proxy"),
            Value::string("8080"),
            Value::string("user"),
            Value::string("pass"),
        ];
        full.verify("setHTTPProxy", sig).unwrap();

        let bad: &[Value] = &[Value::int(3)];
        let err = bad.verify("setHTTPProxy", sig).unwrap_err();
        assert_eq!(
            err.to_string(),
            "setHTTPProxy: argument 1 must be string or null, got int"
        );
    }

    #[test]
    fn test_verify_counts() {
        let none: &[Value] = &[];
        let err = none.verify("add", "nn").unwrap_err();
        assert_eq!(err.to_string(), "add: expected at least 2 arguments, got 0");

        let many: &[Value] = &[Value::int(1), Value::int(2), Value::int(3)];
        let err = many.verify("add", "nn").unwrap_err();
        assert_eq!(err.to_string(), "add: expected at most 2 arguments, got 3");
    }

    #[test]
    fn test_verify_compact_form() {
        let args: &[Value] = &[Value::double(1.5), Value::bool(true)];
        args.verify("scale", "n?b").unwrap();
        args.verify("scale", "d*").unwrap();
        assert!(args.verify("scale", "ib").is_err());
    }

    #[test]
    fn test_invalid_signature() {
        let args: &[Value] = &[];
        let err = args.verify("broken", "x").unwrap_err();
        assert_eq!(err.kind(), "InvalidArguments");
    }
}
