//! Command-line contract arguments to `ScVal`.
//!
//! | input                         | value              |
//! |-------------------------------|--------------------|
//! | `true` / `false`              | `Bool`             |
//! | `void` / `()`                 | `Void`             |
//! | `u32:7`, `i64:-1`, `u128:5`…  | typed integer      |
//! | `1000`                        | `I128`             |
//! | `G…` / `C…`                   | `Address`          |
//! | `0xdeadbeef`                  | `Bytes`            |
//! | `:transfer`                   | `Symbol`           |
//! | `"text"`                      | `String`           |
//! | `[…]` / `{…}` (JSON)          | `Vec` / `Map`      |
//! | anything else                 | `Symbol`           |

use serde_json::Value;
use soroban_sdk::xdr::{
    Int128Parts, ScMap, ScMapEntry, ScString, ScSymbol, ScVal, ScVec, StringM, UInt128Parts, VecM,
};
use thiserror::Error;

use crate::stellar_tx;

const STRKEY_LEN: usize = 56;
const SYMBOL_MAX_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("invalid JSON at {location}: {details}")]
    InvalidJson { location: String, details: String },

    #[error("invalid integer `{input}`: {details}")]
    InvalidInteger { input: String, details: String },

    #[error("invalid symbol at {location}: {details}")]
    InvalidSymbol { location: String, details: String },

    #[error("invalid hex bytes at {location}: {details}")]
    InvalidHex { location: String, details: String },

    #[error("invalid address at {location}: {input}")]
    InvalidAddress { location: String, input: String },

    #[error("value at {location} exceeds the XDR size limit")]
    TooLarge { location: String },
}

/// Parse every argument in order.
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<Vec<ScVal>, ArgError> {
    args.iter().map(|a| parse_arg(a.as_ref())).collect()
}

/// Parse one command-line argument.
pub fn parse_arg(arg: &str) -> Result<ScVal, ArgError> {
    let arg = arg.trim();

    if arg.starts_with('{') || arg.starts_with('[') || arg.starts_with('"') {
        let value: Value = serde_json::from_str(arg).map_err(|e| ArgError::InvalidJson {
            location: "$".to_string(),
            details: e.to_string(),
        })?;
        return parse_json(&value, "$");
    }

    match arg {
        "true" => return Ok(ScVal::Bool(true)),
        "false" => return Ok(ScVal::Bool(false)),
        "void" | "()" => return Ok(ScVal::Void),
        _ => {}
    }

    if let Some((kind, digits)) = arg.split_once(':') {
        if let Some(value) = typed_integer(kind, digits, arg)? {
            return Ok(value);
        }
    }

    if is_integer_literal(arg) {
        return parse_i128(arg, arg);
    }

    parse_text(arg, "$", false)
}

fn is_integer_literal(arg: &str) -> bool {
    let digits = arg.strip_prefix('-').unwrap_or(arg);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn typed_integer(kind: &str, digits: &str, input: &str) -> Result<Option<ScVal>, ArgError> {
    let invalid = |e: std::num::ParseIntError| ArgError::InvalidInteger {
        input: input.to_string(),
        details: e.to_string(),
    };
    let value = match kind {
        "u32" => ScVal::U32(digits.parse().map_err(invalid)?),
        "i32" => ScVal::I32(digits.parse().map_err(invalid)?),
        "u64" => ScVal::U64(digits.parse().map_err(invalid)?),
        "i64" => ScVal::I64(digits.parse().map_err(invalid)?),
        "u128" => u128_val(digits.parse().map_err(invalid)?),
        "i128" => parse_i128(digits, input)?,
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn parse_i128(digits: &str, input: &str) -> Result<ScVal, ArgError> {
    let value: i128 = digits.parse().map_err(|e: std::num::ParseIntError| ArgError::InvalidInteger {
        input: input.to_string(),
        details: e.to_string(),
    })?;
    Ok(i128_val(value))
}

pub fn i128_val(value: i128) -> ScVal {
    ScVal::I128(Int128Parts {
        hi: (value >> 64) as i64,
        lo: value as u64,
    })
}

pub fn u128_val(value: u128) -> ScVal {
    ScVal::U128(UInt128Parts {
        hi: (value >> 64) as u64,
        lo: value as u64,
    })
}

/// Addresses, `0x` bytes and `:symbol` markers; anything else becomes a
/// string inside JSON (`quoted`) or a symbol on the command line.
fn parse_text(text: &str, location: &str, quoted: bool) -> Result<ScVal, ArgError> {
    if text.len() == STRKEY_LEN && (text.starts_with('G') || text.starts_with('C')) {
        return stellar_tx::sc_address(text)
            .map(ScVal::Address)
            .map_err(|_| ArgError::InvalidAddress {
                location: location.to_string(),
                input: text.to_string(),
            });
    }

    if let Some(name) = text.strip_prefix(':') {
        return symbol(name, location).map(ScVal::Symbol);
    }

    if let Some(hex_digits) = text.strip_prefix("0x") {
        let bytes = hex::decode(hex_digits).map_err(|e| ArgError::InvalidHex {
            location: location.to_string(),
            details: e.to_string(),
        })?;
        let bytes = bytes.try_into().map_err(|_| ArgError::TooLarge {
            location: location.to_string(),
        })?;
        return Ok(ScVal::Bytes(bytes));
    }

    if quoted {
        let string: StringM = text.as_bytes().to_vec().try_into().map_err(|_| ArgError::TooLarge {
            location: location.to_string(),
        })?;
        return Ok(ScVal::String(ScString(string)));
    }
    symbol(text, location).map(ScVal::Symbol)
}

fn symbol(name: &str, location: &str) -> Result<ScSymbol, ArgError> {
    let invalid = || ArgError::InvalidSymbol {
        location: location.to_string(),
        details: format!("`{name}` is not a valid symbol (at most 32 characters of [a-zA-Z0-9_])"),
    };
    if name.len() > SYMBOL_MAX_LEN || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid());
    }
    name.try_into().map_err(|_| invalid())
}

fn parse_json(value: &Value, path: &str) -> Result<ScVal, ArgError> {
    match value {
        Value::Null => Ok(ScVal::Void),
        Value::Bool(b) => Ok(ScVal::Bool(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => Ok(i128_val(i128::from(i))),
            (None, Some(u)) => Ok(i128_val(i128::from(u))),
            _ => Err(ArgError::InvalidInteger {
                input: n.to_string(),
                details: format!("non-integer number at {path}"),
            }),
        },
        Value::String(s) => parse_text(s, path, true),
        Value::Array(items) => {
            let values = items
                .iter()
                .enumerate()
                .map(|(i, v)| parse_json(v, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?;
            let values: VecM<ScVal> = values.try_into().map_err(|_| ArgError::TooLarge {
                location: path.to_string(),
            })?;
            Ok(ScVal::Vec(Some(ScVec(values))))
        }
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            // Soroban maps must be sorted by key.
            keys.sort();
            let mut entries = Vec::with_capacity(keys.len());
            for key in keys {
                let location = format!("{path}.{key}");
                entries.push(ScMapEntry {
                    key: ScVal::Symbol(symbol(key, &location)?),
                    val: parse_json(&fields[key.as_str()], &location)?,
                });
            }
            let entries: VecM<ScMapEntry> = entries.try_into().map_err(|_| ArgError::TooLarge {
                location: path.to_string(),
            })?;
            Ok(ScVal::Map(Some(ScMap(entries))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";

    #[test]
    fn test_shorthands() {
        assert_eq!(parse_arg("true").unwrap(), ScVal::Bool(true));
        assert_eq!(parse_arg("false").unwrap(), ScVal::Bool(false));
        assert_eq!(parse_arg("void").unwrap(), ScVal::Void);
    }

    #[test]
    fn test_plain_integers_are_i128() {
        assert_eq!(parse_arg("1000").unwrap(), i128_val(1000));
        assert_eq!(
            parse_arg("-1").unwrap(),
            ScVal::I128(Int128Parts { hi: -1, lo: u64::MAX })
        );
        assert_eq!(
            parse_arg("18446744073709551616").unwrap(),
            ScVal::I128(Int128Parts { hi: 1, lo: 0 })
        );
    }

    #[test]
    fn test_typed_integers() {
        assert_eq!(parse_arg("u32:7").unwrap(), ScVal::U32(7));
        assert_eq!(parse_arg("i64:-9").unwrap(), ScVal::I64(-9));
        assert_eq!(parse_arg("u64:9").unwrap(), ScVal::U64(9));
        assert_eq!(parse_arg("u128:5").unwrap(), u128_val(5));
        assert_eq!(parse_arg("i128:-5").unwrap(), i128_val(-5));
        assert!(matches!(
            parse_arg("u32:-1"),
            Err(ArgError::InvalidInteger { .. })
        ));
    }

    #[test]
    fn test_addresses_bytes_symbols() {
        assert!(matches!(parse_arg(CONTRACT).unwrap(), ScVal::Address(_)));
        assert!(matches!(parse_arg("0xdeadbeef").unwrap(), ScVal::Bytes(b) if b.0.len() == 4));
        assert_eq!(
            parse_arg(":transfer").unwrap(),
            ScVal::Symbol("transfer".try_into().unwrap())
        );
        assert_eq!(
            parse_arg("hello").unwrap(),
            ScVal::Symbol("hello".try_into().unwrap())
        );
        assert!(matches!(parse_arg("0xzz"), Err(ArgError::InvalidHex { .. })));
    }

    #[test]
    fn test_quoted_string() {
        let value = parse_arg("\"Main Street 12\"").unwrap();
        match value {
            ScVal::String(s) => assert_eq!(s.0.to_vec(), b"Main Street 12".to_vec()),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn test_json_vec_and_sorted_map() {
        let value = parse_arg(r#"{"b": 2, "a": [true, ":x"]}"#).unwrap();
        let ScVal::Map(Some(map)) = value else {
            panic!("expected map");
        };
        let keys: Vec<_> = map.0.iter().map(|e| e.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                ScVal::Symbol("a".try_into().unwrap()),
                ScVal::Symbol("b".try_into().unwrap())
            ]
        );
        assert!(matches!(&map.0[0].val, ScVal::Vec(Some(v)) if v.0.len() == 2));
        assert_eq!(map.0[1].val, i128_val(2));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(parse_arg("[1,"), Err(ArgError::InvalidJson { .. })));
        assert!(matches!(
            parse_arg(&"x".repeat(40)),
            Err(ArgError::InvalidSymbol { .. })
        ));
        assert!(matches!(
            parse_arg(r#"{"not valid key": 1}"#),
            Err(ArgError::InvalidSymbol { .. })
        ));
    }

    #[test]
    fn test_parse_args_preserves_order() {
        let values = parse_args(&["u32:1", "true", "5"]).unwrap();
        assert_eq!(values, vec![ScVal::U32(1), ScVal::Bool(true), i128_val(5)]);
    }
}
