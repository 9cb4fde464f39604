//! Expression parsers.
//!
//! Each transport has its own payload format; all of them normalize into a
//! [`ParsedExpression`]:
//!
//! - console line `users/Account/find id='i+ 3'` via [`parse_console`]
//! - query form `users.Account.find?id=i+ 3` via [`parse_query`]
//! - web request path `users/Account/find?id=i%2B%203` via [`parse_url`]
//! - JSON object (or array of objects) via [`parse_json`]
//! - msgpack map (or array of maps) via [`parse_msgpack`]

mod packed;
mod query;

pub use packed::{parse_json, parse_msgpack, Batch};
pub use query::{console_to_query, parse_console, parse_query, parse_url};

use crate::error::ParseError;
use crate::value::{Params, Value};

/// Wire key for the module path.
pub const MODULE_KEY: &str = "_m";
/// Wire key for the class name.
pub const CLASS_KEY: &str = "_c";
/// Wire key for the function name.
pub const FUNCTION_KEY: &str = "_f";
/// Wire key for the parameter mapping.
pub const DATA_KEY: &str = "data";

/// A transport payload normalized into command shape.
///
/// Identifying fields are optional here; [`Action`](crate::Action) is where
/// their presence is enforced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedExpression {
    /// Dot-joined module path, already normalized.
    pub module: Option<String>,
    /// Handler class name.
    pub class: Option<String>,
    /// Function name on the class.
    pub function: Option<String>,
    /// Parameters.
    pub data: Params,
}

impl ParsedExpression {
    /// Build from a decoded `{_m, _c, _f, data}` mapping.
    ///
    /// An absent or null `data` becomes an empty mapping; keys other than the
    /// four wire keys are ignored.
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        let mut root = match value {
            Value::Map(root) => root,
            other => {
                return Err(ParseError::Shape(format!(
                    "expected a command object, got {}",
                    kind_name(&other)
                )));
            }
        };

        let module = take_name(&mut root, MODULE_KEY)?.and_then(|m| normalize_module(&m));
        let class = take_name(&mut root, CLASS_KEY)?;
        let function = take_name(&mut root, FUNCTION_KEY)?;
        let data = match root.shift_remove(DATA_KEY) {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Map(data)) => data,
            Some(other) => {
                return Err(ParseError::Shape(format!(
                    "`data` must be an object, got {}",
                    kind_name(&other)
                )));
            }
        };

        Ok(Self {
            module,
            class,
            function,
            data,
        })
    }

    /// The `module.class.function` target, with `?` for absent parts.
    pub fn target(&self) -> String {
        format!(
            "{}.{}.{}",
            self.module.as_deref().unwrap_or("?"),
            self.class.as_deref().unwrap_or("?"),
            self.function.as_deref().unwrap_or("?")
        )
    }
}

fn take_name(root: &mut Params, key: &str) -> Result<Option<String>, ParseError> {
    match root.shift_remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s)),
        Some(other) => Err(ParseError::Shape(format!(
            "`{key}` must be a string, got {}",
            kind_name(&other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => "number",
        Value::Str(_) => "string",
        Value::Date(_) | Value::DateTime(_) => "date",
        Value::List(_) => "list",
        Value::Map(_) => "object",
    }
}

/// Collapse runs of `.` and strip leading/trailing dots.
///
/// Returns `None` when nothing is left.
pub fn normalize_module(path: &str) -> Option<String> {
    let joined = path
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    (!joined.is_empty()).then_some(joined)
}
