//! Typed-literal casting for string parameters.
//!
//! A string parameter may carry an inline tag that selects its type:
//!
//! ```text
//! i+ 3                       -> Int(3)
//! d+ 1.30                    -> Decimal(1.30)
//! dt+ 17/11/2018 17:49:33    -> DateTime
//! [,i+] 3,4,5                -> List([3, 4, 5])
//! [|f+] 1.4|1.5              -> List([1.4, 1.5])
//! true                       -> Bool(true)
//! hello                      -> Str("hello")
//! ```
//!
//! A tagged literal that does not parse is a [`CastError`]; it never decays to
//! a default or to the raw string.

use crate::error::CastError;
use crate::value::Value;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use std::str::FromStr;

const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const DATE_FORMAT: &str = "%d/%m/%Y";

/// The scalar kinds a tag can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// `b+`
    Bool,
    /// `d+`
    Decimal,
    /// `f+`
    Float,
    /// `dt+`, day/month/year hour:minute:second
    DateTime,
    /// `date+`, day/month/year
    Date,
    /// `i+`
    Int,
    /// `s+`
    Str,
}

impl CastKind {
    /// Every kind, in tag-matching order.
    pub const ALL: [CastKind; 7] = [
        Self::Bool,
        Self::Decimal,
        Self::Float,
        Self::DateTime,
        Self::Date,
        Self::Int,
        Self::Str,
    ];

    /// The canonical short tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Bool => "b+",
            Self::Decimal => "d+",
            Self::Float => "f+",
            Self::DateTime => "dt+",
            Self::Date => "date+",
            Self::Int => "i+",
            Self::Str => "s+",
        }
    }

    /// Long-form spellings accepted in place of [`tag`](Self::tag).
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Bool => &["bool+"],
            Self::Decimal => &["decimal+", "dec+"],
            Self::Float => &["float+"],
            Self::DateTime => &["datetime+"],
            Self::Date => &[],
            Self::Int => &["int+"],
            Self::Str => &["str+"],
        }
    }

    /// Look up a kind by short tag or alias.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.tag() == tag || k.aliases().contains(&tag))
    }

    /// Parse `literal` as this kind.
    pub fn apply(self, literal: &str) -> Result<Value, CastError> {
        let fail = |reason: &dyn ToString| CastError::new(self.tag(), literal, reason.to_string());
        let trimmed = literal.trim();
        match self {
            Self::Bool => parse_bool(trimmed)
                .map(Value::Bool)
                .ok_or_else(|| fail(&"expected true or false")),
            Self::Decimal => BigDecimal::from_str(trimmed)
                .map(Value::Decimal)
                .map_err(|e| fail(&e)),
            Self::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| fail(&e)),
            Self::DateTime => NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
                .map(Value::DateTime)
                .map_err(|e| fail(&e)),
            Self::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| fail(&e)),
            Self::Int => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| fail(&e)),
            Self::Str => Ok(Value::Str(literal.to_string())),
        }
    }
}

fn parse_bool(literal: &str) -> Option<bool> {
    match literal {
        "true" | "True" => Some(true),
        "false" | "False" => Some(false),
        _ => None,
    }
}

/// Cast a raw parameter string into a typed value.
///
/// Untagged strings pass through unchanged, except the bare boolean literals
/// `true`, `True`, `false` and `False`.
pub fn cast(raw: &str) -> Result<Value, CastError> {
    if let Some((sep, kind, items)) = split_list_prefix(raw) {
        if items.trim().is_empty() {
            return Ok(Value::List(Vec::new()));
        }
        return items
            .split(sep)
            .map(|item| kind.apply(item.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List);
    }
    cast_scalar(raw)
}

fn cast_scalar(raw: &str) -> Result<Value, CastError> {
    match raw {
        "true" | "True" => return Ok(Value::Bool(true)),
        "false" | "False" => return Ok(Value::Bool(false)),
        _ => {}
    }
    match raw.split_once(' ') {
        Some((tag, literal)) => match CastKind::from_tag(tag) {
            Some(kind) => kind.apply(literal),
            None => Ok(Value::Str(raw.to_string())),
        },
        None => Ok(Value::Str(raw.to_string())),
    }
}

/// Split `[<sep><tag>] rest` into its parts. `sep` is `,` or `|`.
fn split_list_prefix(raw: &str) -> Option<(char, CastKind, &str)> {
    let rest = raw.trim_start().strip_prefix('[')?;
    let sep = rest.chars().next().filter(|c| matches!(c, ',' | '|'))?;
    let (tag, items) = rest[sep.len_utf8()..].split_once(']')?;
    let kind = CastKind::from_tag(tag.trim())?;
    Some((sep, kind, items))
}
