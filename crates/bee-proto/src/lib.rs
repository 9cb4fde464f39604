//! # bee-proto
//!
//! The command grammar shared by every bee-ng transport.
//!
//! ## Features
//!
//! - Typed literal casting (`i+ 3`, `dt+ 17/11/2018 17:49:33`, `[,i+] 1,2,3`)
//! - Expression parsers for console lines, query strings, web paths, JSON and msgpack
//! - Validated [`Action`]s with control-flag extraction
//! - Regex-based [`PermissionRule`]s
//! - YAML [`ShortcutTable`] aliases
//!
//! ## Quick Start
//!
//! ```rust
//! use bee_proto::{parse_console, Action, Value};
//!
//! let expr = parse_console("users/Account/find id='i+ 3'").unwrap();
//! let action = Action::try_from(expr).unwrap();
//! assert_eq!(action.target(), "users.Account.find");
//! assert_eq!(action.data()["id"], Value::Int(3));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod action;
pub mod cast;
pub mod error;
pub mod expr;
pub mod rule;
pub mod shortcut;
pub mod value;

pub use self::action::Action;
pub use self::cast::{cast, CastKind};
pub use self::error::{
    CastError, MissingFieldsError, ParseError, ProtocolError, Result, RuleError, ShortcutError,
};
pub use self::expr::{
    console_to_query, parse_console, parse_json, parse_msgpack, parse_query, parse_url, Batch,
    ParsedExpression,
};
pub use self::rule::{first_match, PermissionRule, RuleSpec};
pub use self::shortcut::{Shortcut, ShortcutTable};
pub use self::value::{Params, Value};
