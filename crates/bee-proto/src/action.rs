//! Validated, ready-to-dispatch commands.

use crate::error::MissingFieldsError;
use crate::expr::{normalize_module, ParsedExpression, CLASS_KEY, FUNCTION_KEY, MODULE_KEY};
use crate::value::Params;
use std::fmt;

/// Data key requesting a class-level call without a per-connection instance.
pub const STATIC_FLAG: &str = "_st";
/// Data key requesting inline (blocking) execution.
pub const SYNC_FLAG: &str = "_sc";
/// Data key requesting a module reload before the call.
pub const RELOAD_FLAG: &str = "_reload";
/// Data keys requesting documentation instead of execution.
pub const HELP_FLAGS: [&str; 2] = ["_help", "_h"];

/// A command with its target resolved and control flags extracted.
///
/// Construction is the only validation point: an `Action` that exists is
/// always ready.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    module: String,
    class: String,
    function: String,
    data: Params,
    is_static: bool,
    is_sync: bool,
    force_reload: bool,
}

impl Action {
    /// Module path, normalized.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Function name.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Parameters, without control flags.
    pub fn data(&self) -> &Params {
        &self.data
    }

    /// Consume the action, returning its parameters.
    pub fn into_data(self) -> Params {
        self.data
    }

    /// Always true; kept for callers that report readiness.
    pub fn ready(&self) -> bool {
        true
    }

    /// Call at class level, no per-connection instance.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Run inline instead of as a decoupled task.
    pub fn is_sync(&self) -> bool {
        self.is_sync
    }

    /// Re-resolve the module before calling.
    pub fn force_reload(&self) -> bool {
        self.force_reload
    }

    /// Whether the caller asked for documentation.
    pub fn wants_help(&self) -> bool {
        HELP_FLAGS.iter().any(|k| self.data.contains_key(*k))
    }

    /// `module.Class.function`
    pub fn target(&self) -> String {
        format!("{}.{}.{}", self.module, self.class, self.function)
    }
}

impl TryFrom<ParsedExpression> for Action {
    type Error = MissingFieldsError;

    fn try_from(expr: ParsedExpression) -> Result<Self, Self::Error> {
        let module = expr.module.as_deref().and_then(normalize_module);
        let (module, class, function) = match (module, expr.class, expr.function) {
            (Some(m), Some(c), Some(f)) => (m, c, f),
            (m, c, f) => {
                let missing = [
                    (MODULE_KEY, m.is_none()),
                    (CLASS_KEY, c.is_none()),
                    (FUNCTION_KEY, f.is_none()),
                ]
                .into_iter()
                    .filter_map(|(key, absent)| absent.then_some(key))
                    .collect();
                return Err(MissingFieldsError { missing });
            }
        };

        let mut data = expr.data;
        let is_static = data.shift_remove(STATIC_FLAG).is_some();
        let is_sync = data.shift_remove(SYNC_FLAG).is_some();
        let force_reload = data.shift_remove(RELOAD_FLAG).is_some();

        Ok(Self {
            module,
            class,
            function,
            data,
            is_static,
            is_sync,
            force_reload,
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mod: {}, Cls: {}, Func: {}, Static: {}, Sync: {}, Params: {}",
            self.module,
            self.class,
            self.function,
            self.is_static,
            self.is_sync,
            crate::value::Value::Map(self.data.clone())
        )
    }
}
