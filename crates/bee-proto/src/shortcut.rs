//! Shortcut aliases.
//!
//! A shortcut file maps a short name to a canned command template:
//!
//! ```yaml
//! whoami:
//!   _m: system
//!   _c: Diag
//!   _f: whoami
//! top_orders:
//!   _m: shop.orders
//!   _c: Report
//!   _f: top
//!   data:
//!     limit: 10
//! ```
//!
//! A command with no module whose function names an alias is replaced by the
//! template; the caller's parameters are layered on top of the template's.

use crate::error::ShortcutError;
use crate::expr::ParsedExpression;
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// One alias entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Shortcut {
    /// A command template.
    Template(ParsedExpression),
    /// A scalar entry; never applied.
    Literal(String),
}

/// Alias table, immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct ShortcutTable {
    entries: IndexMap<String, Shortcut>,
    source: Option<PathBuf>,
}

impl ShortcutTable {
    /// A table with no aliases.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShortcutError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut table = Self::from_yaml_str(&text)?;
        table.source = Some(path.to_path_buf());
        Ok(table)
    }

    /// Parse YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ShortcutError> {
        let raw: Option<IndexMap<String, serde_yaml::Value>> = serde_yaml::from_str(text)?;
        let mut entries = IndexMap::new();
        for (alias, entry) in raw.unwrap_or_default() {
            let shortcut = match entry {
                serde_yaml::Value::Mapping(_) => {
                    let value: Value =
                        serde_yaml::from_value(entry).map_err(|e| ShortcutError::Template {
                            alias: alias.clone(),
                            reason: e.to_string(),
                        })?;
                    let template = ParsedExpression::from_value(value).map_err(|e| {
                        ShortcutError::Template {
                            alias: alias.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    Shortcut::Template(template)
                }
                other => Shortcut::Literal(
                    serde_yaml::to_string(&other)
                        .map(|s| s.trim_end().to_string())
                        .unwrap_or_default(),
                ),
            };
            entries.insert(alias, shortcut);
        }
        Ok(Self {
            entries,
            source: None,
        })
    }

    /// Read the same file again. The current table is left untouched.
    pub fn reload(&self) -> Result<Self, ShortcutError> {
        match &self.source {
            Some(path) => Self::load(path),
            None => Ok(self.clone()),
        }
    }

    /// File this table was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no aliases.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an alias.
    pub fn resolve(&self, alias: &str) -> Option<&Shortcut> {
        self.entries.get(alias)
    }

    /// Substitute a template when `expr` has no module and its function is
    /// a template alias. Otherwise `expr` is returned unchanged.
    ///
    /// Caller-supplied class and parameters override the template's.
    pub fn apply(&self, expr: ParsedExpression) -> ParsedExpression {
        if expr.module.is_some() {
            return expr;
        }
        let template = match expr.function.as_deref().and_then(|f| self.resolve(f)) {
            Some(Shortcut::Template(template)) => template,
            _ => return expr,
        };

        let mut merged = template.clone();
        if expr.class.is_some() {
            merged.class = expr.class;
        }
        for (key, value) in expr.data {
            merged.data.insert(key, value);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_query;

    const TABLE: &str = r#"
top:
  _m: shop.orders
  _c: Report
  _f: top
  data:
    limit: 10
    region: eu
motto: "just a string"
"#;

    #[test]
    fn test_template_merge_caller_wins() {
        let table = ShortcutTable::from_yaml_str(TABLE).unwrap();
        let merged = table.apply(parse_query("top?limit=i+ 3").unwrap());
        assert_eq!(merged.target(), "shop.orders.Report.top");
        assert_eq!(merged.data["limit"], Value::Int(3));
        assert_eq!(merged.data["region"], Value::from("eu"));
    }

    #[test]
    fn test_explicit_module_is_not_aliased() {
        let table = ShortcutTable::from_yaml_str(TABLE).unwrap();
        let expr = parse_query("other.Cls.top").unwrap();
        assert_eq!(table.apply(expr.clone()), expr);
    }

    #[test]
    fn test_unknown_and_literal_aliases_pass_through() {
        let table = ShortcutTable::from_yaml_str(TABLE).unwrap();
        let expr = parse_query("nothing?x=1").unwrap();
        assert_eq!(table.apply(expr.clone()), expr);
        let expr = parse_query("motto").unwrap();
        assert_eq!(table.apply(expr.clone()), expr);
        assert_eq!(
            table.resolve("motto"),
            Some(&Shortcut::Literal("just a string".into()))
        );
    }

    #[test]
    fn test_empty_document() {
        assert!(ShortcutTable::from_yaml_str("").unwrap().is_empty());
    }

    #[test]
    fn test_load_and_reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shortcuts.yaml");
        std::fs::write(&path, TABLE).unwrap();
        let table = ShortcutTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);

        std::fs::write(&path, "ping:\n  _m: system\n  _c: Info\n  _f: ping\n").unwrap();
        let reloaded = table.reload().unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_bad_template_is_rejected() {
        let err = ShortcutTable::from_yaml_str("bad:\n  _m: [1, 2]\n").unwrap_err();
        assert!(matches!(err, ShortcutError::Template { ref alias, .. } if alias == "bad"));
    }
}
