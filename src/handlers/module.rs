//! Handler module, class and function descriptors.

use super::Invocation;
use crate::error::HandlerResult;
use bee_proto::{Params, Value};
use futures_util::future::BoxFuture;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

/// Future returned by a handler function.
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// A callable handler function.
pub type HandlerFn = Arc<dyn Fn(Invocation) -> HandlerFuture + Send + Sync>;

/// One named function of a class.
#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub doc: Option<String>,
    call: HandlerFn,
}

impl Function {
    pub fn call(&self, inv: Invocation) -> HandlerFuture {
        (self.call)(inv)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

/// A handler class: functions by name.
#[derive(Debug, Clone, Default)]
pub struct HandlerClass {
    pub name: String,
    functions: BTreeMap<String, Function>,
    exclude_from_help: BTreeSet<String>,
}

impl HandlerClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a function. An empty `doc` registers it undocumented.
    pub fn function<F, Fut>(mut self, name: &str, doc: &str, f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let call: HandlerFn = Arc::new(move |inv| Box::pin(f(inv)));
        self.functions.insert(
            name.to_string(),
            Function {
                name: name.to_string(),
                doc: (!doc.is_empty()).then(|| doc.to_string()),
                call,
            },
        );
        self
    }

    /// Hide a function from discovery and help listings.
    pub fn exclude_from_help(mut self, name: &str) -> Self {
        self.exclude_from_help.insert(name.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Functions visible to discovery: not private, not excluded.
    pub fn public_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions
            .values()
            .filter(|f| !f.name.starts_with('_') && !self.exclude_from_help.contains(&f.name))
    }

    /// Listing for `module.Class.help`.
    ///
    /// `f` restricts the listing to one function name; a truthy `detail`
    /// includes each function's doc.
    pub fn help(&self, module: &str, data: &Params) -> Value {
        let only = data.get("f").and_then(Value::as_str);
        let detail = data.get("detail").is_some_and(is_truthy);
        let entries = self
            .public_functions()
            .filter(|f| f.name != "help")
            .filter(|f| only.is_none_or(|name| name == f.name))
            .map(|f| {
                let target = format!("{}.{}.{}", module, self.name, f.name);
                if detail {
                    let mut entry = Params::new();
                    entry.insert("target".into(), Value::from(target));
                    entry.insert(
                        "doc".into(),
                        f.doc.clone().map_or(Value::Null, Value::from),
                    );
                    Value::Map(entry)
                } else {
                    Value::from(target)
                }
            })
            .collect();
        Value::List(entries)
    }
}

/// A handler module: classes by name.
#[derive(Debug, Clone, Default)]
pub struct HandlerModule {
    pub path: String,
    classes: BTreeMap<String, HandlerClass>,
}

impl HandlerModule {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            classes: BTreeMap::new(),
        }
    }

    pub fn class(mut self, class: HandlerClass) -> Self {
        self.classes.insert(class.name.clone(), class);
        self
    }

    pub fn get(&self, class: &str) -> Option<&HandlerClass> {
        self.classes.get(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &HandlerClass> {
        self.classes.values()
    }
}

/// Loose truthiness for flag-style parameters (`detail=1`, `detail=b+ true`).
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Str(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        Value::List(items) => !items.is_empty(),
        Value::Map(map) => !map.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class() -> HandlerClass {
        HandlerClass::new("Cart")
            .function("add", "Add an item.", |_inv| async { Ok(Value::Null) })
            .function("list", "", |_inv| async { Ok(Value::Null) })
            .function("_audit", "", |_inv| async { Ok(Value::Null) })
            .function("purge", "Drop everything.", |_inv| async { Ok(Value::Null) })
            .exclude_from_help("purge")
    }

    #[test]
    fn test_public_functions_skip_private_and_excluded() {
        let class = class();
        let names: Vec<_> = class.public_functions().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["add", "list"]);
        assert!(class.get("purge").is_some());
        assert!(class.get("_audit").is_some());
    }

    #[test]
    fn test_help_listing() {
        let class = class();
        assert_eq!(
            class.help("shop", &Params::new()),
            Value::List(vec!["shop.Cart.add".into(), "shop.Cart.list".into()])
        );

        let mut data = Params::new();
        data.insert("f".into(), "add".into());
        data.insert("detail".into(), "1".into());
        let Value::List(entries) = class.help("shop", &data) else {
            panic!("expected a list");
        };
        assert_eq!(entries.len(), 1);
        let entry = entries[0].as_map().unwrap();
        assert_eq!(entry["doc"], Value::from("Add an item."));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&Value::from("1")));
        assert!(!is_truthy(&Value::from("0")));
        assert!(!is_truthy(&Value::from("False")));
        assert!(is_truthy(&Value::Bool(true)));
        assert!(!is_truthy(&Value::Null));
    }
}
