//! Built-in `system` module, registered in every namespace.
//!
//! - `system.Info.ping` / `uptime` / `online` / `help`
//! - `system.Diag.echo` / `whoami` / `fail`

use super::module::is_truthy;
use super::{HandlerClass, HandlerError, HandlerModule, Invocation, ModuleRegistry};
use bee_proto::{Params, Value};
use chrono::Utc;

/// Module path.
pub const PATH: &str = "system";

/// Register the module in every namespace.
pub fn register(registry: &ModuleRegistry) {
    registry.register_everywhere(PATH, || Ok(module()));
}

pub fn module() -> HandlerModule {
    HandlerModule::new(PATH).class(info()).class(diag())
}

fn info() -> HandlerClass {
    HandlerClass::new("Info")
        .function("ping", "Liveness check. Returns the server name and time.", |inv| async move {
            let mut reply = Params::new();
            reply.insert("pong".into(), Value::Bool(true));
            reply.insert("server".into(), Value::from(inv.hive.config().server.name.clone()));
            reply.insert("time".into(), Value::DateTime(Utc::now().naive_utc()));
            Ok(Value::Map(reply))
        })
        .function("uptime", "Time since the daemon started.", |inv| async move {
            Ok(Value::from(inv.hive.uptime()))
        })
        .function(
            "online",
            "Number of live connections authenticated as `uid`.",
            |inv| async move {
                let uid = inv.require_str("uid")?;
                let count = inv.hive.sessions.is_online(uid);
                Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
            },
        )
        .function(
            "help",
            "List this namespace's functions. `f` filters by function name, `detail` adds docs.",
            |inv| async move { Ok(namespace_help(&inv)) },
        )
}

fn diag() -> HandlerClass {
    HandlerClass::new("Diag")
        .function("echo", "Return the call's parameters.", |inv| async move {
            Ok(Value::Map(inv.data))
        })
        .function("whoami", "The caller's uid, or null.", |inv| async move {
            let uid = inv
                .session()
                .and_then(|s| s.read().uid().map(str::to_owned));
            Ok(uid.map_or(Value::Null, Value::from))
        })
        .function("fail", "Always fails with `msg`.", |inv| async move {
            let msg = inv
                .param("msg")
                .map_or_else(|| "diagnostic failure".to_string(), ToString::to_string);
            Err(HandlerError::Failed(msg))
        })
        .exclude_from_help("fail")
}

fn namespace_help(inv: &Invocation) -> Value {
    let only = inv.param("f").and_then(Value::as_str);
    let detail = inv.param("detail").is_some_and(is_truthy);
    let entries = inv
        .hive
        .registry
        .discover(inv.transport)
        .into_iter()
        .filter(|cap| only.is_none_or(|name| name == cap.function))
        .map(|cap| {
            if detail {
                let mut entry = Params::new();
                entry.insert("target".into(), Value::from(cap.target()));
                entry.insert("doc".into(), cap.doc.map_or(Value::Null, Value::from));
                Value::Map(entry)
            } else {
                Value::from(cap.target())
            }
        })
        .collect();
    Value::List(entries)
}
