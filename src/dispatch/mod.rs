//! Command dispatcher.
//!
//! Every transport funnels into the same pipeline:
//!
//! ```text
//! Received → Parsed → ShortcutApplied → Validated → PermissionChecked
//!          → Resolved → Invoked → Outcome
//! ```
//!
//! Transports differ only in how the payload is parsed, whether the
//! permission check runs (the console is exempt) and whether the invocation
//! may be decoupled from the caller (realtime only). Admission up to
//! `Resolved` is strictly sequential per caller; only the invocation of a
//! realtime command runs as a background task.
//!
//! Failures never escape: each becomes an [`Outcome`] that is counted,
//! logged and published on the bus (`error` for admission failures, `exp`
//! for failures past module resolution).

mod console;
mod outcome;
mod shortcuts;

pub use console::{Console, ConsoleEcho, ConsoleFlow, run_console, stdout_sink};
pub use outcome::{MISSING_DOC, Outcome};
pub use shortcuts::ShortcutSet;

use crate::bus::MessageBus;
use crate::caps::PermissionAuthority;
use crate::error::DispatchError;
use crate::handlers::{Caller, Function, Invocation};
use crate::state::{Client, Hive, Session, Transport};
use crate::telemetry::CommandTimer;
use bee_proto::{Action, ParsedExpression, ProtocolError, Value, parse_json, parse_msgpack, parse_url};
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{Instrument, Level, debug, info, span, warn};

/// Bus topic for operator notices such as module reloads.
pub const INFO_TOPIC: &str = "info";

/// A realtime frame.
#[derive(Debug, Clone)]
pub enum Payload {
    /// JSON text.
    Text(String),
    /// msgpack.
    Binary(Vec<u8>),
}

/// The shared dispatch engine.
pub struct Dispatcher {
    hive: Arc<Hive>,
    authority: PermissionAuthority,
    shortcuts: ShortcutSet,
    /// Decoupled realtime invocations, aborted and awaited on shutdown.
    tasks: Mutex<JoinSet<()>>,
}

impl Dispatcher {
    pub fn new(hive: Arc<Hive>, authority: PermissionAuthority, shortcuts: ShortcutSet) -> Self {
        Self {
            hive,
            authority,
            shortcuts,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn hive(&self) -> &Arc<Hive> {
        &self.hive
    }

    pub fn authority(&self) -> &PermissionAuthority {
        &self.authority
    }

    pub fn shortcuts(&self) -> &ShortcutSet {
        &self.shortcuts
    }

    /// Number of background invocations not yet reaped.
    pub fn pending_tasks(&self) -> usize {
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Dispatch a console line that is not a sigil.
    pub async fn dispatch_console(&self, caller: &Caller, line: &str) -> Outcome {
        let outcome = match bee_proto::parse_console(line) {
            Ok(expr) => self.dispatch_expr(Transport::Console, expr, caller, None).await,
            Err(e) => DispatchError::from(e).into(),
        };
        settle(self.hive.bus.as_ref(), Transport::Console, outcome, None)
    }

    /// Dispatch a web request target (`/module/Class/function?k=v`).
    ///
    /// Runs as an anonymous session: only free rules can admit it.
    pub async fn dispatch_web(&self, target: &str, peer: Option<SocketAddr>) -> Outcome {
        let caller = Caller {
            session: Arc::new(RwLock::new(Session::anonymous(Transport::Web, peer))),
            client: None,
        };
        let outcome = match parse_url(target) {
            Ok(expr) => self.dispatch_expr(Transport::Web, expr, &caller, None).await,
            Err(e) => DispatchError::from(e).into(),
        };
        settle(self.hive.bus.as_ref(), Transport::Web, outcome, peer)
    }

    /// Dispatch a realtime frame: one command or a batch.
    ///
    /// Batch elements are admitted in order and fail independently.
    pub async fn dispatch_realtime(&self, client: &Client, payload: Payload) -> Vec<Outcome> {
        let decoded = match &payload {
            Payload::Text(text) => parse_json(text),
            Payload::Binary(bytes) => parse_msgpack(bytes),
        };
        let elements = match decoded {
            Ok(batch) => batch,
            Err(e) => vec![Err(e)],
        };
        let caller = Caller {
            session: Arc::clone(&client.session),
            client: Some(client.clone()),
        };

        let mut outcomes = Vec::with_capacity(elements.len());
        for element in elements {
            let outcome = match element {
                Ok(expr) => {
                    self.dispatch_expr(Transport::Realtime, expr, &caller, client.peer)
                        .await
                }
                Err(e) => DispatchError::from(ProtocolError::from(e)).into(),
            };
            outcomes.push(settle(
                self.hive.bus.as_ref(),
                Transport::Realtime,
                outcome,
                client.peer,
            ));
        }
        outcomes
    }

    async fn dispatch_expr(
        &self,
        transport: Transport,
        expr: ParsedExpression,
        caller: &Caller,
        peer: Option<SocketAddr>,
    ) -> Outcome {
        let expr = self.shortcuts.get(transport).apply(expr);
        let action = match Action::try_from(expr) {
            Ok(action) => action,
            Err(e) => return DispatchError::from(ProtocolError::from(e)).into(),
        };
        let conn = caller.session.read().conn();
        let command_span = span!(
            Level::DEBUG,
            "bee.command",
            transport = %transport,
            module = action.module(),
            class = action.class(),
            function = action.function(),
            conn = %conn,
        );
        self.run_action(transport, action, caller, peer)
            .instrument(command_span)
            .await
    }

    async fn run_action(
        &self,
        transport: Transport,
        action: Action,
        caller: &Caller,
        peer: Option<SocketAddr>,
    ) -> Outcome {
        let timer = CommandTimer::new(transport.as_str());
        let target = action.target();

        if transport != Transport::Console {
            let allowed = self.authority.is_allowed(&action, &caller.session.read());
            if !allowed {
                return DispatchError::Denied { target }.into();
            }
        }

        let reply_to = match transport {
            Transport::Realtime => caller.client.clone(),
            _ => None,
        };
        let registry = &self.hive.registry;
        let resolved = if action.force_reload() {
            info!(module = action.module(), "Reloading module");
            let notice = json!({ "desc": format!("Reloading {}", action.module()) });
            if let Err(e) = self.hive.bus.publish_for(INFO_TOPIC, notice, peer) {
                warn!(error = %e, "Failed to publish reload notice");
            }
            registry.reload(transport, action.module()).await
        } else {
            registry.load(transport, action.module())
        };
        let module = match resolved {
            Ok(module) => module,
            Err(e) => {
                return DispatchError::UnknownModule {
                    target,
                    reason: e.to_string(),
                }
                .into();
            }
        };

        let Some(class) = module.get(action.class()) else {
            return DispatchError::UnknownClass {
                module: action.module().to_string(),
                class: action.class().to_string(),
            }
            .into();
        };
        let function = match class.get(action.function()) {
            Some(function) => function.clone(),
            None if action.function() == "help" => {
                let listing = class.help(action.module(), action.data());
                if let Some(client) = &reply_to {
                    reply(client, &target, &listing);
                }
                return Outcome::Succeeded(listing);
            }
            None => {
                return DispatchError::UnknownFunction {
                    module: action.module().to_string(),
                    class: action.class().to_string(),
                    function: action.function().to_string(),
                }
                .into();
            }
        };

        if action.wants_help() {
            let doc = function.doc.clone().unwrap_or_else(|| MISSING_DOC.to_string());
            if let Some(client) = &reply_to {
                push_frame(client, &target, json!({ "target": target, "help": doc }));
            }
            return Outcome::HelpReturned(doc);
        }

        let inline = transport != Transport::Realtime || action.is_sync();
        let inv = Invocation {
            transport,
            target: target.clone(),
            caller: (!action.is_static()).then(|| caller.clone()),
            hive: Arc::clone(&self.hive),
            data: action.into_data(),
        };

        if inline {
            return complete(&function, inv, &target, reply_to.as_ref()).await;
        }

        let bus = Arc::clone(&self.hive.bus);
        let task = async move {
            let _timer = timer;
            let outcome = complete(&function, inv, &target, reply_to.as_ref()).await;
            settle(bus.as_ref(), transport, outcome, peer);
        }
        .in_current_span();
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
        Outcome::Spawned
    }

    /// Abort and await every background invocation, then log out and
    /// disconnect every client.
    pub async fn shutdown(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let pending = tasks.len();
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        let killed = self.hive.sessions.kill_all();
        info!(pending, killed, "Dispatcher stopped");
    }
}

/// Run the handler, containing panics, and reply on the realtime
/// connection when there is a non-null result.
async fn complete(
    function: &Function,
    inv: Invocation,
    target: &str,
    reply_to: Option<&Client>,
) -> Outcome {
    match AssertUnwindSafe(function.call(inv)).catch_unwind().await {
        Ok(Ok(value)) => {
            if let Some(client) = reply_to {
                reply(client, target, &value);
            }
            Outcome::Succeeded(value)
        }
        Ok(Err(e)) => DispatchError::from(e).into(),
        Err(panic) => DispatchError::Panicked(panic_message(panic.as_ref())).into(),
    }
}

fn reply(client: &Client, target: &str, value: &Value) {
    if value.is_null() {
        return;
    }
    push_frame(client, target, json!({ "target": target, "result": value.to_json() }));
}

fn push_frame(client: &Client, target: &str, frame: serde_json::Value) {
    if !client.push(frame.to_string()) {
        debug!(conn = %client.conn, target, "Reply not delivered");
    }
}

/// Record the outcome and publish it when it is a failure.
fn settle(
    bus: &dyn MessageBus,
    transport: Transport,
    outcome: Outcome,
    peer: Option<SocketAddr>,
) -> Outcome {
    // A spawned command is counted once, when its task settles.
    if !matches!(outcome, Outcome::Spawned) {
        crate::metrics::record_outcome(transport.as_str(), outcome.label());
    }
    if let Some(err) = outcome.error() {
        crate::metrics::record_command_error(transport.as_str(), err.error_code());
        debug!(%transport, code = err.error_code(), error = %err, "Command failed");
        if let Err(e) = bus.publish_for(err.topic(), err.to_event(), peer) {
            warn!(error = %e, "Failed to publish command failure");
        }
    }
    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests;
