//! Handler modules.
//!
//! A handler module is a named set of classes, each class a lookup table of
//! async functions built at registration time. Modules are registered per
//! transport namespace in the [`ModuleRegistry`] and resolved by the
//! dispatcher from an [`Action`](bee_proto::Action)'s module path.
//!
//! ```ignore
//! registry.register(Transport::Realtime, "shop", || {
//!     Ok(HandlerModule::new("shop").class(
//!         HandlerClass::new("Cart").function("add", "Add an item.", |inv| async move {
//!             let sku = inv.require_str("sku")?;
//!             Ok(Value::from(format!("added {sku}")))
//!         }),
//!     ))
//! });
//! ```

mod context;
mod module;
mod registry;
pub mod system;

pub use context::{Caller, Invocation};
pub use module::{Function, HandlerClass, HandlerFn, HandlerFuture, HandlerModule};
pub use registry::{Capability, ModuleFactory, ModuleRegistry, ResolveError};

pub use crate::error::{HandlerError, HandlerResult};
