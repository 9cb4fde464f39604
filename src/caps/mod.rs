//! Permission authority.
//!
//! [`PermissionAuthority`] is the one place that decides whether a session
//! may run an [`Action`](bee_proto::Action). Rules are evaluated in priority
//! order:
//!
//! 1. free rules from the configuration (any match admits)
//! 2. rules granted to the session at login
//! 3. identity fallback: a deactivated identity is denied, an admin is admitted
//! 4. everything else is denied
//!
//! Console commands never reach the authority; the dispatcher exempts them.

mod authority;

pub use authority::{Grant, PermissionAuthority};
