//! Permission Authority - rule evaluation for dispatched actions.

use bee_proto::{Action, PermissionRule, RuleError, RuleSpec, first_match};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::state::Session;

/// Why an action was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Matched a configured free rule.
    Free,
    /// Matched a rule granted to the session.
    Session,
    /// The identity is an administrator.
    Admin,
}

/// Evaluates actions against free rules and session grants.
///
/// The free rule set is swapped as a whole on configuration reload;
/// evaluations in flight keep the set they started with.
pub struct PermissionAuthority {
    free: RwLock<Arc<Vec<PermissionRule>>>,
}

impl PermissionAuthority {
    /// Compile the configured free rules.
    pub fn new(free: &[RuleSpec]) -> Result<Self, RuleError> {
        Ok(Self {
            free: RwLock::new(Arc::new(compile(free)?)),
        })
    }

    /// Replace the free rules. On error the previous set stays active.
    pub fn replace_free_rules(&self, free: &[RuleSpec]) -> Result<usize, RuleError> {
        let rules = compile(free)?;
        let count = rules.len();
        *self.free.write() = Arc::new(rules);
        debug!(count, "Free rules replaced");
        Ok(count)
    }

    /// Decide, returning which rule tier admitted the action.
    pub fn check(&self, action: &Action, session: &Session) -> Option<Grant> {
        let free = Arc::clone(&self.free.read());
        let target = action.target();

        if first_match(&free, action).is_some() {
            self.log_grant(Grant::Free, &target, session);
            return Some(Grant::Free);
        }
        if first_match(session.permissions(), action).is_some() {
            self.log_grant(Grant::Session, &target, session);
            return Some(Grant::Session);
        }
        match session.identity() {
            Some(identity) if !identity.is_active => {
                self.log_denial("deactivated", &target, session);
                None
            }
            Some(identity) if identity.is_admin => {
                self.log_grant(Grant::Admin, &target, session);
                Some(Grant::Admin)
            }
            _ => {
                self.log_denial("no matching rule", &target, session);
                None
            }
        }
    }

    /// True when `session` may run `action`.
    pub fn is_allowed(&self, action: &Action, session: &Session) -> bool {
        self.check(action, session).is_some()
    }

    fn log_grant(&self, grant: Grant, target: &str, session: &Session) {
        debug!(
            grant = ?grant,
            target = %target,
            conn = %session.conn(),
            uid = session.uid().unwrap_or("-"),
            "Action permitted"
        );
    }

    fn log_denial(&self, reason: &str, target: &str, session: &Session) {
        trace!(
            reason,
            target = %target,
            conn = %session.conn(),
            uid = session.uid().unwrap_or("-"),
            "Action denied"
        );
    }
}

fn compile(specs: &[RuleSpec]) -> Result<Vec<PermissionRule>, RuleError> {
    specs.iter().cloned().map(PermissionRule::new).collect()
}
