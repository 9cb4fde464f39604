//! Permission rules.
//!
//! A rule names an optional module, class and function plus regex patterns
//! over action parameters. It matches an [`Action`] when every named field is
//! equal and every pattern matches the text form of the same-named parameter.
//! Patterns are anchored at the start of the value. A pattern whose parameter
//! is absent (or null) fails the rule.
//!
//! A rule with no fields and no patterns matches everything.

use crate::action::Action;
use crate::error::RuleError;
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

/// Rule as written in configuration or granted at login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuleSpec {
    /// Module path.
    #[serde(default)]
    pub m: Option<String>,
    /// Class name.
    #[serde(default)]
    pub c: Option<String>,
    /// Function name.
    #[serde(default)]
    pub f: Option<String>,
    /// Parameter name to regex.
    #[serde(default)]
    pub params: IndexMap<String, String>,
}

/// A compiled permission rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RuleSpec")]
pub struct PermissionRule {
    module: Option<String>,
    class: Option<String>,
    function: Option<String>,
    params: Vec<(String, Regex)>,
}

impl PermissionRule {
    /// Compile a rule. Empty names count as unset.
    pub fn new(spec: RuleSpec) -> Result<Self, RuleError> {
        let params = spec
            .params
            .into_iter()
            .map(|(param, pattern)| {
                Regex::new(&format!("^(?:{pattern})"))
                    .map(|re| (param.clone(), re))
                    .map_err(|source| RuleError::Pattern { param, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            module: spec.m.filter(|s| !s.is_empty()),
            class: spec.c.filter(|s| !s.is_empty()),
            function: spec.f.filter(|s| !s.is_empty()),
            params,
        })
    }

    /// Whether this rule admits `action`.
    pub fn matches(&self, action: &Action) -> bool {
        let field_ok = |want: &Option<String>, have: &str| want.as_deref().is_none_or(|w| w == have);

        field_ok(&self.module, action.module())
            && field_ok(&self.class, action.class())
            && field_ok(&self.function, action.function())
            && self.params.iter().all(|(param, re)| {
                action
                    .data()
                    .get(param)
                    .filter(|v| !v.is_null())
                    .is_some_and(|v| re.is_match(&v.to_string()))
            })
    }
}

impl TryFrom<RuleSpec> for PermissionRule {
    type Error = RuleError;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        Self::new(spec)
    }
}

/// First rule in `rules` that admits `action`.
pub fn first_match<'a>(rules: &'a [PermissionRule], action: &Action) -> Option<&'a PermissionRule> {
    rules.iter().find(|rule| rule.matches(action))
}
