//! Capability statements: one atomic permission grant.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use stackgraph_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Allow => "ALLOW",
            Effect::Deny => "DENY",
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Effect {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ALLOW" => Ok(Effect::Allow),
            "DENY" => Ok(Effect::Deny),
            _ => Err(Error::validation(format!("unknown effect: {}", s))),
        }
    }
}

/// Condition operator → (condition key → accepted values).
pub type Conditions = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// A single grant. Immutable once built: the builder methods consume `self`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilityStatement {
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<String>,
    effect: Effect,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    principals: BTreeSet<String>,
    actions: BTreeSet<String>,
    resources: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    conditions: Conditions,
    #[serde(skip)]
    compiled: CompiledPatterns,
}

/// Action and resource matchers, built on first use. Derived entirely from
/// the pattern sets, so they take no part in equality.
#[derive(Clone, Default)]
struct CompiledPatterns {
    actions: OnceLock<GlobSet>,
    resources: OnceLock<GlobSet>,
}

impl PartialEq for CompiledPatterns {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Eq for CompiledPatterns {}

impl std::fmt::Debug for CompiledPatterns {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CompiledPatterns")
            .field("actions", &self.actions.get().is_some())
            .field("resources", &self.resources.get().is_some())
            .finish()
    }
}

impl CapabilityStatement {
    pub fn new<A, R>(effect: Effect, actions: A, resources: R) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let actions = collect_non_blank(actions, "action")?;
        let resources = collect_non_blank(resources, "resource")?;
        Ok(Self {
            sid: None,
            effect,
            principals: BTreeSet::new(),
            actions,
            resources,
            conditions: Conditions::new(),
            compiled: CompiledPatterns::default(),
        })
    }

    pub fn allow<A, R>(actions: A, resources: R) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::new(Effect::Allow, actions, resources)
    }

    pub fn deny<A, R>(actions: A, resources: R) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::new(Effect::Deny, actions, resources)
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Result<Self> {
        let sid = sid.into();
        if sid.trim().is_empty() {
            return Err(Error::validation("statement sid must not be blank"));
        }
        self.sid = Some(sid);
        Ok(self)
    }

    /// Add accepted values for `key` under condition `operator`
    /// (e.g. `StringLikeIfExists` / `iam:PassedToService`).
    pub fn with_condition<V>(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        values: V,
    ) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        self.conditions
            .entry(operator.into())
            .or_default()
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_principals<P>(mut self, principals: P) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        self.principals
            .extend(principals.into_iter().map(Into::into));
        self
    }

    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn actions(&self) -> &BTreeSet<String> {
        &self.actions
    }

    pub fn resources(&self) -> &BTreeSet<String> {
        &self.resources
    }

    pub fn principals(&self) -> &BTreeSet<String> {
        &self.principals
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    pub fn is_conditional(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Action namespaces are matched case-insensitively.
    pub fn matches_action(&self, action: &str) -> bool {
        self.compiled
            .actions
            .get_or_init(|| pattern_set(&self.actions, true))
            .is_match(action)
    }

    pub fn matches_resource(&self, resource: &str) -> bool {
        self.compiled
            .resources
            .get_or_init(|| pattern_set(&self.resources, false))
            .is_match(resource)
    }

    /// Whether this statement speaks to `(action, resource)` at all.
    /// Conditions are not evaluated.
    pub fn applies_to(&self, action: &str, resource: &str) -> bool {
        self.matches_action(action) && self.matches_resource(resource)
    }
}

fn collect_non_blank<I>(items: I, what: &str) -> Result<BTreeSet<String>>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut set = BTreeSet::new();
    for item in items {
        let item: String = item.into();
        if item.trim().is_empty() {
            return Err(Error::validation(format!("blank {} in statement", what)));
        }
        set.insert(item);
    }
    if set.is_empty() {
        return Err(Error::validation(format!(
            "statement requires at least one {}",
            what
        )));
    }
    Ok(set)
}

/// Compile patterns where `*` spans any run of characters (including `/`
/// and `:`) and `?` matches exactly one. Every other glob metacharacter is
/// taken literally.
fn pattern_set(patterns: &BTreeSet<String>, case_insensitive: bool) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match pattern_glob(pattern, case_insensitive) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::debug!("unusable pattern {}: {}", pattern, e),
        }
    }
    builder.build().unwrap_or_else(|e| {
        tracing::debug!("pattern set failed to compile: {}", e);
        GlobSet::empty()
    })
}

fn pattern_glob(pattern: &str, case_insensitive: bool) -> std::result::Result<Glob, globset::Error> {
    let mut glob = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' | '?' => glob.push(c),
            other => glob.push_str(&globset::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    GlobBuilder::new(&glob)
        .literal_separator(false)
        .case_insensitive(case_insensitive)
        .build()
}
