//! Least-privilege lint pass over capability documents.
//!
//! Findings are advisory: nothing here rejects a document.

use crate::document::CapabilityDocument;
use crate::statement::Effect;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// ALLOW over the resource pattern `*`.
    WildcardResource,
    /// ALLOW of the action `*`.
    WildcardAction,
    /// ALLOW of every action in a service namespace (`svc:*`).
    ServiceWideAction,
    /// The same action granted again by a later statement.
    DuplicateAction,
    /// Action identifier not shaped like `service:Action`.
    MalformedAction,
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::WildcardResource => "wildcard-resource",
            Self::WildcardAction => "wildcard-action",
            Self::ServiceWideAction => "service-wide-action",
            Self::DuplicateAction => "duplicate-action",
            Self::MalformedAction => "malformed-action",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// Index of the offending statement within its document.
    pub statement: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// The action or resource pattern that triggered the finding.
    pub subject: String,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.sid {
            Some(sid) => write!(f, "[{}] statement {} ({}): {}", self.kind, self.statement, sid, self.subject),
            None => write!(f, "[{}] statement {}: {}", self.kind, self.statement, self.subject),
        }
    }
}

fn action_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9-]+:[A-Za-z0-9*?]+$").expect("static regex"))
}

pub fn lint(doc: &CapabilityDocument) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut granted: HashMap<String, usize> = HashMap::new();

    for (idx, stmt) in doc.statements().iter().enumerate() {
        let finding = |kind, subject: &str| Finding {
            kind,
            statement: idx,
            sid: stmt.sid().map(str::to_string),
            subject: subject.to_string(),
        };

        for action in stmt.actions() {
            if action != "*" && !action_pattern().is_match(action) {
                findings.push(finding(FindingKind::MalformedAction, action));
            }
        }

        // Broad DENY statements are a guard, not an over-grant.
        if stmt.effect() == Effect::Deny {
            continue;
        }

        if stmt.resources().contains("*") {
            findings.push(finding(FindingKind::WildcardResource, "*"));
        }
        for action in stmt.actions() {
            if action == "*" {
                findings.push(finding(FindingKind::WildcardAction, action));
            } else if action.ends_with(":*") {
                findings.push(finding(FindingKind::ServiceWideAction, action));
            }
            let key = action.to_lowercase();
            match granted.get(&key) {
                Some(&first) if first != idx => {
                    findings.push(finding(FindingKind::DuplicateAction, action));
                }
                _ => {
                    granted.insert(key, idx);
                }
            }
        }
    }

    if !findings.is_empty() {
        tracing::debug!(count = findings.len(), "lint findings");
    }
    findings
}
