//! A minimal, glob-pattern `PolicyEvaluator` implementation.
//!
//! The engine treats evaluators as opaque — resource-pattern matching and
//! condition evaluation are explicitly out of scope for the core. This
//! evaluator exists only so the engine's own tests and a host without a
//! richer policy language have something concrete to plug in; it is
//! grounded on the teacher's `Policy::matches_pattern` (prefix/suffix glob
//! via `regex`), not a re-implementation of a full condition language.

use std::collections::HashSet;

use regex::Regex;

use crate::evaluator::PolicyEvaluator;
use crate::request::AccessRequest;
use crate::result::AccessResult;
use crate::types::{AccessResource, Policy};

/// Matches a resource + access-type glob pattern and, on match, sets a
/// fixed allow/deny verdict (and optionally an audit flag) on the result.
pub struct GlobPolicyEvaluator {
    policy: Policy,
    access_type_pattern: String,
    allow: bool,
    audit: bool,
    final_decider: bool,
}

impl GlobPolicyEvaluator {
    pub fn new(
        policy: Policy,
        access_type_pattern: impl Into<String>,
        _unused_action_label: &str,
        allow: bool,
    ) -> Self {
        Self {
            policy,
            access_type_pattern: access_type_pattern.into(),
            allow,
            audit: false,
            final_decider: false,
        }
    }

    pub fn with_audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_final_decider(mut self, final_decider: bool) -> Self {
        self.final_decider = final_decider;
        self
    }

    fn matches(&self, resource: &AccessResource, access_type: &str) -> bool {
        if !glob_match(&self.access_type_pattern, access_type) {
            return false;
        }
        self.policy
            .resource
            .iter()
            .all(|(dim, pattern)| match resource.get(dim) {
                Some(value) => glob_match(pattern, value),
                None => false,
            })
    }
}

fn glob_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if pattern.contains('*') {
        let escaped = regex::escape(pattern).replace(r"\*", ".*");
        return Regex::new(&format!("^{}$", escaped))
            .map(|re| re.is_match(value))
            .unwrap_or(false);
    }
    pattern == value
}

impl PolicyEvaluator for GlobPolicyEvaluator {
    fn evaluate(&self, request: &AccessRequest, result: &mut AccessResult) {
        if !self.matches(&request.resource, &request.access_type) {
            return;
        }

        result.is_allowed = self.allow;
        result.is_access_determined = true;
        result.policy_id = Some(self.policy.id.clone());
        result.reason = Some(format!(
            "{} by policy '{}'",
            if self.allow { "allowed" } else { "denied" },
            self.policy.name
        ));

        if self.audit {
            result.is_audited = true;
            result.is_audited_determined = true;
        }
    }

    fn is_access_allowed(
        &self,
        resource: &AccessResource,
        _user: &str,
        _groups: &HashSet<String>,
        access_type: &str,
    ) -> bool {
        self.allow && self.matches(resource, access_type)
    }

    fn is_single_and_exact_match(&self, resource: &AccessResource) -> bool {
        let pattern = &self.policy.resource;
        let no_wildcards = pattern.iter().all(|(_, v)| !v.contains('*'));
        no_wildcards && pattern == resource
    }

    fn is_final_decider(&self) -> bool {
        self.final_decider
    }

    fn policy(&self) -> &Policy {
        &self.policy
    }
}

/// An evaluator that matches every request and only ever sets the audit
/// flag, never the access decision — mirrors the `AE` fixture from the
/// core spec's end-to-end scenario table.
pub struct AuditOnlyEvaluator {
    policy: Policy,
}

impl AuditOnlyEvaluator {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }
}

impl PolicyEvaluator for AuditOnlyEvaluator {
    fn evaluate(&self, _request: &AccessRequest, result: &mut AccessResult) {
        result.is_audited = true;
        result.is_audited_determined = true;
    }

    fn is_access_allowed(
        &self,
        _resource: &AccessResource,
        _user: &str,
        _groups: &HashSet<String>,
        _access_type: &str,
    ) -> bool {
        false
    }

    fn is_single_and_exact_match(&self, _resource: &AccessResource) -> bool {
        false
    }

    fn policy(&self) -> &Policy {
        &self.policy
    }
}
