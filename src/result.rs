//! The mutable decision accumulator evaluators write into.

use std::sync::Arc;

use crate::types::ServiceDef;

/// Accumulates the outcome of evaluating one request against one
/// repository (or the combined tag stage). Evaluators may set any of the
/// decision fields; the two "determined" flags are the short-circuit
/// signals the engine's loops watch.
///
/// Invariant: `is_access_determined` implies `is_allowed` reflects the
/// final access decision for that stage. `is_audited_determined` may become
/// true independently of `is_access_determined` (an audit-only policy can
/// fire without ever deciding access).
#[derive(Debug, Clone)]
pub struct AccessResult {
    pub is_allowed: bool,
    pub is_access_determined: bool,
    pub is_audited: bool,
    pub is_audited_determined: bool,
    pub policy_id: Option<String>,
    pub reason: Option<String>,
    pub service_name: String,
    pub service_def: Arc<ServiceDef>,
}

impl AccessResult {
    pub fn new(service_name: impl Into<String>, service_def: Arc<ServiceDef>) -> Self {
        Self {
            is_allowed: false,
            is_access_determined: false,
            is_audited: false,
            is_audited_determined: false,
            policy_id: None,
            reason: None,
            service_name: service_name.into(),
            service_def,
        }
    }

    /// True once both the access decision and the audit decision are
    /// authoritative for this result — the condition every evaluator loop
    /// in the engine short-circuits on.
    pub fn is_fully_determined(&self) -> bool {
        self.is_access_determined && self.is_audited_determined
    }

    /// Copy the fields a tag-stage or resource-stage evaluator may set,
    /// per the `copyFrom` contract in the combination rule (deny/allow
    /// overrides, §4.2): `is_allowed`, `is_access_determined`,
    /// `is_audited`, `is_audited_determined`, `policy_id`, `reason`.
    /// Service name/def are deliberately left untouched — they identify
    /// *this* result's owning repository, not the source it was copied
    /// from.
    pub fn copy_from(&mut self, other: &AccessResult) {
        self.is_allowed = other.is_allowed;
        self.is_access_determined = other.is_access_determined;
        self.is_audited = other.is_audited;
        self.is_audited_determined = other.is_audited_determined;
        self.policy_id = other.policy_id.clone();
        self.reason = other.reason.clone();
    }
}
