//! A repository of evaluators for one policy family (resource or tag),
//! plus its enrichers and audit cache.

use std::sync::Arc;

use crate::cache::AuditCache;
use crate::evaluator::{ContextEnricher, PolicyEvaluator};
use crate::result::AccessResult;
use crate::types::{AccessResource, ServiceDef};

/// Holds an ordered, immutable-after-construction list of evaluators for
/// one policy family, its context enrichers, and a small per-request audit
/// cache. Evaluator and enricher order is fixed at construction time and
/// never changes for the lifetime of the repository.
pub struct PolicyRepository {
    pub service_name: String,
    pub service_def: Arc<ServiceDef>,
    pub policy_version: i64,
    evaluators: Vec<Arc<dyn PolicyEvaluator>>,
    enrichers: Vec<Arc<dyn ContextEnricher>>,
    audit_cache: AuditCache,
}

impl PolicyRepository {
    pub fn new(
        service_name: impl Into<String>,
        service_def: Arc<ServiceDef>,
        policy_version: i64,
        evaluators: Vec<Arc<dyn PolicyEvaluator>>,
        enrichers: Vec<Arc<dyn ContextEnricher>>,
        audit_cache_capacity: usize,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            service_def,
            policy_version,
            evaluators,
            enrichers,
            audit_cache: AuditCache::new(audit_cache_capacity),
        }
    }

    pub fn evaluators(&self) -> &[Arc<dyn PolicyEvaluator>] {
        &self.evaluators
    }

    pub fn enrichers(&self) -> &[Arc<dyn ContextEnricher>] {
        &self.enrichers
    }

    /// Consult the audit cache for `resource`; on a hit, copy the cached
    /// `(is_audited, is_audited_determined)` pair into `result`. Returns
    /// whether it was a hit, so the caller knows whether to store back
    /// after the evaluation loop.
    pub fn set_audit_enabled_from_cache(
        &self,
        resource: &AccessResource,
        result: &mut AccessResult,
    ) -> bool {
        if let Some((is_audited, is_audited_determined)) = self.audit_cache.get(resource) {
            result.is_audited = is_audited;
            result.is_audited_determined = is_audited_determined;
            true
        } else {
            false
        }
    }

    /// Store the current `(is_audited, is_audited_determined)` pair in the
    /// cache, but only when the audit flag is actually determined — an
    /// undetermined flag isn't worth remembering.
    pub fn store_audit_enabled_in_cache(&self, resource: &AccessResource, result: &AccessResult) {
        if result.is_audited_determined {
            self.audit_cache
                .put(resource, result.is_audited, result.is_audited_determined);
        }
    }

    pub fn audit_cache_len(&self) -> usize {
        self.audit_cache.len()
    }
}
