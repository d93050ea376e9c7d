//! Shared fixtures for the integration test suite.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use authz_engine::testkit::GlobPolicyEvaluator;
use authz_engine::{AccessResource, AccessResult, Policy, PolicyEvaluator};

/// Wraps a `GlobPolicyEvaluator` and counts how many times `evaluate` was
/// invoked, so tests can assert an evaluator was (or wasn't) reached after
/// a short-circuit point.
pub struct CountingEvaluator {
    inner: GlobPolicyEvaluator,
    pub calls: Arc<AtomicUsize>,
}

impl CountingEvaluator {
    pub fn new(inner: GlobPolicyEvaluator) -> (Arc<dyn PolicyEvaluator>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let evaluator = Arc::new(Self {
            inner,
            calls: Arc::clone(&calls),
        });
        (evaluator, calls)
    }
}

impl PolicyEvaluator for CountingEvaluator {
    fn evaluate(&self, request: &authz_engine::AccessRequest, result: &mut AccessResult) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.evaluate(request, result);
    }

    fn is_access_allowed(
        &self,
        resource: &AccessResource,
        user: &str,
        groups: &HashSet<String>,
        access_type: &str,
    ) -> bool {
        self.inner.is_access_allowed(resource, user, groups, access_type)
    }

    fn is_single_and_exact_match(&self, resource: &AccessResource) -> bool {
        self.inner.is_single_and_exact_match(resource)
    }

    fn is_final_decider(&self) -> bool {
        self.inner.is_final_decider()
    }

    fn policy(&self) -> &Policy {
        self.inner.policy()
    }
}

pub fn allow(id: &str, resource: AccessResource, access_type_pattern: &str) -> GlobPolicyEvaluator {
    GlobPolicyEvaluator::new(
        Policy::new(id, format!("allow {id}"), resource),
        access_type_pattern,
        access_type_pattern,
        true,
    )
}

pub fn deny(id: &str, resource: AccessResource, access_type_pattern: &str) -> GlobPolicyEvaluator {
    GlobPolicyEvaluator::new(
        Policy::new(id, format!("deny {id}"), resource),
        access_type_pattern,
        access_type_pattern,
        false,
    )
}
